use std::path::Path;
use std::sync::OnceLock;

use ::config::{Environment, File, FileFormat};
use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Prefix of environment overrides, e.g. `AGENT_CHAT__AGENT_SERVICE__AGENT_ID`.
pub const ENV_PREFIX: &str = "AGENT_CHAT";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub system_config: SystemConfig,
    #[serde(default)]
    pub agent_service: AgentServiceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origins allowed by CORS. `*` allows any origin.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
        }
    }
}

/// Connection to the hosted agent service.
#[derive(Clone, Serialize, Deserialize)]
pub struct AgentServiceConfig {
    #[serde(default)]
    pub connection_string: String,
    #[serde(default)]
    pub agent_id: String,
    /// Thread used when a request names none.
    #[serde(default)]
    pub thread_id: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Upper bound on waiting for one run; `0` waits forever.
    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub serialize_per_thread: bool,
}

fn default_api_version() -> String {
    "2024-12-01-preview".to_string()
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_run_timeout_secs() -> u64 {
    300
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

impl Default for AgentServiceConfig {
    fn default() -> Self {
        Self {
            connection_string: String::new(),
            agent_id: String::new(),
            thread_id: String::new(),
            access_token: None,
            api_key: None,
            api_version: default_api_version(),
            poll_interval_ms: default_poll_interval_ms(),
            run_timeout_secs: default_run_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            serialize_per_thread: true,
        }
    }
}

// Secrets stay out of logs.
impl std::fmt::Debug for AgentServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentServiceConfig")
            .field("connection_string", &self.connection_string)
            .field("agent_id", &self.agent_id)
            .field("thread_id", &self.thread_id)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_version", &self.api_version)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("run_timeout_secs", &self.run_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("serialize_per_thread", &self.serialize_per_thread)
            .finish()
    }
}

impl AgentServiceConfig {
    /// Fail fast when any of the three deployment values is missing.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("agent_service.connection_string", &self.connection_string),
            ("agent_service.agent_id", &self.agent_id),
            ("agent_service.thread_id", &self.thread_id),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                anyhow::bail!("{} is missing or empty!", key);
            }
        }
        if self.poll_interval_ms == 0 {
            anyhow::bail!("agent_service.poll_interval_ms must be greater than zero");
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from an optional file plus `AGENT_CHAT__*` environment
    /// overrides, then validate it.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("Failed to read configuration file {}: {}", path, e))?;
            let content = substitute_env_vars(&content);
            builder = builder.add_source(File::from_str(&content, file_format(path)));
        }

        let config: Config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.agent_service.validate()?;
        Ok(config)
    }

    /// First existing file among `CONFIG_PATH` and the usual names.
    pub fn find_config_file() -> Option<String> {
        let candidates: Vec<String> = vec![
            std::env::var("CONFIG_PATH").ok(),
            Some("conf.yaml".to_string()),
            Some("conf.yml".to_string()),
            Some("conf.json".to_string()),
        ]
        .into_iter()
        .flatten()
        .collect();

        candidates.into_iter().find(|p| Path::new(p).exists())
    }
}

fn file_format(path: &str) -> FileFormat {
    let path_lower = path.to_lowercase();
    if path_lower.ends_with(".json") {
        FileFormat::Json
    } else {
        FileFormat::Yaml
    }
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{(\w+)\}").expect("placeholder pattern is valid"))
}

/// Replace `${VAR_NAME}` with the variable's value; unknown variables are
/// left untouched.
pub fn substitute_env_vars(content: &str) -> String {
    placeholder_pattern()
        .replace_all(content, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}
