pub mod agent;
pub mod chat_client;
pub mod config;
pub mod handlers;
pub mod routes;
pub mod state;

pub use crate::config::Config;
pub use crate::routes::create_app;
pub use crate::state::AppState;
