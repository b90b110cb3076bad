use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use agent_chat_backend::agent::is_tagged_error;
use agent_chat_backend::chat_client::{
    acquire_thread, ChatApiClient, Conversation, ThreadCache, ThreadRetryPolicy,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let api_url =
        std::env::var("CHAT_API_URL").unwrap_or_else(|_| "http://localhost:5000".to_string());
    let cache_path =
        std::env::var("CHAT_THREAD_CACHE").unwrap_or_else(|_| ".ai_thread_id".to_string());

    let client = ChatApiClient::new(&api_url);
    let cache = ThreadCache::new(cache_path);
    let policy = ThreadRetryPolicy::default();

    let thread_id = acquire_thread(&client, &cache, policy).await?;
    let mut conversation = Conversation::new(client.clone(), Some(thread_id));

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    stdout
        .write_all(b"AI Assistant. Type a message, /reset to start over, /quit to exit.\n")
        .await?;

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();

        match input {
            "" => continue,
            "/quit" | "/exit" => break,
            "/reset" => {
                conversation.reset(&cache)?;
                let thread_id = acquire_thread(&client, &cache, policy).await?;
                conversation.set_thread(thread_id);
                stdout.write_all(b"Started a new conversation.\n").await?;
                continue;
            }
            _ => {}
        }

        stdout.write_all(b"AI is thinking...\n").await?;
        match conversation.send(input).await {
            Ok(Some(reply)) => {
                let label = if is_tagged_error(&reply.content) { "AI (error)" } else { "AI" };
                let text = format!("[{}] {}: {}\n", reply.timestamp, label, reply.content);
                stdout.write_all(text.as_bytes()).await?;
            }
            Ok(None) => {}
            Err(e) => {
                let text = format!("Request failed: {e}\n");
                stdout.write_all(text.as_bytes()).await?;
            }
        }
    }

    Ok(())
}
