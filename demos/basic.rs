//! Minimal usage: connect, listen, send, shut down.
//!
//! Run against a local chat server:
//!   cargo run --example basic

use std::time::Duration;

use quest_chat_client::{chat_url, ChatClient, ChatClientOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let client = ChatClient::new(
        chat_url("localhost:8080", false),
        ChatClientOptions {
            auto_connect: false,
            ..Default::default()
        },
    )?;

    let listener = client.on_message(|msg| {
        println!("<- {}: {}", msg.kind, serde_json::Value::Object(msg.data.clone()));
    });

    client.connect().await?;

    let mut data = serde_json::Map::new();
    data.insert(
        "text".to_string(),
        serde_json::json!("hello from the quest admin"),
    );
    if !client.send_message("chat_message", data).await {
        println!("offline, message queued ({} waiting)", client.queue_size().await);
    }

    tokio::time::sleep(Duration::from_secs(2)).await;

    client.off_message(listener);
    client.disconnect().await?;
    Ok(())
}
