//! One-shot chat with a model addressed by alias.

use anyhow::Result;
use futures::StreamExt;
use prism_abstraction::ChatMessage;
use prism_core::{AdapterProvider, ChatService, Settings};
use std::io::Write;
use std::sync::Arc;

/// Execute the chat command, printing the reply as it streams in.
pub async fn execute(
    settings: &Settings,
    alias: &str,
    system: Option<String>,
    message: String,
) -> Result<()> {
    let service = ChatService::new(Arc::new(AdapterProvider::new(settings.provider_settings())));

    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system {
        messages.push(ChatMessage::system(system));
    }
    messages.push(ChatMessage::user(message));

    let mut stream = service.complete_stream(alias, &messages).await?;
    let mut stdout = std::io::stdout();
    while let Some(delta) = stream.deltas.next().await {
        write!(stdout, "{}", delta?)?;
        stdout.flush()?;
    }
    writeln!(stdout)?;
    Ok(())
}
