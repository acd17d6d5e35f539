//! Knowledge base ingestion command.

use crate::config;
use anyhow::{Context, Result};
use colored::Colorize;
use prism_core::{Settings, TextChunker, ingest_directory};
use std::path::Path;

/// Execute the ingest command.
pub async fn execute(settings: &Settings, dir: &Path) -> Result<()> {
    let index = config::vector_index(settings)?;
    let embedder = config::embedder(settings)?;

    let summary = ingest_directory(dir, &TextChunker::default(), embedder.as_ref(), index.as_ref())
        .await
        .with_context(|| format!("Failed to ingest {}", dir.display()))?;

    if summary.documents == 0 {
        println!("No .md, .markdown or .txt documents found in {}; knowledge base unchanged", dir.display());
    } else {
        println!(
            "{} Ingested {} document(s) as {} chunk(s)",
            "✓".green(),
            summary.documents.to_string().cyan(),
            summary.chunks.to_string().cyan()
        );
    }
    Ok(())
}
