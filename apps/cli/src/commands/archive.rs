//! Saved-report archive commands.

use crate::config;
use anyhow::{Context, Result};
use colored::Colorize;
use prism_core::{ReportRecord, Settings};
use std::path::Path;

/// Save a markdown file as a report.
pub async fn save(settings: &Settings, topic: &str, model_id: &str, file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let record = config::archive(settings)?.save(topic, model_id, &content).await?;
    println!("{} Saved report #{} to {}", "✓".green(), record.id, record.file_path);
    Ok(())
}

/// List saved themes.
pub fn themes(settings: &Settings, json: bool) -> Result<()> {
    let themes = config::archive(settings)?.themes()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&themes)?);
    } else if themes.is_empty() {
        println!("No saved reports yet");
    } else {
        for theme in themes {
            println!("{theme}");
        }
    }
    Ok(())
}

/// List the reports of one theme.
pub fn list(settings: &Settings, theme: &str, json: bool) -> Result<()> {
    let records = config::archive(settings)?.reports_by_theme(theme)?;
    print_records(&records, json)
}

/// Print one saved report.
pub fn show(settings: &Settings, id: i64) -> Result<()> {
    let content = config::archive(settings)?.content(id)?;
    print!("{content}");
    Ok(())
}

/// Find saved reports close to a topic.
pub async fn similar(settings: &Settings, topic: &str, json: bool) -> Result<()> {
    let records = config::archive(settings)?.find_similar(topic).await?;
    print_records(&records, json)
}

fn print_records(records: &[ReportRecord], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("No reports found");
        return Ok(());
    }
    for record in records {
        println!(
            "#{:<4} {}  {}  {}",
            record.id,
            record.saved_at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
            record.model_id.cyan(),
            record.original_topic
        );
    }
    Ok(())
}
