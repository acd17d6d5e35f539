//! Report generation command.

use crate::config;
use anyhow::{Context, Result, bail};
use colored::Colorize;
use prism_core::{PipelineOutcome, ReportRequest, ReportService, Settings, load_template};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Execute the generate command.
pub async fn execute(
    settings: &Settings,
    topic: &str,
    models: Vec<String>,
    template: Option<&Path>,
    save: bool,
    json: bool,
) -> Result<()> {
    if topic.trim().is_empty() {
        bail!("Topic is required.");
    }

    let models = if models.is_empty() { settings.model_selection() } else { models };
    let template_content = template.map(load_template).filter(|t| !t.trim().is_empty());
    if template.is_some() && template_content.is_none() {
        warn!("Template is empty or unreadable, generating without it");
    }

    let service = ReportService::new(config::coordinator(settings)?);
    let request = ReportRequest { topic: topic.to_string(), models, template_content };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling runs still in flight");
            on_interrupt.cancel();
        }
    });

    let reports = service.generate(&request, &cancel).await;
    interrupt.abort();

    if json {
        println!("{}", serde_json::to_string_pretty(&reports).context("Failed to serialize reports")?);
    } else {
        for report in &reports {
            let marker = if report.outcome.is_success() { "✓".green() } else { "✗".red() };
            println!("{} {}", marker, report.model_id.bold().cyan());
            println!();
            println!("{}", report.markdown);
        }
    }

    if save {
        let archive = config::archive(settings)?;
        for report in reports.iter().filter(|r| r.outcome.is_success()) {
            let record = archive.save(topic, &report.model_id, &report.markdown).await?;
            eprintln!("  Saved {} as report #{}", report.model_id.green(), record.id);
        }
    }

    let failed = reports.iter().filter(|r| matches!(r.outcome, PipelineOutcome::Failure { .. })).count();
    if !reports.is_empty() && failed == reports.len() {
        bail!("All {} model runs failed", failed);
    }
    Ok(())
}
