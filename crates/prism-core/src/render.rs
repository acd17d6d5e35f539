//! Markdown rendering of pipeline outcomes.

use crate::pipeline::PipelineOutcome;
use crate::report::StructuredReport;
use std::fmt::Write;

/// Renders a report to markdown.
pub fn render(report: &StructuredReport) -> String {
    let mut out = String::new();
    write!(out, "# {}\n\n## Introduction\n{}\n\n", report.title, report.introduction).unwrap();
    for section in &report.sections {
        write!(out, "## {}\n{}\n\n", section.title, section.content).unwrap();
    }
    writeln!(out, "## Conclusion\n{}", report.conclusion).unwrap();
    out
}

/// Renders the fixed failure block shown in place of a report.
pub fn render_failure(model_id: &str, error: &str) -> String {
    format!("# Report generation failed\n\n**Model:** `{model_id}`\n\n**Error details:**\n```\n{error}\n```\n")
}

/// Renders either the report or the failure block of an outcome.
pub fn render_outcome(outcome: &PipelineOutcome) -> String {
    match outcome {
        PipelineOutcome::Success { report, .. } => render(report),
        PipelineOutcome::Failure { model_id, error, .. } => render_failure(model_id, error),
    }
}
