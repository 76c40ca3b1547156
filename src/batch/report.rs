use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use std::fmt::{self, Write};
use std::path::{Path, PathBuf};

use super::orchestrator::BatchResult;
use crate::extraction::provider::safe_file_name;

const RULE: &str = "==================================================";
const THIN_RULE: &str = "--------------------------------------------------";

/// `statement_report_<ISO date>.txt`
pub fn report_filename(date: NaiveDate) -> String {
    format!("statement_report_{}.txt", date.format("%Y-%m-%d"))
}

/// Plain-text summary of a batch run, or `None` when the run produced no
/// outcomes at all.
pub fn build_report(result: &BatchResult, generated_at: DateTime<Utc>) -> Option<String> {
    if result.is_empty() {
        return None;
    }
    render(result, generated_at).ok()
}

fn render(result: &BatchResult, generated_at: DateTime<Utc>) -> Result<String, fmt::Error> {
    let summary = result.summary();
    let mut out = String::new();

    writeln!(out, "Statement Draft Generation Report")?;
    writeln!(out, "Generated: {}", generated_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
    writeln!(out, "{}", RULE)?;
    writeln!(out)?;
    writeln!(out, "SUMMARY")?;
    writeln!(out, "Total processed: {}", result.total())?;
    writeln!(out, "Successful: {}", summary.successful)?;
    writeln!(out, "Failed: {}", summary.failed)?;
    writeln!(out)?;

    writeln!(out, "SUCCESSFULLY GENERATED ({})", summary.successful)?;
    writeln!(out, "{}", THIN_RULE)?;
    if result.successes.is_empty() {
        writeln!(out, "None")?;
    }
    for (i, success) in result.successes.iter().enumerate() {
        writeln!(out, "{}. {}", i + 1, success.filename)?;
        writeln!(out, "   Recipient: {}", success.recipient_email)?;
        writeln!(out, "   Draft: {}", success.artifact_name)?;
    }
    writeln!(out)?;

    writeln!(out, "FAILED ({})", summary.failed)?;
    writeln!(out, "{}", THIN_RULE)?;
    if result.failures.is_empty() {
        writeln!(out, "None")?;
    }
    for (i, failure) in result.failures.iter().enumerate() {
        writeln!(out, "{}. {}", i + 1, failure.filename)?;
        writeln!(out, "   Reason: {}", failure.reason)?;
    }

    Ok(out)
}

/// Write a report into `dir` and return where it landed.
/// Only the final component of `filename` is used.
pub async fn save_report(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let path = dir.join(safe_file_name(filename));
    tokio::fs::write(&path, content)
        .await
        .with_context(|| format!("Failed to write report {}", path.display()))?;

    tracing::info!("Report saved to {}", path.display());
    Ok(path)
}
