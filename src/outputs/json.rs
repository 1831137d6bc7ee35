//! JSON report mirroring the CSV sink, for API-style consumption.

use crate::models::ExtractionResult;
use chrono::Local;
use serde::Serialize;
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, instrument};

/// Top-level shape of the JSON report.
#[derive(Debug, Serialize)]
struct RunReport<'a> {
    generated_at: String,
    total_items: usize,
    items_with_data: usize,
    fetch_failures: usize,
    results: &'a [ExtractionResult],
}

/// Write results to `{output_dir}/products_nutrition_{stamp}.json`.
#[instrument(level = "info", skip_all, fields(count = results.len()))]
pub async fn write_results(
    results: &[ExtractionResult],
    output_dir: &str,
    stamp: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    let report = RunReport {
        generated_at: Local::now().to_rfc3339(),
        total_items: results.len(),
        items_with_data: results.iter().filter(|r| r.confidence > 0).count(),
        fetch_failures: results.iter().filter(|r| r.fetch_failed).count(),
        results,
    };

    let json = serde_json::to_string(&report)?;
    let path = PathBuf::from(output_dir).join(format!("products_nutrition_{stamp}.json"));
    fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote JSON report");
    Ok(path)
}
