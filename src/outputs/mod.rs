//! Output generation for CSV, JSON, and plain URL lists.
//!
//! The persistence sink is deliberately thin: it takes the ordered result
//! list the pipeline produced and writes it out, nothing more.
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── products_nutrition_20250506_143000.csv
//! ├── products_nutrition_20250506_143000.json
//! └── product_urls_20250506_143000.txt   # discovery-only runs
//! ```

pub mod csv;
pub mod json;

use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, instrument};

/// Write the discovered URL list as one URL per line.
///
/// Used by discovery-only runs, where no item processing happens.
#[instrument(level = "info", skip_all, fields(count = urls.len()))]
pub async fn write_url_list(
    urls: &[String],
    output_dir: &str,
    stamp: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    let path = PathBuf::from(output_dir).join(format!("product_urls_{stamp}.txt"));
    let mut body = urls.join("\n");
    if !body.is_empty() {
        body.push('\n');
    }
    fs::write(&path, body).await?;
    info!(path = %path.display(), "Wrote URL list");
    Ok(path)
}
