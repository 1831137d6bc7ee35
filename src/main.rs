//! # Nutri Harvest
//!
//! A scraper that collects nutrition facts for every product of a
//! client-rendered supplement catalog. The catalog reveals its products
//! incrementally behind a "load more" control, and the product pages carry
//! their nutrition tables in unversioned, shifting markup — so both halves
//! of the job are heuristic: a convergence-detecting interaction loop for
//! discovery, and a layered table-first/text-fallback extractor per item.
//!
//! ## Usage
//!
//! ```sh
//! nutri_harvest -o ./data
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Discovery**: drive a headless browser against the catalog until the
//!    extracted URL set stops growing
//! 2. **Processing**: fetch each product page over plain HTTP (with bounded
//!    retry) and extract the fixed nutrition field schema
//! 3. **Output**: write timestamped CSV and JSON files
//!
//! Discovery runs on a blocking task because the browser protocol client is
//! synchronous; item processing stays on the async runtime.

use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};
use url::Url;

mod cli;
mod discovery;
mod extractors;
mod fetch;
mod models;
mod outputs;
mod pipeline;
mod session;
mod utils;

use cli::Cli;
use discovery::{DiscoveryConfig, PageInteractionController};
use fetch::{HttpFetcher, RetryFetch};
use models::{RetryPolicy, SiteProfile};
use pipeline::{ItemProcessingPipeline, PipelineConfig};
use session::chrome::{ChromeConfig, ChromeSession};
use utils::{ensure_writable_dir, run_stamp};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("nutri_harvest starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let base = Url::parse(&args.base_url).map_err(|e| {
        error!(base_url = %args.base_url, error = %e, "Base URL is not a valid URL");
        e
    })?;
    let site = SiteProfile::new(base, &args.catalog_path, &args.product_suffix);

    // Early check: ensure the output dir is writable
    if let Err(e) = ensure_writable_dir(&args.output_dir).await {
        error!(
            path = %args.output_dir,
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    // Cooperative abort: Ctrl-C sets the flag, both loops check it between
    // steps and keep whatever they already collected.
    let abort = Arc::new(AtomicBool::new(false));
    {
        let abort = Arc::clone(&abort);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl-C received; finishing current step and stopping");
                abort.store(true, Ordering::Relaxed);
            }
        });
    }

    // ---- Discovery (blocking task: the browser client is synchronous) ----
    let chrome_config = ChromeConfig {
        headless: !args.headed,
        ..ChromeConfig::default()
    };
    let discovery_config = DiscoveryConfig {
        max_iterations: args.max_iterations,
        settle_poll: Duration::from_secs(args.settle_poll_secs),
        settle_timeout: Duration::from_secs(args.settle_timeout_secs),
        ..DiscoveryConfig::default()
    };

    let discovery_site = site.clone();
    let discovery_abort = Arc::clone(&abort);
    let report = tokio::task::spawn_blocking(move || {
        let session = ChromeSession::launch(&chrome_config)?;
        let controller = PageInteractionController::new(
            session,
            discovery_site,
            discovery_config,
            discovery_abort,
        );
        Ok::<_, session::SessionError>(controller.discover())
    })
    .await??;

    info!(
        urls = report.urls.len(),
        iterations = report.session.iterations,
        interactions = report.session.interactions,
        end = ?report.session.end,
        "Discovery complete"
    );

    if report.urls.is_empty() {
        warn!("No product URLs discovered; nothing to process");
        return Ok(());
    }

    let stamp = run_stamp();

    if args.urls_only {
        let path = outputs::write_url_list(&report.urls, &args.output_dir, &stamp).await?;
        info!(path = %path.display(), count = report.urls.len(), "URL collection finished");
        return Ok(());
    }

    // ---- Item processing ----
    let fetcher = RetryFetch::new(
        HttpFetcher::new(Duration::from_secs(args.request_timeout_secs))?,
        RetryPolicy {
            max_attempts: args.fetch_retries,
            ..RetryPolicy::default()
        },
    );
    let pipeline = ItemProcessingPipeline::new(
        fetcher,
        PipelineConfig {
            item_delay: Duration::from_secs(args.item_delay_secs),
        },
        Arc::clone(&abort),
    );
    let results = pipeline.process(&report.urls).await;

    let with_data = results.iter().filter(|r| r.confidence > 0).count();
    let failures = results.iter().filter(|r| r.fetch_failed).count();
    info!(
        total = results.len(),
        with_data,
        failures,
        "Item processing complete"
    );

    // ---- Outputs ----
    match outputs::csv::write_results(&results, &args.output_dir, &stamp) {
        Ok(path) => info!(path = %path.display(), "CSV written"),
        Err(e) => error!(error = %e, "Failed to write CSV output"),
    }
    if let Err(e) = outputs::json::write_results(&results, &args.output_dir, &stamp).await {
        error!(error = %e, "Failed to write JSON report");
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        products = results.len(),
        with_data,
        "Execution complete"
    );

    Ok(())
}
