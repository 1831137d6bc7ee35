//! Command-line interface definitions.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Site parameters can also be provided via environment variables.

use clap::Parser;

/// Command-line arguments for the nutrition harvester.
///
/// # Examples
///
/// ```sh
/// # Full run: discover products, fetch each, write CSV + JSON
/// nutri_harvest -o ./data
///
/// # Discovery only, with a visible browser window
/// nutri_harvest -o ./data --urls-only --headed
///
/// # Point at another storefront with the same conventions
/// nutri_harvest -o ./data --base-url https://store.example --catalog-path /all-products
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Output directory for CSV/JSON/URL files
    #[arg(short, long, default_value = "./data")]
    pub output_dir: String,

    /// Site root the catalog lives under
    #[arg(long, env = "NUTRI_HARVEST_BASE_URL", default_value = "https://www.integralmedica.com.br")]
    pub base_url: String,

    /// Path of the all-products catalog page
    #[arg(long, env = "NUTRI_HARVEST_CATALOG_PATH", default_value = "/todos-os-produtos")]
    pub catalog_path: String,

    /// Trailing path marker identifying product endpoints
    #[arg(long, default_value = "/p")]
    pub product_suffix: String,

    /// Show the browser window instead of running headless
    #[arg(long)]
    pub headed: bool,

    /// Stop after URL discovery and write the URL list only
    #[arg(long)]
    pub urls_only: bool,

    /// Maximum load-more interactions before discovery gives up
    #[arg(long, default_value_t = 8)]
    pub max_iterations: usize,

    /// Seconds between post-click settle polls
    #[arg(long, default_value_t = 2)]
    pub settle_poll_secs: u64,

    /// Upper bound in seconds on each post-click settle wait
    #[arg(long, default_value_t = 12)]
    pub settle_timeout_secs: u64,

    /// Per-request timeout in seconds for item fetches
    #[arg(long, default_value_t = 15)]
    pub request_timeout_secs: u64,

    /// Fetch attempts per item before recording a failure
    #[arg(long, default_value_t = 3)]
    pub fetch_retries: usize,

    /// Politeness delay in seconds between item fetches
    #[arg(long, default_value_t = 2)]
    pub item_delay_secs: u64,
}
