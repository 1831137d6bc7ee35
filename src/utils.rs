//! Utility functions for timestamping, string truncation, and file system checks.

use chrono::Local;
use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

/// Compact local timestamp used in output filenames.
///
/// # Examples
///
/// ```ignore
/// let name = format!("products_nutrition_{}.csv", run_stamp());
/// // products_nutrition_20250506_143000.csv
/// ```
pub fn run_stamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` characters with an ellipsis and
/// byte count indicator appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        format!("{}…(+{} bytes)", &s[..max], s.len() - max)
    }
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then performs a write test by
/// creating and immediately deleting a probe file.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or is not writable
/// (permission denied, read-only filesystem, etc.).
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    if let Err(e) = fs::create_dir_all(path).await {
        return Err(Box::new(e));
    }
    // Small sync write using std fs (simpler error surface)
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_run_stamp_shape() {
        let stamp = run_stamp();
        // YYYYmmdd_HHMMSS
        assert_eq!(stamp.len(), 15);
        assert_eq!(stamp.chars().nth(8), Some('_'));
        assert!(stamp.chars().filter(|c| *c != '_').all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_missing_dir() {
        let dir = std::env::temp_dir().join("nutri_harvest_probe_test");
        let path = dir.to_str().unwrap().to_string();
        let _ = stdfs::remove_dir_all(&dir);
        ensure_writable_dir(&path).await.unwrap();
        assert!(dir.is_dir());
        let _ = stdfs::remove_dir_all(&dir);
    }
}
