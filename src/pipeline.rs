//! Sequential per-item fetch and extraction over discovered URLs.
//!
//! The pipeline walks the discovered URL list in order: fetch through the
//! injected [`PageFetcher`] (already retry-wrapped by the caller), parse,
//! run the nutrition extractor, and move on. A URL whose attempts are all
//! exhausted is recorded as a default-filled result with an explicit
//! fetch-failure marker — one dead page never aborts the batch.
//!
//! A fixed inter-request delay is applied between items purely as
//! throttling; there is no concurrency here by design, and the abort flag
//! is consulted once per item so a caller can stop between requests.

use crate::extractors::nutrition;
use crate::fetch::PageFetcher;
use crate::models::ExtractionResult;
use crate::utils::truncate_for_log;
use scraper::Html;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, instrument};

/// Pipeline timing configuration.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Politeness delay between consecutive items.
    pub item_delay: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            item_delay: Duration::from_secs(2),
        }
    }
}

/// Walks discovered URLs and aggregates one result per URL.
pub struct ItemProcessingPipeline<F: PageFetcher> {
    fetcher: F,
    config: PipelineConfig,
    abort: Arc<AtomicBool>,
}

impl<F: PageFetcher> ItemProcessingPipeline<F> {
    pub fn new(fetcher: F, config: PipelineConfig, abort: Arc<AtomicBool>) -> Self {
        ItemProcessingPipeline {
            fetcher,
            config,
            abort,
        }
    }

    /// Process every URL in order, one result each, failures included.
    ///
    /// On abort the already-processed prefix is returned.
    #[instrument(level = "info", skip_all, fields(total = urls.len()))]
    pub async fn process(&self, urls: &[String]) -> Vec<ExtractionResult> {
        let mut results = Vec::with_capacity(urls.len());

        for (index, url) in urls.iter().enumerate() {
            if self.abort.load(Ordering::Relaxed) {
                info!(processed = results.len(), "Abort requested; stopping batch");
                break;
            }
            if index > 0 {
                tokio::time::sleep(self.config.item_delay).await;
            }

            let result = match self.fetcher.fetch(url).await {
                Ok(body) => {
                    let doc = Html::parse_document(&body);
                    let result = ExtractionResult::extracted(nutrition::extract(&doc, url));
                    if result.confidence == 0 {
                        debug!(
                            %url,
                            body = %truncate_for_log(body.trim(), 160),
                            "Page yielded no nutrition fields"
                        );
                    }
                    result
                }
                Err(e) => {
                    error!(%url, error = %e, "Item fetch exhausted attempts");
                    ExtractionResult::fetch_failure(url)
                }
            };

            info!(
                item = index + 1,
                total = urls.len(),
                confidence = result.confidence,
                fetch_failed = result.fetch_failed,
                %url,
                "Item processed"
            );
            results.push(result);
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchError;
    use crate::models::FIELD_SENTINEL;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MapFetcher {
        pages: HashMap<String, String>,
        calls: Mutex<Vec<String>>,
    }

    impl MapFetcher {
        fn new(pages: &[(&str, &str)]) -> Self {
            MapFetcher {
                pages: pages
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl PageFetcher for MapFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.calls.lock().unwrap().push(url.to_string());
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::Client("no such page".to_string()))
        }
    }

    fn pipeline(fetcher: MapFetcher) -> ItemProcessingPipeline<MapFetcher> {
        ItemProcessingPipeline::new(
            fetcher,
            PipelineConfig {
                item_delay: Duration::ZERO,
            },
            Arc::new(AtomicBool::new(false)),
        )
    }

    const WHEY: &str = "https://loja.example/whey/p";
    const CREATINE: &str = "https://loja.example/creatina/p";

    fn whey_page() -> String {
        r#"<table class="tabela-nutricional">
            <tr><td>Proteínas</td><td>25,5 g</td></tr>
            <tr><td>Calorias</td><td>120 kcal</td></tr>
        </table>"#
            .to_string()
    }

    #[tokio::test]
    async fn test_results_follow_input_order() {
        let fetcher = MapFetcher::new(&[(WHEY, &whey_page()), (CREATINE, "<p>nada aqui</p>")]);
        let urls = vec![CREATINE.to_string(), WHEY.to_string()];
        let results = pipeline(fetcher).process(&urls).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].facts.url, CREATINE);
        assert_eq!(results[1].facts.url, WHEY);
        assert_eq!(results[1].facts.protein_g, "25.5");
        assert_eq!(results[1].confidence, 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_records_marked_default_result() {
        let fetcher = MapFetcher::new(&[(WHEY, &whey_page())]);
        let urls = vec![
            "https://loja.example/fora-do-ar/p".to_string(),
            WHEY.to_string(),
        ];
        let results = pipeline(fetcher).process(&urls).await;

        assert_eq!(results.len(), 2);
        assert!(results[0].fetch_failed);
        assert_eq!(results[0].confidence, 0);
        assert_eq!(results[0].facts.protein_g, FIELD_SENTINEL);
        // The batch continued past the failure.
        assert!(!results[1].fetch_failed);
        assert_eq!(results[1].facts.calories_kcal, "120");
    }

    #[tokio::test]
    async fn test_abort_keeps_processed_prefix() {
        let fetcher = MapFetcher::new(&[(WHEY, &whey_page())]);
        let abort = Arc::new(AtomicBool::new(true));
        let pipeline = ItemProcessingPipeline::new(
            fetcher,
            PipelineConfig {
                item_delay: Duration::ZERO,
            },
            abort,
        );
        let urls = vec![WHEY.to_string()];
        let results = pipeline.process(&urls).await;

        assert!(results.is_empty());
        assert!(pipeline.fetcher.calls.lock().unwrap().is_empty());
    }
}
