//! Catalog discovery: drive the live page until the URL set stops growing.
//!
//! The catalog renders client-side and reveals products incrementally
//! through a "load more" control, so discovery is an interaction loop, not a
//! single fetch: scroll to the bottom, locate the control, click it, wait
//! for the render to settle, re-extract URLs, and stop at the first of
//! {no growth, no control, click failure, iteration bound, abort}.
//!
//! The controller owns the render session exclusively for one
//! [`discover`](PageInteractionController::discover) call and closes it on
//! every exit path. Nothing in the loop is fatal: mid-loop session errors
//! end the run with whatever URLs were already accepted.
//!
//! # Waiting
//!
//! The page offers no load-complete signal. After each click the controller
//! polls snapshots and compares content digests until two consecutive polls
//! agree (bounded by a timeout); the same no-growth contract as a fixed
//! delay, without hardcoding the duration.

use crate::extractors::selectors::{ControlMatch, SelectorResolver};
use crate::extractors::urls;
use crate::models::{DiscoveryEnd, DiscoverySession, SiteProfile};
use crate::session::{RenderSession, SessionError};
use scraper::Html;
use serde_json::Value;
use std::collections::HashSet;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Scrolls to the page bottom and reports the new scroll extent.
const SCROLL_TO_BOTTOM_JS: &str =
    "window.scrollTo(0, document.body.scrollHeight); document.body.scrollHeight";

/// Timing and bound configuration for one discovery run.
#[derive(Debug, Clone, Copy)]
pub struct DiscoveryConfig {
    /// Upper bound on interaction loop iterations.
    pub max_iterations: usize,
    /// Pause after the initial navigation before the first extraction.
    pub initial_settle: Duration,
    /// Pause between scroll-extent polls.
    pub scroll_poll: Duration,
    /// Bound on scroll-extent polls per iteration.
    pub max_scroll_polls: usize,
    /// Pause between post-click settle polls.
    pub settle_poll: Duration,
    /// Bound on the total post-click settle wait.
    pub settle_timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        DiscoveryConfig {
            max_iterations: 8,
            initial_settle: Duration::from_secs(5),
            scroll_poll: Duration::from_secs(2),
            max_scroll_polls: 15,
            settle_poll: Duration::from_secs(2),
            settle_timeout: Duration::from_secs(12),
        }
    }
}

/// Outcome of one discovery run: the accepted URLs in first-seen order plus
/// the session bookkeeping.
#[derive(Debug)]
pub struct DiscoveryReport {
    pub urls: Vec<String>,
    pub session: DiscoverySession,
}

/// Drives one render session through the discovery loop.
pub struct PageInteractionController<S: RenderSession> {
    session: S,
    site: SiteProfile,
    config: DiscoveryConfig,
    resolver: SelectorResolver,
    abort: Arc<AtomicBool>,
}

impl<S: RenderSession> PageInteractionController<S> {
    pub fn new(
        session: S,
        site: SiteProfile,
        config: DiscoveryConfig,
        abort: Arc<AtomicBool>,
    ) -> Self {
        PageInteractionController {
            session,
            site,
            config,
            resolver: SelectorResolver::load_more(),
            abort,
        }
    }

    /// Run the full discovery loop and release the session.
    ///
    /// Never fails: whatever the loop managed to accept is returned, with
    /// the terminal state recorded in the report.
    #[instrument(level = "info", skip_all)]
    pub fn discover(mut self) -> DiscoveryReport {
        let report = self.run();
        self.session.close();
        info!(
            urls = report.urls.len(),
            iterations = report.session.iterations,
            interactions = report.session.interactions,
            end = ?report.session.end,
            "Discovery finished"
        );
        report
    }

    fn run(&mut self) -> DiscoveryReport {
        let mut state = DiscoverySession::new();
        let mut accepted: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        let catalog = match self.site.catalog_url() {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Catalog URL did not resolve");
                state.end = Some(DiscoveryEnd::SessionLost);
                return DiscoveryReport {
                    urls: accepted,
                    session: state,
                };
            }
        };

        info!(url = %catalog, "Opening catalog");
        if let Err(e) = self.session.navigate(catalog.as_str()) {
            warn!(error = %e, "Initial navigation failed");
            state.end = Some(DiscoveryEnd::SessionLost);
            return DiscoveryReport {
                urls: accepted,
                session: state,
            };
        }
        self.session.sleep(self.config.initial_settle);

        // Seed the accepted set from the first render, before any clicks.
        match self.extract_current() {
            Ok(fresh) => merge(&mut accepted, &mut seen, fresh),
            Err(e) => {
                warn!(error = %e, "Initial extraction failed");
                state.end = Some(DiscoveryEnd::SessionLost);
                return DiscoveryReport {
                    urls: accepted,
                    session: state,
                };
            }
        }
        state.last_cardinality = accepted.len();
        info!(initial = accepted.len(), "Seeded URL set from first render");

        for iteration in 1..=self.config.max_iterations {
            if self.abort.load(Ordering::Relaxed) {
                info!(iteration, "Abort requested; stopping discovery");
                state.end = Some(DiscoveryEnd::Aborted);
                break;
            }
            state.iterations = iteration;
            debug!(iteration, "Discovery iteration");

            if let Err(e) = self.scroll_to_bottom() {
                warn!(iteration, error = %e, "Scrolling failed; keeping partial results");
                state.end = Some(DiscoveryEnd::SessionLost);
                break;
            }

            let control = match self.session.snapshot() {
                Ok(html) => {
                    let doc = Html::parse_document(&html);
                    self.resolver.resolve(&doc)
                }
                Err(e) => {
                    warn!(iteration, error = %e, "Snapshot failed; keeping partial results");
                    state.end = Some(DiscoveryEnd::SessionLost);
                    break;
                }
            };
            let Some(control) = control else {
                info!(
                    iteration,
                    "Load-more control not found; assuming all content is loaded"
                );
                state.end = Some(DiscoveryEnd::NoControl);
                break;
            };

            // Bring the control into the viewport before the trusted click.
            let _ = self.session.run_script(&scroll_into_view_js(&control.xpath));
            self.session.sleep(self.config.scroll_poll);

            if !self.click_control(&control) {
                warn!(
                    iteration,
                    strategy = control.strategy_index,
                    "Native and script clicks both failed; stopping discovery"
                );
                state.end = Some(DiscoveryEnd::ClickFailed);
                break;
            }
            state.interactions += 1;
            info!(
                iteration,
                interactions = state.interactions,
                confidence = ?control.confidence,
                "Clicked load-more control"
            );

            let html = match self.settle_after_click() {
                Ok(html) => html,
                Err(e) => {
                    warn!(iteration, error = %e, "Settle failed; keeping partial results");
                    state.end = Some(DiscoveryEnd::SessionLost);
                    break;
                }
            };
            let doc = Html::parse_document(&html);
            let fresh = urls::extract(&doc, &self.site);
            let before = accepted.len();
            merge(&mut accepted, &mut seen, fresh);
            state.last_cardinality = accepted.len();
            info!(iteration, total = accepted.len(), "URL set after interaction");

            if accepted.len() == before {
                info!(iteration, total = accepted.len(), "No growth; discovery converged");
                state.end = Some(DiscoveryEnd::Converged);
                break;
            }
        }

        if state.end.is_none() {
            warn!(
                max_iterations = self.config.max_iterations,
                "Iteration bound reached before convergence"
            );
            state.end = Some(DiscoveryEnd::MaxIterations);
        }

        DiscoveryReport {
            urls: accepted,
            session: state,
        }
    }

    /// Snapshot the page and run the URL extractor once.
    fn extract_current(&mut self) -> Result<Vec<String>, SessionError> {
        let html = self.session.snapshot()?;
        let doc = Html::parse_document(&html);
        Ok(urls::extract(&doc, &self.site))
    }

    /// Scroll to the bottom until the scroll extent stops growing across
    /// consecutive polls, bounded by `max_scroll_polls`.
    fn scroll_to_bottom(&mut self) -> Result<(), SessionError> {
        let mut last = self.scroll_extent()?;
        for _ in 0..self.config.max_scroll_polls {
            self.session.sleep(self.config.scroll_poll);
            let next = self.scroll_extent()?;
            if next == last {
                return Ok(());
            }
            last = next;
        }
        debug!("Scroll poll bound reached while the page kept growing");
        Ok(())
    }

    fn scroll_extent(&mut self) -> Result<u64, SessionError> {
        let value = self.session.run_script(SCROLL_TO_BOTTOM_JS)?;
        Ok(value.as_f64().unwrap_or(0.0) as u64)
    }

    /// Native click first; on failure retry once via a script click.
    ///
    /// A second failure is terminal for the run — no fallback to the next
    /// ranked selector, since both paths failing usually means an overlay is
    /// blocking interaction and a lower-confidence match would hit the
    /// wrong element.
    fn click_control(&mut self, control: &ControlMatch) -> bool {
        match self.session.click(&control.xpath) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Native click failed; retrying via script");
                match self.session.run_script(&script_click_js(&control.xpath)) {
                    Ok(Value::Bool(true)) => true,
                    Ok(other) => {
                        debug!(result = %other, "Script click did not reach the element");
                        false
                    }
                    Err(e2) => {
                        warn!(error = %e2, "Script click failed");
                        false
                    }
                }
            }
        }
    }

    /// Poll snapshots after a click until the content digest repeats or the
    /// settle timeout passes; returns the last snapshot either way.
    fn settle_after_click(&mut self) -> Result<String, SessionError> {
        let deadline = Instant::now() + self.config.settle_timeout;
        let mut last_digest: Option<u64> = None;
        loop {
            self.session.sleep(self.config.settle_poll);
            let html = self.session.snapshot()?;
            let digest = content_digest(&html);
            if last_digest == Some(digest) || Instant::now() >= deadline {
                return Ok(html);
            }
            last_digest = Some(digest);
        }
    }
}

/// Append fresh URLs that were never seen, preserving first-seen order.
/// The accepted set can only grow.
fn merge(accepted: &mut Vec<String>, seen: &mut HashSet<String>, fresh: Vec<String>) {
    for url in fresh {
        if seen.insert(url.clone()) {
            accepted.push(url);
        }
    }
}

fn content_digest(html: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    html.hash(&mut hasher);
    hasher.finish()
}

fn script_click_js(xpath: &str) -> String {
    format!(
        r#"(function() {{ var r = document.evaluate("{xpath}", document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue; if (r) {{ r.click(); return true; }} return false; }})()"#
    )
}

fn scroll_into_view_js(xpath: &str) -> String {
    format!(
        r#"(function() {{ var r = document.evaluate("{xpath}", document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue; if (r) {{ r.scrollIntoView({{behavior: 'smooth', block: 'center'}}); return true; }} return false; }})()"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use url::Url;

    /// Shared observable state so tests can inspect the session after the
    /// controller consumed and closed it.
    #[derive(Default)]
    struct FakeState {
        clicks: AtomicUsize,
        closed: AtomicBool,
        navigated: Mutex<Vec<String>>,
    }

    /// Scripted render session. The page shows `counts[clicks]` products
    /// and renders the load-more control while `clicks < control_until`.
    struct FakeSession {
        state: Arc<FakeState>,
        counts: Vec<usize>,
        control_until: usize,
        native_click_works: bool,
        script_click_works: bool,
    }

    impl FakeSession {
        fn new(counts: Vec<usize>, control_until: usize) -> (Self, Arc<FakeState>) {
            let state = Arc::new(FakeState::default());
            let session = FakeSession {
                state: Arc::clone(&state),
                counts,
                control_until,
                native_click_works: true,
                script_click_works: true,
            };
            (session, state)
        }

        fn clicks(&self) -> usize {
            self.state.clicks.load(Ordering::Relaxed)
        }

        fn control_visible(&self) -> bool {
            self.clicks() < self.control_until
        }

        fn render(&self) -> String {
            let count = self.counts[self.clicks().min(self.counts.len() - 1)];
            let mut html = String::from("<main>");
            for i in 0..count {
                html.push_str(&format!(
                    r#"<div class="product-card"><a href="/produto-{i:03}/p">Produto destaque {i:03}</a></div>"#
                ));
            }
            if self.control_visible() {
                html.push_str(
                    r#"<button class="vtex-button bg-action-primary t-action--small">Mostrar mais</button>"#,
                );
            }
            html.push_str("</main>");
            html
        }
    }

    impl RenderSession for FakeSession {
        fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
            self.state.navigated.lock().unwrap().push(url.to_string());
            Ok(())
        }

        fn snapshot(&mut self) -> Result<String, SessionError> {
            Ok(self.render())
        }

        fn run_script(&mut self, code: &str) -> Result<Value, SessionError> {
            if code.contains("scrollHeight") {
                return Ok(json!(4000));
            }
            if code.contains("r.click()") {
                if self.script_click_works && self.control_visible() {
                    self.state.clicks.fetch_add(1, Ordering::Relaxed);
                    return Ok(Value::Bool(true));
                }
                return Ok(Value::Bool(false));
            }
            Ok(Value::Null)
        }

        fn click(&mut self, _xpath: &str) -> Result<(), SessionError> {
            if self.native_click_works && self.control_visible() {
                self.state.clicks.fetch_add(1, Ordering::Relaxed);
                Ok(())
            } else {
                Err(SessionError::Click("click intercepted".to_string()))
            }
        }

        fn sleep(&mut self, _duration: Duration) {}

        fn close(&mut self) {
            self.state.closed.store(true, Ordering::Relaxed);
        }
    }

    fn site() -> SiteProfile {
        SiteProfile::new(
            Url::parse("https://www.integralmedica.com.br").unwrap(),
            "/todos-os-produtos",
            "/p",
        )
    }

    fn config() -> DiscoveryConfig {
        DiscoveryConfig {
            max_iterations: 8,
            initial_settle: Duration::ZERO,
            scroll_poll: Duration::ZERO,
            max_scroll_polls: 3,
            settle_poll: Duration::ZERO,
            settle_timeout: Duration::from_secs(1),
        }
    }

    fn controller(
        session: FakeSession,
    ) -> PageInteractionController<FakeSession> {
        PageInteractionController::new(
            session,
            site(),
            config(),
            Arc::new(AtomicBool::new(false)),
        )
    }

    #[test]
    fn test_discovery_converges_when_count_stops_growing() {
        // 10 seeded, 18 after click one, 25 after click two, 25 again after
        // click three; the control only disappears later.
        let (session, state) = FakeSession::new(vec![10, 18, 25, 25], 3);
        let report = controller(session).discover();

        assert_eq!(report.session.end, Some(DiscoveryEnd::Converged));
        assert_eq!(report.urls.len(), 25);
        assert_eq!(report.session.interactions, 3);
        assert_eq!(report.session.iterations, 3);
        assert_eq!(report.session.last_cardinality, 25);
        assert_eq!(state.clicks.load(Ordering::Relaxed), 3);
        assert!(state.closed.load(Ordering::Relaxed));
        assert_eq!(
            *state.navigated.lock().unwrap(),
            vec!["https://www.integralmedica.com.br/todos-os-produtos".to_string()]
        );
    }

    #[test]
    fn test_missing_control_keeps_initial_results() {
        let (session, state) = FakeSession::new(vec![10], 0);
        let report = controller(session).discover();

        assert_eq!(report.session.end, Some(DiscoveryEnd::NoControl));
        assert_eq!(report.urls.len(), 10);
        assert_eq!(report.session.interactions, 0);
        assert!(state.closed.load(Ordering::Relaxed));
    }

    #[test]
    fn test_both_click_paths_failing_is_terminal() {
        let (mut session, state) = FakeSession::new(vec![10, 18], 5);
        session.native_click_works = false;
        session.script_click_works = false;
        let report = controller(session).discover();

        assert_eq!(report.session.end, Some(DiscoveryEnd::ClickFailed));
        assert_eq!(report.urls.len(), 10);
        assert_eq!(report.session.interactions, 0);
        assert!(state.closed.load(Ordering::Relaxed));
    }

    #[test]
    fn test_script_click_fallback_recovers_from_interception() {
        let (mut session, state) = FakeSession::new(vec![10, 18, 18], 5);
        session.native_click_works = false;
        let report = controller(session).discover();

        assert_eq!(report.session.end, Some(DiscoveryEnd::Converged));
        assert_eq!(report.urls.len(), 18);
        assert_eq!(report.session.interactions, 2);
        assert_eq!(state.clicks.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_iteration_bound_halts_growing_page() {
        let counts: Vec<usize> = (0..20).map(|i| 5 * (i + 1)).collect();
        let (session, state) = FakeSession::new(counts, usize::MAX);
        let mut controller = controller(session);
        controller.config.max_iterations = 3;
        let report = controller.discover();

        assert_eq!(report.session.end, Some(DiscoveryEnd::MaxIterations));
        assert_eq!(report.session.iterations, 3);
        assert_eq!(report.session.interactions, 3);
        assert_eq!(report.urls.len(), 20);
        assert!(state.closed.load(Ordering::Relaxed));
    }

    #[test]
    fn test_abort_flag_stops_before_first_interaction() {
        let (session, state) = FakeSession::new(vec![10, 18], 5);
        let abort = Arc::new(AtomicBool::new(true));
        let controller =
            PageInteractionController::new(session, site(), config(), Arc::clone(&abort));
        let report = controller.discover();

        assert_eq!(report.session.end, Some(DiscoveryEnd::Aborted));
        assert_eq!(report.urls.len(), 10);
        assert_eq!(report.session.interactions, 0);
        assert!(state.closed.load(Ordering::Relaxed));
    }

    #[test]
    fn test_url_set_grows_monotonically() {
        let (session, _state) = FakeSession::new(vec![3, 2, 5], 5);
        let report = controller(session).discover();

        // The second render shrank to 2 products, but the accepted set never
        // drops entries: 3 seeded, then converged at the shrunken render.
        assert_eq!(report.session.end, Some(DiscoveryEnd::Converged));
        assert_eq!(report.urls.len(), 3);
    }
}
