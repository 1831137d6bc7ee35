//! Live render session abstraction.
//!
//! The interaction controller never talks to a browser directly — it drives
//! a [`RenderSession`], which is the injected collaborator contract for a
//! live rendering engine: navigate, snapshot the rendered DOM, run a script,
//! click an element, pause. The production implementation sits in
//! [`chrome`]; tests substitute scripted fakes.
//!
//! All methods are blocking by design. The browser protocol client is
//! synchronous, so discovery as a whole runs on a blocking task while the
//! rest of the application stays async.

pub mod chrome;

use serde_json::Value;
use std::time::Duration;

/// Errors surfaced by a live render session.
///
/// Only [`SessionError::Launch`] is fatal to a run — it means no session
/// could be acquired at all. Everything else ends discovery early with
/// partial results.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The browser process could not be started or no tab opened.
    #[error("failed to launch render session: {0}")]
    Launch(String),
    /// Navigation to a page failed or never completed.
    #[error("navigation failed: {0}")]
    Navigate(String),
    /// The rendered DOM could not be captured.
    #[error("snapshot failed: {0}")]
    Snapshot(String),
    /// Script evaluation failed inside the page.
    #[error("script failed: {0}")]
    Script(String),
    /// A native click on a located element failed.
    #[error("click failed: {0}")]
    Click(String),
}

/// A live rendering session owned by the interaction controller.
///
/// Implementations hold whatever engine state they need (browser process,
/// tab handle). The controller calls [`RenderSession::close`] on every exit
/// path; implementations must make `close` idempotent.
pub trait RenderSession {
    /// Navigate to `url` and wait for the engine's own load signal.
    fn navigate(&mut self, url: &str) -> Result<(), SessionError>;

    /// Capture the rendered DOM as an HTML string.
    ///
    /// The returned snapshot is immutable; the pure extractors parse it
    /// without touching the live page again.
    fn snapshot(&mut self) -> Result<String, SessionError>;

    /// Evaluate a script in the page and return its completion value.
    fn run_script(&mut self, code: &str) -> Result<Value, SessionError>;

    /// Click the first element matching `xpath` through the engine's input
    /// pipeline (a trusted event, unlike a script click).
    fn click(&mut self, xpath: &str) -> Result<(), SessionError>;

    /// Block for `duration`.
    fn sleep(&mut self, duration: Duration);

    /// Release the underlying engine. Must be safe to call more than once.
    fn close(&mut self);
}
