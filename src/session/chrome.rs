//! `headless_chrome` implementation of [`RenderSession`].
//!
//! Chrome DevTools operations are blocking; callers run the whole session
//! on a blocking task. Browser binary location is left entirely to
//! `headless_chrome`'s own lookup.

use super::{RenderSession, SessionError};
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// User agent argument matching the fetch side, so the catalog sees one
/// consistent client.
const USER_AGENT_ARG: &str =
    "--user-agent=Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Launch configuration for [`ChromeSession`].
#[derive(Debug, Clone)]
pub struct ChromeConfig {
    /// Run without a visible window.
    pub headless: bool,
    /// Viewport size; the catalog hides the control on narrow layouts.
    pub window_size: (u32, u32),
}

impl Default for ChromeConfig {
    fn default() -> Self {
        ChromeConfig {
            headless: true,
            window_size: (1920, 1080),
        }
    }
}

/// One Chrome process plus the single tab discovery drives.
pub struct ChromeSession {
    browser: Option<Browser>,
    tab: Arc<Tab>,
}

impl ChromeSession {
    /// Start the browser and open the working tab.
    ///
    /// This is the only failure in the system that propagates to the
    /// caller: without a session there is nothing to discover.
    pub fn launch(config: &ChromeConfig) -> Result<Self, SessionError> {
        let options = LaunchOptions {
            headless: config.headless,
            sandbox: false,
            window_size: Some(config.window_size),
            args: vec![
                OsStr::new("--disable-gpu"),
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new(USER_AGENT_ARG),
            ],
            idle_browser_timeout: Duration::from_secs(120),
            ..Default::default()
        };

        let browser = Browser::new(options).map_err(|e| SessionError::Launch(e.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| SessionError::Launch(e.to_string()))?;

        info!(headless = config.headless, "Render session started");
        Ok(ChromeSession {
            browser: Some(browser),
            tab,
        })
    }
}

impl RenderSession for ChromeSession {
    fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        debug!(%url, "Navigating");
        self.tab
            .navigate_to(url)
            .map_err(|e| SessionError::Navigate(e.to_string()))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| SessionError::Navigate(e.to_string()))?;
        Ok(())
    }

    fn snapshot(&mut self) -> Result<String, SessionError> {
        self.tab
            .get_content()
            .map_err(|e| SessionError::Snapshot(e.to_string()))
    }

    fn run_script(&mut self, code: &str) -> Result<Value, SessionError> {
        let object = self
            .tab
            .evaluate(code, false)
            .map_err(|e| SessionError::Script(e.to_string()))?;
        Ok(object.value.unwrap_or(Value::Null))
    }

    fn click(&mut self, xpath: &str) -> Result<(), SessionError> {
        let element = self
            .tab
            .find_element_by_xpath(xpath)
            .map_err(|e| SessionError::Click(e.to_string()))?;
        element
            .click()
            .map_err(|e| SessionError::Click(e.to_string()))?;
        Ok(())
    }

    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn close(&mut self) {
        if let Some(browser) = self.browser.take() {
            drop(browser);
            info!("Render session closed");
        }
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        self.close();
    }
}
