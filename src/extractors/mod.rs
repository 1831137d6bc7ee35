//! Pure extraction over immutable DOM snapshots.
//!
//! Everything in this module tree is stateless and reentrant: functions take
//! a parsed snapshot ([`scraper::Html`]) and return owned data, never
//! touching the live render session. That split is what lets the interaction
//! controller own the browser exclusively while extraction stays trivially
//! testable against fixture HTML.
//!
//! # Submodules
//!
//! - [`selectors`]: Ranked locator cascade for the "load more" control
//! - [`urls`]: Product URL discovery, normalization, and filtering
//! - [`nutrition`]: Table-first/text-fallback nutrition field extraction

pub mod nutrition;
pub mod selectors;
pub mod urls;
