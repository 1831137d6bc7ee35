//! Data models for discovered products and their extracted nutrition facts.
//!
//! This module defines the core data structures used throughout the application:
//! - [`NutritionFacts`]: The fixed field schema every extraction produces
//! - [`ExtractionResult`]: One `NutritionFacts` bound to one URL, with a
//!   fetch-failure marker and a derived confidence count
//! - [`DiscoverySession`]: Bookkeeping for a single catalog discovery run
//! - [`RetryPolicy`]: Per-item fetch retry configuration
//! - [`SiteProfile`]: The target site's URL conventions
//!
//! # Schema Discipline
//!
//! `NutritionFacts` is always fully instantiated: every numeric field exists
//! from construction and holds the `"0"` sentinel until a value is written.
//! Fields are write-once — [`NutritionFacts::set_once`] refuses a second
//! write, so a table-pass value can never be clobbered by a text-pass value.

use serde::Serialize;
use std::time::Duration;
use url::Url;

/// Sentinel value for a numeric field no heuristic managed to populate.
pub const FIELD_SENTINEL: &str = "0";

/// The fixed set of numeric nutrition fields, in output order.
///
/// The order here is the column order of the CSV sink and the iteration
/// order of [`NutritionFacts::numeric_values`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Portion,
    Calories,
    Carbohydrates,
    Protein,
    TotalFat,
    SaturatedFat,
    Fiber,
    Sugar,
    Sodium,
}

impl Field {
    /// All numeric fields in schema order.
    pub const ALL: [Field; 9] = [
        Field::Portion,
        Field::Calories,
        Field::Carbohydrates,
        Field::Protein,
        Field::TotalFat,
        Field::SaturatedFat,
        Field::Fiber,
        Field::Sugar,
        Field::Sodium,
    ];

    /// Column header used by the CSV sink.
    pub fn column(self) -> &'static str {
        match self {
            Field::Portion => "PORTION_G",
            Field::Calories => "CALORIES_KCAL",
            Field::Carbohydrates => "CARBS_G",
            Field::Protein => "PROTEIN_G",
            Field::TotalFat => "TOTAL_FAT_G",
            Field::SaturatedFat => "SAT_FAT_G",
            Field::Fiber => "FIBER_G",
            Field::Sugar => "SUGAR_G",
            Field::Sodium => "SODIUM_MG",
        }
    }
}

/// Nutrition facts for one product page.
///
/// Identity fields (`url`, `name`) plus nine numeric fields as dot-decimal
/// strings. Numeric fields default to [`FIELD_SENTINEL`]; `name` defaults to
/// the empty string. No partial instance of this schema ever exists.
#[derive(Debug, Clone, Serialize)]
pub struct NutritionFacts {
    /// The product page this record was extracted from.
    pub url: String,
    /// Product display name, empty when no heuristic matched.
    pub name: String,
    /// Serving size in grams.
    pub portion_g: String,
    /// Energy per serving in kcal.
    pub calories_kcal: String,
    /// Carbohydrates per serving in grams.
    pub carbohydrates_g: String,
    /// Protein per serving in grams.
    pub protein_g: String,
    /// Total fat per serving in grams.
    pub total_fat_g: String,
    /// Saturated fat per serving in grams.
    pub saturated_fat_g: String,
    /// Dietary fiber per serving in grams.
    pub fiber_g: String,
    /// Sugars per serving in grams.
    pub sugar_g: String,
    /// Sodium per serving in milligrams.
    pub sodium_mg: String,
}

impl NutritionFacts {
    /// Create a fully-instantiated record with every numeric field at the
    /// sentinel and an empty name.
    pub fn empty(url: &str) -> Self {
        let s = FIELD_SENTINEL.to_string();
        NutritionFacts {
            url: url.to_string(),
            name: String::new(),
            portion_g: s.clone(),
            calories_kcal: s.clone(),
            carbohydrates_g: s.clone(),
            protein_g: s.clone(),
            total_fat_g: s.clone(),
            saturated_fat_g: s.clone(),
            fiber_g: s.clone(),
            sugar_g: s.clone(),
            sodium_mg: s,
        }
    }

    /// Read a numeric field.
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Portion => &self.portion_g,
            Field::Calories => &self.calories_kcal,
            Field::Carbohydrates => &self.carbohydrates_g,
            Field::Protein => &self.protein_g,
            Field::TotalFat => &self.total_fat_g,
            Field::SaturatedFat => &self.saturated_fat_g,
            Field::Fiber => &self.fiber_g,
            Field::Sugar => &self.sugar_g,
            Field::Sodium => &self.sodium_mg,
        }
    }

    /// Write a numeric field unless it already left the sentinel.
    ///
    /// Returns `true` when the write happened. This is what enforces the
    /// table-pass-wins rule between extraction passes.
    pub fn set_once(&mut self, field: Field, value: String) -> bool {
        let slot = match field {
            Field::Portion => &mut self.portion_g,
            Field::Calories => &mut self.calories_kcal,
            Field::Carbohydrates => &mut self.carbohydrates_g,
            Field::Protein => &mut self.protein_g,
            Field::TotalFat => &mut self.total_fat_g,
            Field::SaturatedFat => &mut self.saturated_fat_g,
            Field::Fiber => &mut self.fiber_g,
            Field::Sugar => &mut self.sugar_g,
            Field::Sodium => &mut self.sodium_mg,
        };
        if slot.as_str() != FIELD_SENTINEL {
            return false;
        }
        *slot = value;
        true
    }

    /// Whether a field still holds the sentinel.
    pub fn is_unset(&self, field: Field) -> bool {
        self.get(field) == FIELD_SENTINEL
    }

    /// Numeric field values in schema order, for the tabular sink.
    pub fn numeric_values(&self) -> [&str; 9] {
        [
            &self.portion_g,
            &self.calories_kcal,
            &self.carbohydrates_g,
            &self.protein_g,
            &self.total_fat_g,
            &self.saturated_fat_g,
            &self.fiber_g,
            &self.sugar_g,
            &self.sodium_mg,
        ]
    }

    /// Count of numeric fields that left the sentinel.
    pub fn populated_fields(&self) -> usize {
        Field::ALL.iter().filter(|f| !self.is_unset(**f)).count()
    }
}

/// One processed item: the facts, a fetch-failure marker, and a confidence
/// count derived from how many fields the extractor populated.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    /// The extracted (or default-filled) schema instance.
    pub facts: NutritionFacts,
    /// Set when every fetch attempt for this URL failed.
    pub fetch_failed: bool,
    /// Number of numeric fields not at the sentinel.
    pub confidence: usize,
}

impl ExtractionResult {
    /// Wrap a successful extraction, deriving the confidence count.
    pub fn extracted(facts: NutritionFacts) -> Self {
        let confidence = facts.populated_fields();
        ExtractionResult {
            facts,
            fetch_failed: false,
            confidence,
        }
    }

    /// Default-filled record for a URL whose fetch attempts were exhausted.
    pub fn fetch_failure(url: &str) -> Self {
        ExtractionResult {
            facts: NutritionFacts::empty(url),
            fetch_failed: true,
            confidence: 0,
        }
    }
}

/// Terminal state of one discovery run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryEnd {
    /// Re-extraction produced no new URLs.
    Converged,
    /// The "load more" control was not found; all content assumed loaded.
    NoControl,
    /// Native and script clicks both failed.
    ClickFailed,
    /// The iteration bound was reached before convergence.
    MaxIterations,
    /// The cooperative abort flag was set between iterations.
    Aborted,
    /// The render session failed mid-loop; partial results were kept.
    SessionLost,
}

/// Bookkeeping for a single `discover()` call.
///
/// Owned exclusively by the interaction controller and returned to the
/// caller inside the discovery report once the run ends.
#[derive(Debug, Clone)]
pub struct DiscoverySession {
    /// Number of loop iterations entered.
    pub iterations: usize,
    /// Number of successful "load more" interactions.
    pub interactions: usize,
    /// Cardinality of the accepted-URL set after the last extraction.
    pub last_cardinality: usize,
    /// How the run ended; `None` only while the run is live.
    pub end: Option<DiscoveryEnd>,
}

impl DiscoverySession {
    pub fn new() -> Self {
        DiscoverySession {
            iterations: 0,
            interactions: 0,
            last_cardinality: 0,
            end: None,
        }
    }
}

impl Default for DiscoverySession {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounded-retry configuration applied per item by the processing pipeline.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts before a URL is recorded as a fetch failure.
    pub max_attempts: usize,
    /// Initial backoff delay; doubles with each failed attempt.
    pub base_delay: Duration,
    /// Cap applied to the computed backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// URL conventions of the target catalog.
///
/// The discovery extractor accepts only links that stay on `base`'s host,
/// end with `product_suffix`, and avoid the denylisted path segments.
#[derive(Debug, Clone)]
pub struct SiteProfile {
    /// Site root all relative hrefs are resolved against.
    pub base: Url,
    /// Path of the all-products catalog page, joined onto `base`.
    pub catalog_path: String,
    /// Trailing path marker identifying a product endpoint.
    pub product_suffix: String,
}

impl SiteProfile {
    pub fn new(base: Url, catalog_path: &str, product_suffix: &str) -> Self {
        SiteProfile {
            base,
            catalog_path: catalog_path.to_string(),
            product_suffix: product_suffix.to_string(),
        }
    }

    /// Absolute URL of the catalog page.
    pub fn catalog_url(&self) -> Result<Url, url::ParseError> {
        self.base.join(&self.catalog_path)
    }
}
