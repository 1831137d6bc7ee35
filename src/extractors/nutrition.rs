//! Nutrition-facts extraction from a product page snapshot.
//!
//! There is no stable markup contract for the nutrition block, so extraction
//! is layered:
//!
//! 1. **Locate** the container: class selectors tuned to known nutrition
//!    markers, then a keyword fallback that walks text-node ancestors and
//!    demands a corroborating field label before accepting one.
//! 2. **Table pass**: rows parsed as label/value pairs against the ordered
//!    field-priority map.
//! 3. **Text pass**: regex sweep over the container's full text for fields
//!    the table pass left at the sentinel.
//!
//! The priority map checks longer phrases before the shorter phrases they
//! contain ("gorduras saturadas" before "gorduras totais" before bare
//! "gorduras"), which is what keeps a saturated-fat row from being counted
//! as total fat. Values accept either comma or dot decimals and are
//! normalized to dot form; a token that fails numeric validation leaves the
//! field untouched. Fields are never written twice.

use crate::models::{Field, NutritionFacts};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Class/attribute selectors for known nutrition-block markup, tried first.
const CONTAINER_SELECTORS: &[&str] = &[
    r#"table[class*="nutri"]"#,
    r#"table[class*="nutrition"]"#,
    r#"div[class*="nutri"]"#,
    r#"div[class*="nutrition"]"#,
    ".nutrition-table",
    ".tabela-nutricional",
    ".informacao-nutricional",
];

/// Keywords that flag a text node as nutrition-related for the fallback
/// container search.
const TEXT_INDICATORS: &[&str] = &[
    "informação nutricional",
    "tabela nutricional",
    "nutricional",
    "nutrition",
];

/// Element names accepted as a nutrition container.
const STRUCTURAL_TAGS: &[&str] = &["table", "div", "section", "article"];

/// How far up the ancestor chain the fallback search walks.
const MAX_ANCESTOR_DEPTH: usize = 5;

/// Selectors for the product display name, most specific first.
const NAME_SELECTORS: &[&str] = &[r#"h1[class*="product"]"#, ".product-name", "h1"];

/// Ordered label→field resolution table.
///
/// Order matters: any phrase that textually contains another must come
/// before it, and the bare "gorduras" catch-all sits last.
const FIELD_PRIORITY: &[(&str, Field)] = &[
    ("gorduras saturadas", Field::SaturatedFat),
    ("gorduras totais", Field::TotalFat),
    ("valor energético", Field::Calories),
    ("carboidratos", Field::Carbohydrates),
    ("proteínas", Field::Protein),
    ("calorias", Field::Calories),
    ("porção", Field::Portion),
    ("fibras", Field::Fiber),
    ("açúcares", Field::Sugar),
    ("sódio", Field::Sodium),
    ("gorduras", Field::TotalFat),
];

static ROWS: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());
static CELLS: Lazy<Selector> = Lazy::new(|| Selector::parse("td, th").unwrap());

/// First integer or decimal token, comma or dot decimal mark.
static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+(?:[.,]\d+)?)").unwrap());

/// Per-field text patterns: a strict `label: value` form and a looser
/// `label ... value` form, both case-insensitive.
static TEXT_PATTERNS: Lazy<Vec<(Regex, Regex, Field)>> = Lazy::new(|| {
    FIELD_PRIORITY
        .iter()
        .map(|(phrase, field)| {
            let escaped = regex::escape(phrase);
            let strict = Regex::new(&format!(r"(?i){escaped}[:\s]*(\d+(?:[.,]\d+)?)")).unwrap();
            let loose = Regex::new(&format!(r"(?i){escaped}.*?(\d+(?:[.,]\d+)?)")).unwrap();
            (strict, loose, *field)
        })
        .collect()
});

/// Extract the full field schema from one product page snapshot.
///
/// Always returns a complete [`NutritionFacts`]; fields no heuristic
/// matched stay at the sentinel.
pub fn extract(snapshot: &Html, url: &str) -> NutritionFacts {
    let mut facts = NutritionFacts::empty(url);
    facts.name = extract_name(snapshot);

    let Some(container) = locate_container(snapshot) else {
        debug!(%url, "No nutrition container located");
        return facts;
    };

    table_pass(&container, &mut facts);
    text_pass(&container, &mut facts);

    debug!(
        %url,
        populated = facts.populated_fields(),
        "Nutrition extraction complete"
    );
    facts
}

/// Product display name, empty when nothing matches.
fn extract_name(snapshot: &Html) -> String {
    for css in NAME_SELECTORS {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        if let Some(el) = snapshot.select(&selector).next() {
            let name = collapsed_text(&el);
            if !name.is_empty() {
                return name;
            }
        }
    }
    String::new()
}

/// Find the element most likely to hold the nutrition block.
///
/// Marker selectors win outright. The fallback accepts an ancestor of a
/// keyword text node only when the ancestor is a structural element whose
/// full text also mentions one of the field labels — a keyword alone
/// nearby is not enough to trust an unrelated wrapper.
fn locate_container(snapshot: &Html) -> Option<ElementRef<'_>> {
    for css in CONTAINER_SELECTORS {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        if let Some(el) = snapshot.select(&selector).next() {
            return Some(el);
        }
    }

    for node in snapshot.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let lower = text.to_lowercase();
        if !TEXT_INDICATORS.iter().any(|k| lower.contains(k)) {
            continue;
        }
        for (depth, ancestor) in node.ancestors().enumerate() {
            if depth >= MAX_ANCESTOR_DEPTH {
                break;
            }
            let Some(el) = ElementRef::wrap(ancestor) else {
                continue;
            };
            if !STRUCTURAL_TAGS.contains(&el.value().name()) {
                continue;
            }
            let full = el.text().collect::<String>().to_lowercase();
            if FIELD_PRIORITY.iter().any(|(phrase, _)| full.contains(phrase)) {
                return Some(el);
            }
        }
    }

    None
}

/// Row-by-row pass over any tabular rows inside the container.
fn table_pass(container: &ElementRef, facts: &mut NutritionFacts) {
    for row in container.select(&ROWS) {
        let cells: Vec<ElementRef> = row.select(&CELLS).collect();
        if cells.len() < 2 {
            continue;
        }
        let label = collapsed_text(&cells[0]).to_lowercase();
        let Some((_, field)) = FIELD_PRIORITY
            .iter()
            .find(|(phrase, _)| label.contains(phrase))
        else {
            continue;
        };
        if !facts.is_unset(*field) {
            continue;
        }
        let value = cells[1].text().collect::<String>();
        if let Some(number) = first_number(&value) {
            facts.set_once(*field, number);
        }
    }
}

/// Regex sweep over the container's full text for still-unset fields.
fn text_pass(container: &ElementRef, facts: &mut NutritionFacts) {
    let text = container.text().collect::<String>();
    for (strict, loose, field) in TEXT_PATTERNS.iter() {
        if !facts.is_unset(*field) {
            continue;
        }
        let token = strict
            .captures(&text)
            .or_else(|| loose.captures(&text))
            .and_then(|cap| cap.get(1))
            .map(|m| m.as_str());
        if let Some(token) = token {
            if let Some(number) = validate_number(token) {
                facts.set_once(*field, number);
            }
        }
    }
}

/// First numeric token of a raw value cell, validated and normalized.
fn first_number(raw: &str) -> Option<String> {
    let token = NUMBER.captures(raw)?.get(1)?.as_str();
    validate_number(token)
}

/// Normalize a comma or dot decimal token; reject anything that does not
/// parse as a number.
fn validate_number(token: &str) -> Option<String> {
    let normalized = token.replace(',', ".");
    normalized.parse::<f64>().ok()?;
    Some(normalized)
}

fn collapsed_text(el: &ElementRef) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
