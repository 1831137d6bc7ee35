//! Ranked locator cascade for the "load more" control.
//!
//! The catalog's markup is unversioned and shifts between deployments, so a
//! single selector cannot be trusted. Instead one shared, ordered strategy
//! table pairs each locator predicate with a confidence rank, most-specific
//! first: exact multi-class match, partial class, exact text, substring
//! text, then generic id/attribute patterns. The resolver walks the table
//! against a snapshot and returns the first match that also looks visible
//! and interactable.
//!
//! The winning match carries an XPath rendering of its predicate so the
//! controller can address the same element inside the live page — both for
//! the native click and for the script-click fallback.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// How specific the matching predicate is. Strategies are stored in
/// descending confidence order; the rank is carried on the match for
/// logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Confidence {
    Exact,
    Strong,
    Moderate,
    Weak,
}

/// One way of recognizing the control element.
#[derive(Debug, Clone, Copy)]
pub enum Predicate {
    /// Element of `tag` carrying every class in `classes`.
    AllClasses {
        tag: &'static str,
        classes: &'static [&'static str],
    },
    /// Element of `tag` carrying `class`.
    Class {
        tag: &'static str,
        class: &'static str,
    },
    /// Element of `tag` whose own text, whitespace-collapsed, equals `text`.
    ExactText {
        tag: &'static str,
        text: &'static str,
    },
    /// Element of `tag` with a direct text node containing `text`.
    /// `tag` may be `"*"`.
    TextContains {
        tag: &'static str,
        text: &'static str,
    },
    /// Element with the given id.
    Id { id: &'static str },
    /// Element of `tag` whose attribute `attr` contains `value`.
    AttrContains {
        tag: &'static str,
        attr: &'static str,
        value: &'static str,
    },
}

/// A ranked entry in the strategy table.
#[derive(Debug, Clone, Copy)]
pub struct LocatorStrategy {
    pub predicate: Predicate,
    pub confidence: Confidence,
}

/// The element the cascade settled on.
#[derive(Debug, Clone)]
pub struct ControlMatch {
    /// XPath addressing the element in the live page.
    pub xpath: String,
    /// Rank of the winning strategy.
    pub confidence: Confidence,
    /// Index of the winning strategy in the table.
    pub strategy_index: usize,
    /// Collapsed element text, for logging.
    pub text: String,
}

/// Strategy table for the incremental-reveal control, most-specific first.
///
/// The top entries target the storefront framework's exact button classes;
/// the text entries cover the label variants the catalog has shipped; the
/// tail covers generic load-more idioms.
static LOAD_MORE_STRATEGIES: &[LocatorStrategy] = &[
    LocatorStrategy {
        predicate: Predicate::AllClasses {
            tag: "button",
            classes: &["vtex-button", "bg-action-primary", "t-action--small"],
        },
        confidence: Confidence::Exact,
    },
    LocatorStrategy {
        predicate: Predicate::AllClasses {
            tag: "button",
            classes: &["vtex-button", "bg-action-primary"],
        },
        confidence: Confidence::Strong,
    },
    LocatorStrategy {
        predicate: Predicate::ExactText {
            tag: "button",
            text: "Mostrar mais",
        },
        confidence: Confidence::Strong,
    },
    LocatorStrategy {
        predicate: Predicate::ExactText {
            tag: "button",
            text: "Ver mais produtos",
        },
        confidence: Confidence::Strong,
    },
    LocatorStrategy {
        predicate: Predicate::TextContains {
            tag: "*",
            text: "Mostrar mais",
        },
        confidence: Confidence::Moderate,
    },
    LocatorStrategy {
        predicate: Predicate::TextContains {
            tag: "*",
            text: "Ver mais produtos",
        },
        confidence: Confidence::Moderate,
    },
    LocatorStrategy {
        predicate: Predicate::TextContains {
            tag: "*",
            text: "Carregar mais",
        },
        confidence: Confidence::Moderate,
    },
    LocatorStrategy {
        predicate: Predicate::Class {
            tag: "button",
            class: "load-more",
        },
        confidence: Confidence::Weak,
    },
    LocatorStrategy {
        predicate: Predicate::Class {
            tag: "a",
            class: "load-more",
        },
        confidence: Confidence::Weak,
    },
    LocatorStrategy {
        predicate: Predicate::Class {
            tag: "button",
            class: "show-more",
        },
        confidence: Confidence::Weak,
    },
    LocatorStrategy {
        predicate: Predicate::Id { id: "load-more" },
        confidence: Confidence::Weak,
    },
    LocatorStrategy {
        predicate: Predicate::AttrContains {
            tag: "a",
            attr: "onclick",
            value: "load",
        },
        confidence: Confidence::Weak,
    },
];

/// Confidence-ordered resolver over a locator strategy table.
#[derive(Debug, Clone, Copy)]
pub struct SelectorResolver {
    strategies: &'static [LocatorStrategy],
}

impl SelectorResolver {
    /// Resolver for the catalog's "load more" control.
    pub fn load_more() -> Self {
        SelectorResolver {
            strategies: LOAD_MORE_STRATEGIES,
        }
    }

    /// Walk the table in order and return the first visible, interactable
    /// match. Per-strategy evaluation failures are swallowed — a broken
    /// selector just falls through to the next rank.
    pub fn resolve(&self, snapshot: &Html) -> Option<ControlMatch> {
        for (index, strategy) in self.strategies.iter().enumerate() {
            let Some(element) = find_interactable(snapshot, &strategy.predicate) else {
                continue;
            };
            let matched = ControlMatch {
                xpath: predicate_xpath(&strategy.predicate),
                confidence: strategy.confidence,
                strategy_index: index,
                text: collapsed_text(&element),
            };
            debug!(
                strategy = index,
                confidence = ?matched.confidence,
                text = %matched.text,
                "Control located"
            );
            return Some(matched);
        }
        None
    }
}

static UNIVERSAL: Lazy<Selector> = Lazy::new(|| Selector::parse("*").unwrap());

/// First element in document order that satisfies the predicate AND looks
/// interactable; later siblings matching the same predicate are considered
/// before the strategy is given up on.
fn find_interactable<'a>(snapshot: &'a Html, predicate: &Predicate) -> Option<ElementRef<'a>> {
    let tag = predicate_tag(predicate);
    let selector;
    let compiled = if tag == "*" {
        &*UNIVERSAL
    } else {
        selector = Selector::parse(tag).ok()?;
        &selector
    };
    snapshot
        .select(compiled)
        .find(|el| predicate_matches(predicate, el) && is_interactable(el))
}

fn predicate_tag(predicate: &Predicate) -> &'static str {
    match *predicate {
        Predicate::AllClasses { tag, .. }
        | Predicate::Class { tag, .. }
        | Predicate::ExactText { tag, .. }
        | Predicate::TextContains { tag, .. }
        | Predicate::AttrContains { tag, .. } => tag,
        Predicate::Id { .. } => "*",
    }
}

fn predicate_matches(predicate: &Predicate, el: &ElementRef) -> bool {
    match *predicate {
        Predicate::AllClasses { classes, .. } => classes
            .iter()
            .all(|wanted| el.value().classes().any(|c| c == *wanted)),
        Predicate::Class { class, .. } => el.value().classes().any(|c| c == class),
        Predicate::ExactText { text, .. } => collapsed_text(el) == text,
        // Direct text nodes only: matching the subtree text would accept
        // every ancestor up to <body>.
        Predicate::TextContains { text, .. } => direct_text(el).contains(text),
        Predicate::Id { id } => el.value().id() == Some(id),
        Predicate::AttrContains { attr, value, .. } => {
            el.value().attr(attr).is_some_and(|v| v.contains(value))
        }
    }
}

/// XPath form of a predicate, mirroring the snapshot-side match closely
/// enough to address the same element in the live page.
fn predicate_xpath(predicate: &Predicate) -> String {
    match predicate {
        Predicate::AllClasses { tag, classes } => {
            let conditions = classes
                .iter()
                .map(|c| format!("contains(@class,'{c}')"))
                .collect::<Vec<_>>()
                .join(" and ");
            format!("//{tag}[{conditions}]")
        }
        Predicate::Class { tag, class } => format!("//{tag}[contains(@class,'{class}')]"),
        Predicate::ExactText { tag, text } => {
            format!("//{tag}[normalize-space(.)='{text}']")
        }
        Predicate::TextContains { tag, text } => format!("//{tag}[contains(text(),'{text}')]"),
        Predicate::Id { id } => format!("//*[@id='{id}']"),
        Predicate::AttrContains { tag, attr, value } => {
            format!("//{tag}[contains(@{attr},'{value}')]")
        }
    }
}

/// Static stand-in for "visible and enabled": a snapshot cannot run layout,
/// but the attributes that usually hide or disable a control are checkable.
fn is_interactable(el: &ElementRef) -> bool {
    let element = el.value();
    if element.attr("disabled").is_some() || element.attr("hidden").is_some() {
        return false;
    }
    if element.attr("aria-hidden") == Some("true") {
        return false;
    }
    if let Some(style) = element.attr("style") {
        let style: String = style.chars().filter(|c| !c.is_whitespace()).collect();
        if style.contains("display:none") || style.contains("visibility:hidden") {
            return false;
        }
    }
    true
}

/// Full subtree text with whitespace collapsed.
fn collapsed_text(el: &ElementRef) -> String {
    el.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Concatenated direct child text nodes.
fn direct_text(el: &ElementRef) -> String {
    el.children()
        .filter_map(|node| node.value().as_text().map(|t| t.to_string()))
        .collect()
}
