//! Product URL discovery over a catalog snapshot.
//!
//! [`extract`] is a pure function: the same snapshot always yields the same
//! ordered URL list. Three independent passes collect candidate hrefs —
//! product-tagged containers, product-keyword paths, then generic anchors
//! with non-trivial link text — and their union is normalized, filtered
//! against the [`SiteProfile`](crate::models::SiteProfile), and deduplicated
//! preserving first-seen order.
//!
//! A candidate survives only when it resolves onto the site's own host,
//! ends with the product path marker, and carries no denylisted path
//! segment. Everything else is rejected with a recorded verdict.

use crate::models::SiteProfile;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

/// Path fragments that mark an anchor as product-related.
const PRODUCT_HINTS: &[&str] = &["produto", "product", "/p/", "whey", "creatina", "barra"];

/// Path segments that disqualify a URL even when it carries the product
/// suffix.
const DENYLIST: &[&str] = &[
    "categoria", "category", "blog", "conta", "account", "carrinho", "cart", "checkout", "login",
];

/// Minimum link-text length for the generic anchor pass.
const MIN_LINK_TEXT: usize = 5;

static ANCHORS: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static CONTAINERS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div, article, li, section").unwrap());
static CONTAINER_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)product|item|card").unwrap());

/// Why a candidate href was kept or dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    /// Not an absolute or root-relative href (fragment, javascript:, mailto:).
    Malformed,
    /// Resolved off the site's host.
    OffSite,
    /// Path does not end with the product marker.
    NotProduct,
    /// Path contains a denylisted segment.
    Denylisted,
}

/// One href as seen in the snapshot, with its normalization outcome.
#[derive(Debug, Clone)]
pub struct CandidateUrl {
    /// The href exactly as it appeared in the anchor.
    pub raw: String,
    /// Absolute form, present whenever the href resolved against the base.
    pub normalized: Option<String>,
    /// Accept/reject decision.
    pub verdict: Verdict,
}

/// Extract the ordered set of absolute product URLs from a snapshot.
///
/// Pure and idempotent; see the module docs for the pass structure.
pub fn extract(snapshot: &Html, site: &SiteProfile) -> Vec<String> {
    let raw = collect_hrefs(snapshot);
    let mut accepted = 0usize;
    let mut rejected = 0usize;

    let urls: Vec<String> = raw
        .iter()
        .map(|href| classify(href, site))
        .inspect(|candidate| match candidate.verdict {
            Verdict::Accepted => accepted += 1,
            _ => rejected += 1,
        })
        .filter(|candidate| candidate.verdict == Verdict::Accepted)
        .filter_map(|candidate| candidate.normalized)
        .unique()
        .collect();

    debug!(
        candidates = raw.len(),
        accepted,
        rejected,
        unique = urls.len(),
        "URL extraction pass complete"
    );
    urls
}

/// Union of the three collection passes, in pass order.
fn collect_hrefs(snapshot: &Html) -> Vec<String> {
    let mut hrefs = Vec::new();

    // Pass 1: anchors inside containers tagged as product/item/card.
    for container in snapshot.select(&CONTAINERS) {
        let tagged = container
            .value()
            .attr("class")
            .is_some_and(|c| CONTAINER_CLASS.is_match(c));
        if !tagged {
            continue;
        }
        for anchor in container.select(&ANCHORS) {
            if let Some(href) = anchor.value().attr("href") {
                hrefs.push(href.to_string());
            }
        }
    }

    // Pass 2: anchors whose target path mentions a product keyword.
    for anchor in snapshot.select(&ANCHORS) {
        if let Some(href) = anchor.value().attr("href") {
            let lower = href.to_lowercase();
            if PRODUCT_HINTS.iter().any(|hint| lower.contains(hint)) {
                hrefs.push(href.to_string());
            }
        }
    }

    // Pass 3: generic anchors with non-trivial link text.
    for anchor in snapshot.select(&ANCHORS) {
        let text = anchor.text().collect::<String>();
        if text.trim().len() > MIN_LINK_TEXT {
            if let Some(href) = anchor.value().attr("href") {
                hrefs.push(href.to_string());
            }
        }
    }

    hrefs
}

/// Normalize one raw href against the site profile and judge it.
pub fn classify(raw: &str, site: &SiteProfile) -> CandidateUrl {
    let candidate = |normalized: Option<String>, verdict: Verdict| CandidateUrl {
        raw: raw.to_string(),
        normalized,
        verdict,
    };

    if !(raw.starts_with('/') || raw.starts_with("http")) {
        return candidate(None, Verdict::Malformed);
    }
    let Ok(resolved) = site.base.join(raw) else {
        return candidate(None, Verdict::Malformed);
    };

    let normalized = resolved.to_string();
    if resolved.host_str() != site.base.host_str() {
        return candidate(Some(normalized), Verdict::OffSite);
    }
    if !resolved.path().ends_with(&site.product_suffix) {
        return candidate(Some(normalized), Verdict::NotProduct);
    }
    let path_lower = resolved.path().to_lowercase();
    if DENYLIST.iter().any(|segment| path_lower.contains(segment)) {
        return candidate(Some(normalized), Verdict::Denylisted);
    }

    candidate(Some(normalized), Verdict::Accepted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn site() -> SiteProfile {
        SiteProfile::new(
            Url::parse("https://www.integralmedica.com.br").unwrap(),
            "/todos-os-produtos",
            "/p",
        )
    }

    #[test]
    fn test_extract_is_idempotent() {
        let html = r#"
            <div class="product-card"><a href="/whey-protein/p">Whey Protein 900g</a></div>
            <div class="product-card"><a href="/creatina-monohidratada/p">Creatina 300g</a></div>
            <a href="/barra-proteica/p">Barra proteica caixa</a>
        "#;
        let doc = Html::parse_document(html);
        let first = extract(&doc, &site());
        let second = extract(&doc, &site());
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_relative_hrefs_resolve_to_absolute() {
        let doc = Html::parse_document(r#"<a href="/whey-protein/p">Whey Protein</a>"#);
        let urls = extract(&doc, &site());
        assert_eq!(
            urls,
            vec!["https://www.integralmedica.com.br/whey-protein/p".to_string()]
        );
    }

    #[test]
    fn test_denylisted_segments_are_excluded() {
        // Both end with the product marker; only the clean one survives.
        let html = r#"
            <a href="/categoria/whey-protein/p">Whey por categoria</a>
            <a href="/carrinho/whey/p">Carrinho whey</a>
            <a href="/whey-protein/p">Whey Protein 900g</a>
        "#;
        let doc = Html::parse_document(html);
        let urls = extract(&doc, &site());
        assert_eq!(
            urls,
            vec!["https://www.integralmedica.com.br/whey-protein/p".to_string()]
        );
    }

    #[test]
    fn test_off_site_and_non_product_links_are_excluded() {
        let html = r#"
            <a href="https://outra-loja.com/whey/p">Whey de outra loja</a>
            <a href="/sobre-a-empresa">Quem somos nós</a>
            <a href="/whey-protein/p">Whey Protein 900g</a>
        "#;
        let doc = Html::parse_document(html);
        let urls = extract(&doc, &site());
        assert_eq!(
            urls,
            vec!["https://www.integralmedica.com.br/whey-protein/p".to_string()]
        );
    }

    #[test]
    fn test_dedup_preserves_first_seen_order() {
        let html = r#"
            <div class="product"><a href="/b-produto/p">Produto B em destaque</a></div>
            <div class="product"><a href="/a-produto/p">Produto A em destaque</a></div>
            <a href="/b-produto/p">Produto B novamente</a>
        "#;
        let doc = Html::parse_document(html);
        let urls = extract(&doc, &site());
        assert_eq!(
            urls,
            vec![
                "https://www.integralmedica.com.br/b-produto/p".to_string(),
                "https://www.integralmedica.com.br/a-produto/p".to_string(),
            ]
        );
    }

    #[test]
    fn test_classify_verdicts() {
        let site = site();
        let accepted = classify("/whey/p", &site);
        assert_eq!(accepted.verdict, Verdict::Accepted);
        assert_eq!(accepted.raw, "/whey/p");
        assert_eq!(
            accepted.normalized.as_deref(),
            Some("https://www.integralmedica.com.br/whey/p")
        );
        assert_eq!(classify("#top", &site).verdict, Verdict::Malformed);
        assert_eq!(
            classify("https://elsewhere.com/whey/p", &site).verdict,
            Verdict::OffSite
        );
        assert_eq!(classify("/whey", &site).verdict, Verdict::NotProduct);
        assert_eq!(
            classify("/checkout/whey/p", &site).verdict,
            Verdict::Denylisted
        );
    }

    #[test]
    fn test_trivial_link_text_needs_product_hint() {
        // Short-text anchor without product hints in the path never enters
        // any pass.
        let doc = Html::parse_document(r#"<a href="/x/p">ver</a>"#);
        let urls = extract(&doc, &site());
        assert!(urls.is_empty());
    }
}
