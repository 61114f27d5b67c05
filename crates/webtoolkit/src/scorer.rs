//! Heuristic relevance score for a candidate content subtree.
//!
//! The score is a running total of independent terms (text length, tag name,
//! class/id lexicon, ARIA role, `data-region`, navigation density and
//! structural richness), clamped at zero. All lexicon terms that match are
//! applied, so an identifier containing both "nav" and "content" gets both
//! deltas.

use std::sync::OnceLock;

use scraper::{ElementRef, Selector};


/// Identifier substrings that suggest main content.
const POSITIVE_IDENTIFIERS: &[(&str, f64)] = &[
    ("content", 30.0),
    ("main", 30.0),
    ("article", 25.0),
    ("post", 25.0),
    ("story", 20.0),
    ("blog", 20.0),
    ("text", 15.0),
    ("body", 15.0),
    ("entry", 15.0),
    ("page-content", 25.0),
    ("single-content", 25.0),
    ("post-content", 25.0),
    ("quiz-content", 30.0),
    ("course-content", 30.0),
    ("lesson-content", 30.0),
    ("question", 20.0),
    ("quiz-body", 25.0),
];

/// Identifier substrings that suggest page chrome.
const NEGATIVE_IDENTIFIERS: &[(&str, f64)] = &[
    ("sidebar", 40.0),
    ("nav", 40.0),
    ("navigation", 40.0),
    ("footer", 30.0),
    ("header", 30.0),
    ("menu", 35.0),
    ("toolbar", 30.0),
    ("breadcrumb", 25.0),
    ("comment", 20.0),
    ("ad", 50.0),
    ("advertisement", 50.0),
    ("banner", 30.0),
    ("popup", 40.0),
    ("modal", 40.0),
    ("overlay", 40.0),
    ("control", 25.0),
    ("pagination", 25.0),
    ("meta", 20.0),
    ("widget", 30.0),
];

const ROLE_DELTAS: &[(&str, f64)] = &[
    ("main", 50.0),
    ("article", 30.0),
    ("complementary", -30.0),
    ("banner", -30.0),
    ("navigation", -40.0),
    ("contentinfo", -30.0),
];

/// More navigation-like descendants than this costs `NAV_DENSITY_PENALTY`.
const NAV_DENSITY_LIMIT: usize = 2;
const NAV_DENSITY_PENALTY: f64 = 20.0;

struct ScorerSelectors {
    navigation: Option<Selector>,
    paragraphs: Option<Selector>,
    headings: Option<Selector>,
}

fn selectors() -> &'static ScorerSelectors {
    static SELECTORS: OnceLock<ScorerSelectors> = OnceLock::new();
    SELECTORS.get_or_init(|| ScorerSelectors {
        navigation: Selector::parse("nav, .nav, .navigation, .menu").ok(),
        paragraphs: Selector::parse("p").ok(),
        headings: Selector::parse("h1, h2, h3, h4, h5, h6").ok(),
    })
}

fn count_matches(element: ElementRef<'_>, selector: Option<&Selector>) -> usize {
    selector.map_or(0, |sel| element.select(sel).count())
}

/// Score `element`, whose text content is `text`.
///
/// Pure and deterministic; missing attributes count as empty strings.
pub fn score(element: ElementRef<'_>, text: &str) -> f64 {
    let el = element.value();
    let mut total = 0.0;

    let text_len = text.trim().chars().count() as f64;
    total += (text_len / 50.0).min(100.0);

    total += match el.name() {
        "main" => 50.0,
        "article" => 40.0,
        "section" => 25.0,
        "p" => 10.0,
        "div" => 5.0,
        _ => 0.0,
    };

    let identifiers = format!(
        "{} {}",
        el.attr("class").unwrap_or(""),
        el.attr("id").unwrap_or("")
    )
    .to_lowercase();

    for (needle, delta) in POSITIVE_IDENTIFIERS {
        if identifiers.contains(needle) {
            total += delta;
        }
    }
    for (needle, delta) in NEGATIVE_IDENTIFIERS {
        if identifiers.contains(needle) {
            total -= delta;
        }
    }

    if let Some(role) = el.attr("role") {
        for (name, delta) in ROLE_DELTAS {
            if role == *name {
                total += delta;
            }
        }
    }

    if el
        .attr("data-region")
        .is_some_and(|region| region.contains("content"))
    {
        total += 20.0;
    }

    let selectors = selectors();
    if count_matches(element, selectors.navigation.as_ref()) > NAV_DENSITY_LIMIT {
        total -= NAV_DENSITY_PENALTY;
    }

    let paragraphs = count_matches(element, selectors.paragraphs.as_ref()) as f64;
    let headings = count_matches(element, selectors.headings.as_ref()) as f64;
    total += (paragraphs * 2.0).min(20.0);
    total += (headings * 3.0).min(15.0);

    total.max(0.0)
}
