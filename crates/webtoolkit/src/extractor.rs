//! Main-content extraction.
//!
//! Every element matched by any candidate selector is scored and the global
//! maximum wins; selector order only breaks ties. When nothing good enough is
//! found a broader scan runs with a stricter length floor, and the document
//! body is the terminal fallback. Cleanup happens on a cloned document so the
//! source page is never mutated.

use std::sync::OnceLock;

use scraper::{ElementRef, Html, Selector};

use crate::page::{self, Page};
use crate::sanitize::sanitize_html;
use crate::scorer::score;
use crate::types::{ExtractionResult, ScoredCandidate, ToolkitError, ToolkitResult};

/// Landmarks, then site conventions, then LMS/quiz layouts.
const CANDIDATE_SELECTORS: &[&str] = &[
    "main",
    "[role=\"main\"]",
    "#content",
    ".content",
    "#main",
    ".main",
    "article",
    ".article",
    "#post",
    ".post",
    ".entry-content",
    ".post-content",
    ".article-content",
    ".page-content",
    ".single-content",
    ".blog-post",
    ".story-content",
    ".quiz-content",
    ".course-content",
    ".lesson-content",
    ".main-content",
    ".primary-content",
    "#primary",
    ".primary",
    "#container .content",
    ".container .content",
    ".wrapper .content",
    "#wrapper .content",
    "[data-region='content']",
    ".content-area",
    ".site-content",
    ".page-wrapper .content",
    ".quiz-body",
    ".question-content",
    ".course-body",
];

const FALLBACK_SELECTOR: &str = "div, section, article, main, p";

/// Removed from the chosen subtree before its text is taken.
const NOISE_SELECTORS: &[&str] = &[
    "script",
    "style",
    "nav",
    "header",
    "footer",
    "aside",
    ".sidebar",
    ".nav",
    ".navigation",
    ".navbar",
    ".menu",
    ".breadcrumb",
    ".breadcrumbs",
    ".advertisement",
    ".ad",
    ".ads",
    ".banner",
    ".social",
    ".social-share",
    ".comments",
    ".comment",
    ".share",
    ".sharing",
    ".related",
    ".related-posts",
    ".recommended",
    ".popup",
    ".modal",
    ".overlay",
    ".toolbar",
    ".control",
    ".controls",
    ".button-group",
    ".pagination",
    ".pager",
    ".meta",
    ".metadata",
    ".tags",
    ".categories",
    ".author",
    ".date",
    ".timestamp",
    ".byline",
    ".widget",
    ".promo",
    ".promotional",
    ".newsletter",
    ".subscription",
    ".alert",
    ".notification",
    ".warning",
    ".error",
    ".success",
    "[role='complementary']",
    "[role='banner']",
    "[role='navigation']",
    "[role='contentinfo']",
    "[aria-label*='navigation']",
    "[aria-label*='menu']",
    "[class*='quiz-nav']",
    "[class*='navigation']",
    "[class*='sidebar']",
    "[class*='header']",
    "[class*='footer']",
    "[id*='nav']",
    "[id*='sidebar']",
    "[id*='header']",
    "[id*='footer']",
];

/// Raw text length a selector match needs to be considered.
const MIN_CANDIDATE_CHARS: usize = 50;
/// Raw text length a fallback-scan match needs.
const MIN_FALLBACK_CHARS: usize = 100;
/// A first-pass winner below this score triggers the fallback scan.
const MIN_CONFIDENT_SCORE: f64 = 10.0;

struct ExtractorSelectors {
    candidates: Vec<Selector>,
    fallback: Selector,
    noise: Vec<Selector>,
}

fn selectors() -> ToolkitResult<&'static ExtractorSelectors> {
    static SELECTORS: OnceLock<Result<ExtractorSelectors, String>> = OnceLock::new();
    SELECTORS
        .get_or_init(|| {
            let build = || -> ToolkitResult<ExtractorSelectors> {
                Ok(ExtractorSelectors {
                    candidates: page::compile_selectors(CANDIDATE_SELECTORS)?,
                    fallback: page::compile_selectors(&[FALLBACK_SELECTOR])?.remove(0),
                    noise: page::compile_selectors(NOISE_SELECTORS)?,
                })
            };
            build().map_err(|e| e.to_string())
        })
        .as_ref()
        .map_err(|reason| ToolkitError::Selector {
            selector: "<extractor selector table>".to_string(),
            reason: reason.clone(),
        })
}

/// Extract the main content of `page`.
///
/// Never fails: internal errors produce an empty result with `error` set.
pub fn extract(page: &Page) -> ExtractionResult {
    let url = page.url();
    let title = page.title();
    let domain = page.domain();

    match try_extract(page) {
        Ok((text, html)) => {
            tracing::debug!(url, chars = text.len(), "Extracted main content");
            ExtractionResult {
                text,
                html,
                url: url.to_string(),
                title,
                domain,
                error: None,
            }
        }
        Err(e) => {
            tracing::warn!(url, "Content extraction degraded: {e}");
            ExtractionResult::degraded(url, &title, &domain, e.to_string())
        }
    }
}

/// Parse `html` and extract its main content.
pub fn extract_html(html: &str, url: &str) -> ExtractionResult {
    extract(&Page::parse(html, url))
}

fn try_extract(page: &Page) -> ToolkitResult<(String, String)> {
    let selectors = selectors()?;
    let chosen = select_main_element(page, selectors);

    let text = clean_text(page.document(), chosen, &selectors.noise);
    let html = sanitize_html(&chosen.inner_html()).trim().to_string();
    Ok((text, html))
}

/// Pick the highest-scoring candidate, falling back to the body.
fn select_main_element<'a>(page: &'a Page, selectors: &ExtractorSelectors) -> ElementRef<'a> {
    let document = page.document();
    let mut best: Option<ScoredCandidate<'a>> = None;

    for selector in &selectors.candidates {
        for element in document.select(selector) {
            consider(&mut best, element, MIN_CANDIDATE_CHARS);
        }
    }

    let confident = best.is_some_and(|c| c.score >= MIN_CONFIDENT_SCORE);
    if !confident {
        for element in document.select(&selectors.fallback) {
            consider(&mut best, element, MIN_FALLBACK_CHARS);
        }
    }

    match best {
        Some(candidate) => {
            tracing::debug!(
                tag = candidate.element.value().name(),
                score = candidate.score,
                "Selected main content element"
            );
            candidate.element
        }
        None => {
            tracing::debug!("No content candidate qualified; using document body");
            page.body()
        }
    }
}

/// Replace `best` when `element` scores strictly higher and has enough text.
fn consider<'a>(best: &mut Option<ScoredCandidate<'a>>, element: ElementRef<'a>, min_chars: usize) {
    let text = page::text_content(element);
    let s = score(element, &text);
    let floor = best.map_or(0.0, |c| c.score);
    if s > floor && text.trim().chars().count() > min_chars {
        *best = Some(ScoredCandidate { element, score: s });
    }
}

/// Text of `chosen` with noise descendants removed, from a cloned document.
fn clean_text(document: &Html, chosen: ElementRef<'_>, noise: &[Selector]) -> String {
    let mut scratch = document.clone();
    let root_id = chosen.id();

    let doomed: Vec<_> = match scratch.tree.get(root_id).and_then(ElementRef::wrap) {
        Some(root) => noise
            .iter()
            .flat_map(|sel| root.select(sel).map(|el| el.id()))
            .collect(),
        None => Vec::new(),
    };

    for id in doomed {
        if let Some(mut node) = scratch.tree.get_mut(id) {
            node.detach();
        }
    }

    scratch
        .tree
        .get(root_id)
        .and_then(ElementRef::wrap)
        .map(|root| page::collapse_whitespace(&page::visible_text(root)))
        .unwrap_or_default()
}
