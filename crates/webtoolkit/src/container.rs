//! Finding the DOM region that holds one question's controls.

use std::sync::OnceLock;

use scraper::{ElementRef, Selector};

use crate::page::{self, Page};

/// Ancestors inspected above an `entry.<id>` input.
const MAX_ANCESTOR_DEPTH: usize = 20;

/// Classes that mark a question block across form renderer generations.
const BLOCK_CLASSES: &[&str] = &["Qr7Oae", "freebirdFormviewerViewItemsItemItem"];

const BLOCK_SELECTOR: &str =
    "[role=\"listitem\"], [data-item-id], .Qr7Oae, .freebirdFormviewerViewItemsItemItem";
const HEADING_SELECTOR: &str =
    "[role=\"heading\"], .M7eMe, .freebirdFormviewerComponentsQuestionBaseTitle";

struct ContainerSelectors {
    params: Selector,
    blocks: Selector,
    heading: Selector,
}

fn selectors() -> Option<&'static ContainerSelectors> {
    static SELECTORS: OnceLock<Option<ContainerSelectors>> = OnceLock::new();
    SELECTORS
        .get_or_init(|| {
            Some(ContainerSelectors {
                params: Selector::parse("[data-params]").ok()?,
                blocks: Selector::parse(BLOCK_SELECTOR).ok()?,
                heading: Selector::parse(HEADING_SELECTOR).ok()?,
            })
        })
        .as_ref()
}

/// Locate the container for a question.
///
/// Tries, in order: an element whose `data-params` mentions the id, the
/// nearest question-block ancestor of an `entry.<id>` input, a block whose
/// heading equals the title, and a block whose text contains the title.
pub fn find_question_container<'a>(
    page: &'a Page,
    id: Option<&str>,
    title: &str,
) -> Option<ElementRef<'a>> {
    let selectors = selectors()?;
    let document = page.document();

    if let Some(id) = id.filter(|id| !id.is_empty()) {
        let by_params = document.select(&selectors.params).find(|el| {
            el.value()
                .attr("data-params")
                .is_some_and(|params| params.contains(id))
        });
        if by_params.is_some() {
            tracing::debug!(id, "Container found by data-params");
            return by_params;
        }

        if let Some(block) = by_entry_input(page, id) {
            tracing::debug!(id, "Container found by entry input");
            return Some(block);
        }
    }

    let title = title.trim();
    if title.is_empty() {
        return None;
    }

    let exact = document.select(&selectors.blocks).find(|block| {
        block
            .select(&selectors.heading)
            .next()
            .is_some_and(|heading| page::text_content(heading).trim() == title)
    });
    if exact.is_some() {
        tracing::debug!(title, "Container found by exact heading");
        return exact;
    }

    let partial = document
        .select(&selectors.blocks)
        .find(|block| page::text_content(*block).contains(title));
    if partial.is_some() {
        tracing::debug!(title, "Container found by title substring");
    }
    partial
}

fn by_entry_input<'a>(page: &'a Page, id: &str) -> Option<ElementRef<'a>> {
    let id = css_string_escape(id);
    let css = format!(
        "[name=\"entry.{id}\"], [name=\"entry.{id}_sentinel\"], input[name*=\"{id}\"]"
    );
    let selector = match Selector::parse(&css) {
        Ok(selector) => selector,
        Err(e) => {
            tracing::debug!("Skipping entry-input lookup: {e:?}");
            return None;
        }
    };

    page.document()
        .select(&selector)
        .find_map(question_block_ancestor)
}

fn question_block_ancestor(input: ElementRef<'_>) -> Option<ElementRef<'_>> {
    let mut current = page::parent_element(input);
    for _ in 0..MAX_ANCESTOR_DEPTH {
        let el = current?;
        if is_question_block(el) {
            return Some(el);
        }
        current = page::parent_element(el);
    }
    None
}

fn is_question_block(el: ElementRef<'_>) -> bool {
    let value = el.value();
    value.attr("role") == Some("listitem")
        || value.attr("data-item-id").is_some()
        || value.attr("data-params").is_some_and(|p| p.len() > 5)
        || value.classes().any(|c| BLOCK_CLASSES.contains(&c))
}

fn css_string_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
