//! Parsed page wrapper and small DOM helpers shared by the engines.

use std::sync::OnceLock;

use scraper::{ElementRef, Html, Selector};

use crate::types::{ToolkitError, ToolkitResult};

/// Tags that start a new line when text is rendered.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr",
    "li", "main", "nav", "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

/// A parsed HTML document together with the URL it was loaded from.
///
/// `scraper` documents are `!Send`, so a `Page` is built and consumed inside
/// one synchronous call. Async callers keep the raw HTML and parse on demand.
pub struct Page {
    document: Html,
    url: String,
}

impl Page {
    /// Parse a full HTML document.
    pub fn parse(html: &str, url: &str) -> Self {
        Self {
            document: Html::parse_document(html),
            url: url.to_string(),
        }
    }

    pub fn document(&self) -> &Html {
        &self.document
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Text of the `<title>` element, trimmed.
    pub fn title(&self) -> String {
        static TITLE: OnceLock<Option<Selector>> = OnceLock::new();
        TITLE
            .get_or_init(|| Selector::parse("title").ok())
            .as_ref()
            .and_then(|sel| self.document.select(sel).next())
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default()
    }

    /// Host name of the page URL, empty when the URL cannot be parsed.
    pub fn domain(&self) -> String {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default()
    }

    /// The `<body>` element, or the root element for body-less fragments.
    pub fn body(&self) -> ElementRef<'_> {
        static BODY: OnceLock<Option<Selector>> = OnceLock::new();
        BODY.get_or_init(|| Selector::parse("body").ok())
            .as_ref()
            .and_then(|sel| self.document.select(sel).next())
            .unwrap_or_else(|| self.document.root_element())
    }
}

/// Compile a list of CSS selectors, failing on the first invalid one.
pub fn compile_selectors(patterns: &[&str]) -> ToolkitResult<Vec<Selector>> {
    patterns
        .iter()
        .map(|pattern| {
            Selector::parse(pattern).map_err(|e| ToolkitError::Selector {
                selector: pattern.to_string(),
                reason: format!("{e:?}"),
            })
        })
        .collect()
}

/// Concatenated text content of an element (every descendant text node).
pub fn text_content(element: ElementRef<'_>) -> String {
    element.text().collect()
}

/// Rendered-ish text: text nodes with a space inserted at block boundaries.
pub fn visible_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in element.descendants() {
        if let Some(text) = node.value().as_text() {
            out.push_str(text);
        } else if let Some(el) = node.value().as_element() {
            if BLOCK_TAGS.contains(&el.name()) {
                out.push(' ');
            }
        }
    }
    out
}

/// Collapse every whitespace run to a single space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parent element of `element`, if any.
pub fn parent_element<'a>(element: ElementRef<'a>) -> Option<ElementRef<'a>> {
    element.parent().and_then(ElementRef::wrap)
}

/// A CSS path that selects exactly `element` in its document.
pub fn css_path(element: ElementRef<'_>) -> String {
    let mut segments = Vec::new();
    let mut current = Some(element);

    while let Some(el) = current {
        let name = el.value().name();
        if let Some(id) = el.value().id().filter(|id| is_plain_ident(id)) {
            segments.push(format!("#{id}"));
            break;
        }
        if name == "html" {
            segments.push("html".to_string());
            break;
        }
        let position = el
            .prev_siblings()
            .filter(|sibling| sibling.value().is_element())
            .count()
            + 1;
        segments.push(format!("{name}:nth-child({position})"));
        current = parent_element(el);
    }

    segments.reverse();
    segments.join(" > ")
}

fn is_plain_ident(id: &str) -> bool {
    let mut chars = id.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_and_domain() {
        let page = Page::parse(
            "<html><head><title>  Hello </title></head><body></body></html>",
            "https://example.com/a/b",
        );
        assert_eq!(page.title(), "Hello");
        assert_eq!(page.domain(), "example.com");
    }

    #[test]
    fn test_domain_of_invalid_url() {
        let page = Page::parse("<p>x</p>", "not a url");
        assert_eq!(page.domain(), "");
    }

    #[test]
    fn test_visible_text_separates_blocks() {
        let page = Page::parse("<body><p>one</p><p>two</p><b>th</b>ree</body>", "");
        let text = collapse_whitespace(&visible_text(page.body()));
        assert_eq!(text, "one two three");
    }

    #[test]
    fn test_css_path_selects_element() {
        let page = Page::parse(
            "<body><div><span>a</span><span>b</span></div></body>",
            "",
        );
        let sel = Selector::parse("span").unwrap();
        let second = page.document().select(&sel).nth(1).unwrap();
        let path = css_path(second);
        assert_eq!(path, "html > body:nth-child(2) > div:nth-child(1) > span:nth-child(2)");

        let reparsed = Selector::parse(&path).unwrap();
        let found: Vec<_> = page.document().select(&reparsed).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text().collect::<String>(), "b");
    }

    #[test]
    fn test_css_path_stops_at_id() {
        let page = Page::parse("<body><div id=\"q1\"><input></div></body>", "");
        let sel = Selector::parse("input").unwrap();
        let input = page.document().select(&sel).next().unwrap();
        assert_eq!(css_path(input), "#q1 > input:nth-child(1)");
    }
}
