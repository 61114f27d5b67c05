//! Best-effort HTML cleanup for stored markup.
//!
//! This is a regex denylist, not a parser-based sanitizer. It strips
//! `<script>`/`<style>` blocks, inline `on*=` handlers and `javascript:`
//! schemes. It does NOT make stored HTML safe to render: markup that hides
//! script behind other vectors (SVG, `srcdoc`, entity-encoded schemes) passes
//! through unchanged.

use std::sync::OnceLock;

use regex::Regex;

struct Patterns {
    script: Regex,
    style: Regex,
    handler_double: Regex,
    handler_single: Regex,
    handler_bare: Regex,
    js_scheme: Regex,
}

fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(Patterns {
                script: Regex::new(r"(?is)<script\b.*?</script\s*>").ok()?,
                style: Regex::new(r"(?is)<style\b.*?</style\s*>").ok()?,
                handler_double: Regex::new(r#"(?i)\son\w+\s*=\s*"[^"]*""#).ok()?,
                handler_single: Regex::new(r"(?i)\son\w+\s*=\s*'[^']*'").ok()?,
                handler_bare: Regex::new(r#"(?i)\son\w+\s*=\s*[^\s>"']+"#).ok()?,
                js_scheme: Regex::new(r"(?i)javascript:").ok()?,
            })
        })
        .as_ref()
}

/// Strip the denylisted constructs from `html`.
pub fn sanitize_html(html: &str) -> String {
    let Some(p) = patterns() else {
        tracing::warn!("Sanitizer patterns failed to compile; returning markup unchanged");
        return html.to_string();
    };

    let html = p.script.replace_all(html, "");
    let html = p.style.replace_all(&html, "");
    let html = p.handler_double.replace_all(&html, "");
    let html = p.handler_single.replace_all(&html, "");
    let html = p.handler_bare.replace_all(&html, "");
    p.js_scheme.replace_all(&html, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_script_and_style_blocks() {
        let html = "<p>a</p><script type=\"x\">alert('<b>')</script><STYLE>p{}</STYLE><p>b</p>";
        assert_eq!(sanitize_html(html), "<p>a</p><p>b</p>");
    }

    #[test]
    fn test_strips_event_handlers() {
        let html = r#"<a href="/x" onclick="steal()">x</a><img src=y onerror='boom()'><b onload=go>z</b>"#;
        assert_eq!(sanitize_html(html), r#"<a href="/x">x</a><img src=y><b>z</b>"#);
    }

    #[test]
    fn test_strips_javascript_scheme() {
        let html = r#"<a href="JavaScript:alert(1)">x</a>"#;
        assert_eq!(sanitize_html(html), r#"<a href="alert(1)">x</a>"#);
    }

    #[test]
    fn test_leaves_plain_markup_alone() {
        let html = "<div class=\"content\"><p>Hello <em>world</em></p></div>";
        assert_eq!(sanitize_html(html), html);
    }
}
