//! Locating the embedded form payload.
//!
//! Strategies, in order:
//! 1. Read the global variable directly, when the caller runs in the host
//!    page's own context and can hand us a [`GlobalScope`].
//! 2. Scan `<script>` text for the marker assignment and cut out the array
//!    literal with a bracket-stack scanner.
//! 3. Parse that literal as strict JSON, then evaluate it as a JS expression.
//!
//! The cross-context relay that makes strategy 1 reachable from an isolated
//! script lives in the bridge crate.

use std::collections::HashMap;
use std::sync::OnceLock;

use scraper::Selector;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::blob::FormBlob;
use crate::evaluate::evaluate_literal;
use crate::page::Page;

/// Name of the page global that holds the form payload.
pub const BLOB_MARKER: &str = "FB_PUBLIC_LOAD_DATA_";

/// Read access to the globals of an execution context.
pub trait GlobalScope {
    fn global(&self, name: &str) -> Option<Value>;
}

impl GlobalScope for serde_json::Map<String, Value> {
    fn global(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl GlobalScope for HashMap<String, Value> {
    fn global(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

/// Which strategy produced a blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlobSource {
    /// Direct global read (possibly relayed from the host page).
    Global,
    /// Script text that was valid JSON.
    ScriptJson,
    /// Script text that had to be evaluated as JavaScript.
    ScriptLiteral,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocatedBlob {
    pub blob: FormBlob,
    pub source: BlobSource,
}

/// Run every strategy against `page`. `None` when all of them fail.
pub fn locate(page: &Page, scope: Option<&dyn GlobalScope>) -> Option<LocatedBlob> {
    if let Some(scope) = scope {
        if let Some(value) = read_global(scope) {
            tracing::debug!("Form payload found as a page global");
            return Some(LocatedBlob {
                blob: FormBlob::new(value),
                source: BlobSource::Global,
            });
        }
    }
    locate_in_scripts(page)
}

/// Strategy 1 alone. A `null` global counts as absent.
pub fn read_global(scope: &dyn GlobalScope) -> Option<Value> {
    scope.global(BLOB_MARKER).filter(|v| !v.is_null())
}

/// Strategies 2 and 3 over every `<script>` in document order.
pub fn locate_in_scripts(page: &Page) -> Option<LocatedBlob> {
    static SCRIPT: OnceLock<Option<Selector>> = OnceLock::new();
    let selector = SCRIPT.get_or_init(|| Selector::parse("script").ok()).as_ref()?;

    for script in page.document().select(selector) {
        let text: String = script.text().collect();
        if !text.contains(BLOB_MARKER) {
            continue;
        }

        let Some(candidate) = scan_assignment(&text, BLOB_MARKER) else {
            tracing::warn!("Found {BLOB_MARKER} in a script but could not isolate its literal");
            continue;
        };
        tracing::debug!(chars = candidate.len(), "Isolated form payload literal");

        if let Some((value, source)) = parse_candidate(candidate) {
            return Some(LocatedBlob {
                blob: FormBlob::new(value),
                source,
            });
        }
    }

    None
}

/// Parse a literal cut out by [`scan_assignment`]: strict JSON first.
pub fn parse_candidate(candidate: &str) -> Option<(Value, BlobSource)> {
    match serde_json::from_str(candidate) {
        Ok(value) => Some((value, BlobSource::ScriptJson)),
        Err(json_err) => {
            tracing::debug!("Strict JSON parse failed: {json_err}");
            match evaluate_literal(candidate) {
                Ok(value) => Some((value, BlobSource::ScriptLiteral)),
                Err(e) => {
                    tracing::warn!("Both parse methods failed: {e}");
                    None
                }
            }
        }
    }
}

/// Cut the array literal assigned to `marker` out of `script`.
///
/// Starts at the first `[` after the `=` that follows the marker and returns
/// the text up to and including its matching `]`. Brackets inside quoted
/// strings are ignored. Any mismatched closer or unterminated input yields
/// `None` rather than a truncated slice.
pub fn scan_assignment<'a>(script: &'a str, marker: &str) -> Option<&'a str> {
    let after_marker = script.find(marker)? + marker.len();
    let eq = after_marker + script[after_marker..].find('=')?;
    let start = eq + script[eq..].find('[')?;

    let mut stack: Vec<char> = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (offset, c) in script[start..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' | '`' => quote = Some(c),
            '[' | '{' | '(' => stack.push(c),
            ']' | '}' | ')' => {
                let opener = stack.pop()?;
                if !closes(opener, c) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(&script[start..start + offset + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}

fn closes(opener: char, closer: char) -> bool {
    matches!((opener, closer), ('[', ']') | ('{', '}') | ('(', ')'))
}
