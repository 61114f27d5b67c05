//! Evaluating script literals that are not strict JSON.
//!
//! Page scripts embed their data as JS expressions: single quotes, holes,
//! template strings and concatenation all occur. The candidate runs as a
//! single expression in a fresh QuickJS runtime with no host bindings, and
//! is serialized with `JSON.stringify` inside that runtime, so holes,
//! `undefined` and non-finite numbers come back as `null`.

use std::time::{Duration, Instant};

use rquickjs::{Context, Ctx, Runtime};
use serde_json::Value;

use crate::types::{ToolkitError, ToolkitResult};

/// Candidates longer than this are rejected without evaluation.
pub const MAX_SOURCE_LEN: usize = 8 * 1024 * 1024;

/// Nesting deeper than this is rejected before conversion.
const MAX_DEPTH: usize = 100;

const MEMORY_LIMIT: usize = 64 * 1024 * 1024;
const STACK_LIMIT: usize = 1024 * 1024;
const TIME_LIMIT: Duration = Duration::from_secs(2);

/// Evaluate `source` as one JS expression and return its JSON value.
pub fn evaluate_literal(source: &str) -> ToolkitResult<Value> {
    evaluate_within(source, TIME_LIMIT)
}

fn evaluate_within(source: &str, time_limit: Duration) -> ToolkitResult<Value> {
    if source.len() > MAX_SOURCE_LEN {
        return Err(ToolkitError::Evaluation(format!(
            "literal is {} bytes, limit is {MAX_SOURCE_LEN}",
            source.len()
        )));
    }

    let runtime = Runtime::new().map_err(engine_error)?;
    runtime.set_memory_limit(MEMORY_LIMIT);
    runtime.set_max_stack_size(STACK_LIMIT);
    let deadline = Instant::now() + time_limit;
    runtime.set_interrupt_handler(Some(Box::new(move || Instant::now() > deadline)));
    let context = Context::full(&runtime).map_err(engine_error)?;

    // newlines keep a trailing line comment from swallowing the closers
    let script = format!("JSON.stringify((\n{source}\n))");
    let json = context.with(|ctx| {
        ctx.eval::<Option<String>, _>(script)
            .map_err(|e| script_error(&ctx, e))
    })?;

    let json = json.ok_or_else(|| {
        ToolkitError::Evaluation("expression has no JSON representation".to_string())
    })?;
    if nesting_depth(&json) > MAX_DEPTH {
        return Err(ToolkitError::Evaluation(format!(
            "value nests deeper than {MAX_DEPTH} levels"
        )));
    }
    Ok(serde_json::from_str(&json)?)
}

fn engine_error(e: rquickjs::Error) -> ToolkitError {
    ToolkitError::Evaluation(e.to_string())
}

fn script_error(ctx: &Ctx<'_>, e: rquickjs::Error) -> ToolkitError {
    if e.is_exception() {
        let thrown = ctx.catch();
        if let Some(message) = thrown.as_exception().and_then(|ex| ex.message()) {
            return ToolkitError::Evaluation(message);
        }
    }
    engine_error(e)
}

/// Bracket depth of serialized JSON, skipping string contents.
fn nesting_depth(json: &str) -> usize {
    let (mut depth, mut max) = (0usize, 0usize);
    let mut in_string = false;
    let mut escaped = false;

    for b in json.bytes() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' | b'{' => {
                depth += 1;
                max = max.max(depth);
            }
            b']' | b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    max
}
