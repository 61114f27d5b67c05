//! Configuration loading and resolution.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name of the state file inside a store directory.
pub const STORE_FILE_NAME: &str = "state.json";

const STORE_ENV: &str = "WEBTOOLKIT_STORE";

/// Resolve the state file path.
///
/// Order: explicit path, `WEBTOOLKIT_STORE`, a project-local
/// `.webtoolkit/state.json`, then the per-user data directory. A chosen path
/// that is a directory or lacks a `.json` extension gets `state.json` joined.
pub fn resolve_store_path(explicit: Option<&str>) -> String {
    let chosen = explicit
        .map(str::to_string)
        .or_else(|| std::env::var(STORE_ENV).ok().filter(|p| !p.is_empty()));
    if let Some(path) = chosen {
        return store_file(PathBuf::from(path)).display().to_string();
    }

    let local = Path::new(".webtoolkit").join(STORE_FILE_NAME);
    if local.exists() {
        return local.display().to_string();
    }

    data_dir().join(STORE_FILE_NAME).display().to_string()
}

fn store_file(path: PathBuf) -> PathBuf {
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if path.is_dir() || !is_json {
        path.join(STORE_FILE_NAME)
    } else {
        path
    }
}

/// `$XDG_DATA_HOME/webtoolkit`, else `~/.local/share/webtoolkit`.
fn data_dir() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_DATA_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(xdg).join("webtoolkit");
    }
    match std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
        Some(home) => PathBuf::from(home).join(".local").join("share").join("webtoolkit"),
        None => PathBuf::from(".webtoolkit"),
    }
}

/// Fixed waits of the capture and form flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Between a page-load signal and the automatic capture.
    pub auto_capture_delay: Duration,
    /// How long the content script waits for the host page relay.
    pub relay_timeout: Duration,
    /// How long a custom dropdown gets to render its options.
    pub dropdown_settle: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            auto_capture_delay: Duration::from_millis(2000),
            relay_timeout: Duration::from_millis(3000),
            dropdown_settle: webtoolkit::filler::DEFAULT_DROPDOWN_SETTLE,
        }
    }
}
