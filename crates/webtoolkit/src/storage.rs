//! State file and export bundle formats.
//!
//! The state file is a JSON document with a format tag and version, checked
//! on read the way a binary header's magic and version would be.

use std::io::{Read, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entry::{Entry, EntryLog, MergeSettings};
use crate::types::{ToolkitError, ToolkitResult};

/// Format tag written into every state file.
const STATE_FORMAT: &str = "webtoolkit-state";

/// Current state file version.
const FORMAT_VERSION: u16 = 1;

/// Version string of export bundles.
pub const EXPORT_VERSION: &str = "1.0";

/// Everything the toolkit persists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolkitState {
    #[serde(default)]
    pub capturing: bool,
    #[serde(default)]
    pub entries: EntryLog,
    #[serde(default)]
    pub settings: MergeSettings,
}

#[derive(Serialize)]
struct SerializedState<'a> {
    format: &'a str,
    version: u16,
    #[serde(flatten)]
    state: &'a ToolkitState,
}

#[derive(Deserialize)]
struct DeserializedState {
    format: String,
    version: u16,
    #[serde(flatten)]
    state: ToolkitState,
}

/// Writer for state files.
pub struct StateWriter;

/// Reader for state files.
pub struct StateReader;

impl StateWriter {
    /// Write `state` to `path`, replacing it atomically.
    pub fn write_to_file(state: &ToolkitState, path: &Path) -> ToolkitResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let tmp = path.with_extension("json.tmp");
        {
            let mut file = std::fs::File::create(&tmp)?;
            Self::write_to(state, &mut file)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn write_to<W: Write>(state: &ToolkitState, writer: &mut W) -> ToolkitResult<()> {
        let doc = SerializedState {
            format: STATE_FORMAT,
            version: FORMAT_VERSION,
            state,
        };
        serde_json::to_writer_pretty(&mut *writer, &doc)
            .map_err(|e| ToolkitError::Storage(format!("Serialization failed: {e}")))?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

impl StateReader {
    pub fn read_from_file(path: &Path) -> ToolkitResult<ToolkitState> {
        let mut file = std::fs::File::open(path)?;
        Self::read_from(&mut file)
    }

    pub fn read_from<R: Read>(reader: &mut R) -> ToolkitResult<ToolkitState> {
        let doc: DeserializedState = serde_json::from_reader(reader)
            .map_err(|e| ToolkitError::Storage(format!("Deserialization failed: {e}")))?;

        if doc.format != STATE_FORMAT {
            return Err(ToolkitError::Storage(format!(
                "Invalid format tag: expected '{STATE_FORMAT}', got '{}'",
                doc.format
            )));
        }
        if doc.version != FORMAT_VERSION {
            return Err(ToolkitError::Storage(format!(
                "Unsupported version: {}",
                doc.version
            )));
        }

        let mut state = doc.state;
        // re-apply the entry cap to hand-edited files
        state.entries = EntryLog::from_entries(state.entries.entries().to_vec());
        Ok(state)
    }
}

/// Portable dump of the entry list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    pub version: String,
    pub export_date: DateTime<Utc>,
    pub capturing: bool,
    pub entries: Vec<Entry>,
}

impl ExportBundle {
    pub fn from_state(state: &ToolkitState, export_date: DateTime<Utc>) -> Self {
        Self {
            version: EXPORT_VERSION.to_string(),
            export_date,
            capturing: state.capturing,
            entries: state.entries.entries().to_vec(),
        }
    }

    /// Entries of an imported bundle. Only `entries` is required, and it
    /// must be an array of entries.
    pub fn entries_from_value(bundle: &Value) -> ToolkitResult<Vec<Entry>> {
        let entries = bundle
            .get("entries")
            .filter(|v| v.is_array())
            .ok_or_else(|| ToolkitError::InvalidFormat("'entries' must be an array".to_string()))?;
        serde_json::from_value(entries.clone())
            .map_err(|e| ToolkitError::InvalidFormat(format!("bad entry: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExtractionResult;
    use serde_json::json;

    fn make_test_entry(title: &str) -> Entry {
        let result = ExtractionResult {
            text: format!("text of {title}"),
            ..Default::default()
        };
        Entry::from_capture(&result, "https://example.com", Some(title), Utc::now())
    }

    #[test]
    fn test_roundtrip_empty() {
        let state = ToolkitState::default();
        let mut buf = Vec::new();
        StateWriter::write_to(&state, &mut buf).unwrap();

        let loaded = StateReader::read_from(&mut &buf[..]).unwrap();
        assert_eq!(loaded, state);
        assert!(!loaded.capturing);
        assert!(loaded.settings.include_url);
    }

    #[test]
    fn test_roundtrip_with_entries() {
        let mut state = ToolkitState {
            capturing: true,
            ..Default::default()
        };
        state.entries.push(make_test_entry("first"));
        state.entries.push(make_test_entry("second"));

        let mut buf = Vec::new();
        StateWriter::write_to(&state, &mut buf).unwrap();
        let loaded = StateReader::read_from(&mut &buf[..]).unwrap();
        assert_eq!(loaded.entries.len(), 2);
        assert_eq!(loaded.entries.entries()[0].title, "second");
        assert!(loaded.capturing);
    }

    #[test]
    fn test_invalid_format_tag() {
        let buf = br#"{"format": "something-else", "version": 1}"#;
        let result = StateReader::read_from(&mut &buf[..]);
        assert!(matches!(result, Err(ToolkitError::Storage(_))));
    }

    #[test]
    fn test_unsupported_version() {
        let buf = br#"{"format": "webtoolkit-state", "version": 99}"#;
        let err = StateReader::read_from(&mut &buf[..]).unwrap_err();
        assert!(err.to_string().contains("Unsupported version: 99"));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let mut state = ToolkitState::default();
        state.entries.push(make_test_entry("only"));

        StateWriter::write_to_file(&state, &path).unwrap();
        let loaded = StateReader::read_from_file(&path).unwrap();
        assert_eq!(loaded.entries.len(), 1);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_export_bundle_shape() {
        let mut state = ToolkitState::default();
        state.entries.push(make_test_entry("a"));
        let bundle = ExportBundle::from_state(&state, Utc::now());
        let json = serde_json::to_value(&bundle).unwrap();
        assert_eq!(json["version"], "1.0");
        assert!(json["exportDate"].is_string());
        assert_eq!(json["capturing"], false);
        assert_eq!(json["entries"].as_array().unwrap().len(), 1);

        let entries = ExportBundle::entries_from_value(&json).unwrap();
        assert_eq!(entries[0].title, "a");
    }

    #[test]
    fn test_import_requires_entry_array() {
        for bad in [json!({}), json!({"entries": {}}), json!({"entries": "x"})] {
            let err = ExportBundle::entries_from_value(&bad).unwrap_err();
            assert!(matches!(err, ToolkitError::InvalidFormat(_)));
        }
        let err = ExportBundle::entries_from_value(&json!({"entries": [{"id": 1}]})).unwrap_err();
        assert!(err.to_string().starts_with("Invalid file format"));
    }
}
