//! Protocol messages exchanged between the coordinator, page contexts and clients.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use webtoolkit::{Entry, MergeSettings};

/// A request to the coordinator. The `action` field selects the variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Request {
    /// Run the extractor in a tab's page context and return the content.
    CapturePageContent {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tab_id: Option<u32>,
    },
    /// Resolve and fill the quiz form open in a tab.
    AnswerGForm {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tab_id: Option<u32>,
    },
    /// Capture a tab and store the result as an entry.
    CaptureContent {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tab_id: Option<u32>,
    },
    SaveEntry {
        entry: Entry,
    },
    GetEntries,
    DeleteEntry {
        entry_id: String,
    },
    ClearAllEntries,
    GetSettings,
    SaveSettings {
        settings: MergeSettings,
    },
    GetCaptureStatus,
    SetCaptureStatus {
        capturing: bool,
    },
    MergeEntries {
        entry_ids: Vec<String>,
    },
    ExportData,
    ImportData {
        bundle: Value,
    },
    /// Page-load signal for a tab.
    TabUpdated {
        tab_id: u32,
        status: String,
    },
    /// Load a page into a new tab and make it active.
    OpenTab {
        url: String,
        html: String,
        #[serde(default)]
        globals: Map<String, Value>,
    },
    CloseTab {
        tab_id: u32,
    },
    /// Make an open tab the active one.
    ActivateTab {
        tab_id: u32,
    },
    ListTabs,
}

/// A request the coordinator sends to a tab's content script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum PageRequest {
    CapturePageContent,
    AnswerGForm,
}

/// Every response carries `success`, failures carry `error`. Payload fields
/// sit next to them at the top level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            data: Map::new(),
        }
    }

    pub fn failure(error: impl ToString) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            data: Map::new(),
        }
    }

    /// A successful response whose fields are those of `payload`.
    pub fn from_payload<T: Serialize>(payload: &T) -> Self {
        let data = match serde_json::to_value(payload) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                let mut map = Map::new();
                map.insert("data".to_string(), other);
                map
            }
            Err(e) => return Self::failure(format!("Serialization failed: {e}")),
        };
        Self {
            success: true,
            error: None,
            data,
        }
    }

    /// Add a payload field.
    pub fn with<T: Serialize>(mut self, key: &str, value: T) -> Self {
        let value = serde_json::to_value(value).unwrap_or_default();
        self.data.insert(key.to_string(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_format() {
        let req: Request = serde_json::from_value(json!({"action": "deleteEntry", "entryId": "42"})).unwrap();
        assert_eq!(
            req,
            Request::DeleteEntry {
                entry_id: "42".to_string()
            }
        );

        let req: Request = serde_json::from_value(json!({"action": "answerGForm"})).unwrap();
        assert_eq!(req, Request::AnswerGForm { tab_id: None });

        let value = serde_json::to_value(Request::TabUpdated {
            tab_id: 3,
            status: "complete".into(),
        })
        .unwrap();
        assert_eq!(value, json!({"action": "tabUpdated", "tabId": 3, "status": "complete"}));
    }

    #[test]
    fn test_unknown_action_rejected() {
        let result: Result<Request, _> = serde_json::from_value(json!({"action": "selfDestruct"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_response_shape() {
        let ok = serde_json::to_value(Response::ok().with("capturing", true)).unwrap();
        assert_eq!(ok, json!({"success": true, "capturing": true}));

        let err = serde_json::to_value(Response::failure("No active tab found")).unwrap();
        assert_eq!(err, json!({"success": false, "error": "No active tab found"}));

        let back: Response = serde_json::from_value(json!({"success": true, "answeredCount": 2})).unwrap();
        assert_eq!(back.get("answeredCount"), Some(&json!(2)));
    }
}
