use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// The only Pipefile event that is synchronised to Zoho.
pub const FILE_UPLOADED_EVENT: &str = "file_request.file_uploaded";

/// Raw Pipefile delivery. `data` stays untyped until the event filter has run,
/// because other event types carry different payload shapes.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub hook: Option<HookDescriptor>,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Hook metadata sent alongside every Pipefile event.
///
/// Only `event` is interpreted, and only when it is a string; the rest is
/// carried for logging whatever its JSON type.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HookDescriptor {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub event: Option<Value>,
    #[serde(default)]
    pub target: Option<Value>,
    #[serde(default)]
    pub created: Option<Value>,
}

impl HookDescriptor {
    pub fn event_name(&self) -> Option<&str> {
        self.event.as_ref().and_then(Value::as_str)
    }

    pub fn is_file_upload(&self) -> bool {
        self.event_name() == Some(FILE_UPLOADED_EVENT)
    }
}

/// Forgiving decoders for snapshot fields.
///
/// A field of an unexpected JSON type reads as absent (or false) instead of
/// failing the whole delivery.
mod lenient {
    use super::*;

    /// Strings as-is; numbers and booleans in their JSON spelling.
    pub fn string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
    }

    /// Non-negative counts; fractional numbers are truncated and numeric strings parsed.
    pub fn count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Number(n) => n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0)
                    .map(|f| f.trunc() as u64)
            }),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    /// JSON truthiness: null, false, 0, NaN and "" are false.
    pub fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Null => false,
            Value::Bool(b) => b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        })
    }

    /// List of scalars rendered as strings; other entries are skipped.
    pub fn string_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Array(values) => Some(
                values
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::String(s) => Some(s),
                        Value::Number(n) => Some(n.to_string()),
                        Value::Bool(b) => Some(b.to_string()),
                        _ => None,
                    })
                    .collect(),
            ),
            _ => None,
        })
    }

    /// Nested object or list; anything that does not fit reads as absent.
    pub fn nested<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(serde_json::from_value(value).ok())
    }
}

/// Pipefile file request as delivered in `data`. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FileRequestSnapshot {
    /// Request id, copied verbatim (string or number).
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub subject: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub tags: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub last_modified: Option<String>,
    /// The uploader.
    #[serde(default, deserialize_with = "lenient::nested")]
    pub user: Option<Contact>,
    #[serde(default, deserialize_with = "lenient::nested")]
    pub file_pipe: Option<FilePipe>,
    #[serde(default, deserialize_with = "lenient::count")]
    pub unreviewed_files: Option<u64>,
    #[serde(default, deserialize_with = "lenient::nested")]
    pub recipients: Option<Vec<Contact>>,
    #[serde(default, deserialize_with = "lenient::nested")]
    pub items: Option<Vec<RequestItem>>,
}

impl FileRequestSnapshot {
    pub fn num_files(&self) -> u64 {
        self.file_pipe.as_ref().and_then(|p| p.num_files).unwrap_or(0)
    }

    pub fn unreviewed(&self) -> u64 {
        self.unreviewed_files.unwrap_or(0)
    }

    /// Key of the file pipe, when present and non-empty.
    pub fn file_pipe_key(&self) -> Option<&str> {
        self.file_pipe
            .as_ref()
            .and_then(|p| p.key.as_deref())
            .filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Contact {
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FilePipe {
    #[serde(default, deserialize_with = "lenient::string")]
    pub key: Option<String>,
    #[serde(default, deserialize_with = "lenient::count")]
    pub num_files: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RequestItem {
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::truthy")]
    pub required: bool,
    #[serde(default, deserialize_with = "lenient::truthy")]
    pub responded: bool,
}

/// Response sent back to Pipefile.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<WebhookResult>,
}

impl WebhookResponse {
    pub fn ignored() -> Self {
        Self {
            success: true,
            message: Some("Event not processed".to_string()),
            data: None,
        }
    }

    pub fn processed(result: WebhookResult) -> Self {
        Self {
            success: true,
            message: Some("Webhook processed successfully".to_string()),
            data: Some(result),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResult {
    pub action: String,
    pub zoho_record_id: String,
    pub files_processed: u64,
    pub unreviewed_files: u64,
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_uploaded_delivery() {
        let json = r#"
        {
            "hook": {
                "id": 17,
                "event": "file_request.file_uploaded",
                "target": "https://example.com/webhook",
                "created": "2025-01-01T00:00:00Z"
            },
            "data": {
                "id": "fr_123",
                "user": { "name": "Jane Doe", "email": "jane@x.com" },
                "file_pipe": { "key": "abc", "num_files": 3 },
                "unreviewed_files": 1,
                "items": [{ "name": "ID", "required": true, "responded": false }]
            }
        }
        "#;

        let payload: WebhookPayload = serde_json::from_str(json).unwrap();
        let hook = payload.hook.unwrap();
        assert!(hook.is_file_upload());

        let snapshot: FileRequestSnapshot = serde_json::from_value(payload.data.unwrap()).unwrap();
        assert_eq!(snapshot.num_files(), 3);
        assert_eq!(snapshot.unreviewed(), 1);
        assert_eq!(snapshot.file_pipe_key(), Some("abc"));
        let items = snapshot.items.unwrap();
        assert!(items[0].required);
        assert!(!items[0].responded);
    }

    #[test]
    fn test_empty_object_has_neither_hook_nor_data() {
        let payload: WebhookPayload = serde_json::from_str("{}").unwrap();
        assert!(payload.hook.is_none());
        assert!(payload.data.is_none());
    }

    #[test]
    fn test_blank_file_pipe_key_is_absent() {
        let snapshot: FileRequestSnapshot =
            serde_json::from_str(r#"{"file_pipe": {"key": "", "num_files": 0}}"#).unwrap();
        assert_eq!(snapshot.file_pipe_key(), None);
    }

    #[test]
    fn test_ignored_response_shape() {
        let value = serde_json::to_value(WebhookResponse::ignored()).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["message"], "Event not processed");
        assert!(value.get("data").is_none());
    }

    #[test]
    fn test_hook_metadata_of_any_type() {
        let payload: WebhookPayload = serde_json::from_str(
            r#"{"hook": {"event": "file_request.created", "created": 1700000000, "target": null}, "data": {}}"#,
        )
        .unwrap();
        let hook = payload.hook.unwrap();
        assert_eq!(hook.event_name(), Some("file_request.created"));
        assert!(!hook.is_file_upload());

        let payload: WebhookPayload =
            serde_json::from_str(r#"{"hook": {"event": 42}, "data": {}}"#).unwrap();
        let hook = payload.hook.unwrap();
        assert_eq!(hook.event_name(), None);
        assert!(!hook.is_file_upload());
    }

    #[test]
    fn test_loose_item_flags_and_counts() {
        let snapshot: FileRequestSnapshot = serde_json::from_str(
            r#"{
                "file_pipe": {"key": "abc", "num_files": 3.0},
                "unreviewed_files": "2",
                "tags": ["tax", 2024, null],
                "items": [
                    {"name": "a", "required": null, "responded": 1},
                    {"name": "b", "required": "yes", "responded": 0},
                    {"name": "c"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(snapshot.num_files(), 3);
        assert_eq!(snapshot.unreviewed(), 2);
        assert_eq!(snapshot.tags, Some(vec!["tax".to_string(), "2024".to_string()]));
        let items = snapshot.items.unwrap();
        assert_eq!(
            items.iter().map(|i| (i.required, i.responded)).collect::<Vec<_>>(),
            vec![(false, true), (true, false), (false, false)]
        );
    }

    #[test]
    fn test_mistyped_sections_read_as_absent() {
        let snapshot: FileRequestSnapshot = serde_json::from_str(
            r#"{"user": "jane", "file_pipe": "abc", "status": 7, "subject": {"x": 1}}"#,
        )
        .unwrap();
        assert!(snapshot.user.is_none());
        assert!(snapshot.file_pipe.is_none());
        assert_eq!(snapshot.status.as_deref(), Some("7"));
        assert!(snapshot.subject.is_none());
    }
}
