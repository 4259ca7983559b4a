use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field names of the Zoho record schema written by this service.
pub mod fields {
    pub const ID: &str = "id";
    pub const FIRST_NAME: &str = "First_Name";
    pub const LAST_NAME: &str = "Last_Name";
    pub const EMAIL: &str = "Email";
    pub const DESCRIPTION: &str = "Description";
    pub const LEAD_SOURCE: &str = "Lead_Source";
    pub const REQUEST_ID: &str = "Pipefile_Request_ID";
    pub const STATUS: &str = "Pipefile_Status";
    pub const SUBJECT: &str = "Pipefile_Subject";
    pub const TOTAL_FILES: &str = "Pipefile_Total_Files";
    pub const UNREVIEWED_FILES: &str = "Pipefile_Unreviewed_Files";
    pub const RECIPIENTS_COUNT: &str = "Pipefile_Recipients_Count";
    pub const ITEMS_COUNT: &str = "Pipefile_Items_Count";
    pub const REQUIRED_ITEMS: &str = "Pipefile_Required_Items";
    pub const RESPONDED_ITEMS: &str = "Pipefile_Responded_Items";
    pub const TAGS: &str = "Pipefile_Tags";
    pub const CREATED_AT: &str = "Pipefile_Created_At";
    pub const LAST_MODIFIED: &str = "Pipefile_Last_Modified";
}

/// Flat Zoho record: field name to scalar JSON value.
///
/// This is the wire payload sent inside `{ "data": [record] }` and the shape
/// of each match returned by the search endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CrmRecord(Map<String, Value>);

impl CrmRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: &str, value: impl Into<Value>) {
        self.0.insert(field.to_string(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn get_u64(&self, field: &str) -> Option<u64> {
        self.0.get(field).and_then(Value::as_u64)
    }

    /// Value usable as a search criterion: a non-empty string or a number.
    pub fn search_value(&self, field: &str) -> Option<String> {
        match self.0.get(field)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Zoho record id, present on records returned by search.
    pub fn id(&self) -> Option<String> {
        self.search_value(fields::ID)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Envelope used by Zoho for both requests and responses: `{ "data": [...] }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZohoEnvelope<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

impl<T> ZohoEnvelope<T> {
    pub fn single(item: T) -> Self {
        Self { data: vec![item] }
    }
}

/// Per-record result of an insert, update or attachment call.
#[derive(Debug, Clone, Deserialize)]
pub struct WriteItem {
    pub code: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Value,
}

/// Decoded outcome of a Zoho write.
///
/// Zoho answers bulk-style endpoints with HTTP 200 even when the record was
/// rejected, so the per-record `code` is the source of truth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Success(Option<String>),
    Failure(String),
}

impl RecordOutcome {
    pub const SUCCESS_CODE: &'static str = "SUCCESS";

    /// Decodes the first item of a write response body.
    pub fn decode(body: &str) -> Self {
        let envelope: ZohoEnvelope<WriteItem> = match serde_json::from_str(body) {
            Ok(envelope) => envelope,
            Err(e) => return RecordOutcome::Failure(format!("unreadable response: {}", e)),
        };

        let Some(item) = envelope.data.into_iter().next() else {
            return RecordOutcome::Failure("response contained no records".to_string());
        };

        if item.code == Self::SUCCESS_CODE {
            let id = match item.details.get(fields::ID) {
                Some(Value::String(s)) => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            };
            RecordOutcome::Success(id)
        } else {
            let message = item.message.unwrap_or_else(|| "no message".to_string());
            RecordOutcome::Failure(format!("{}: {}", item.code, message))
        }
    }
}

/// OAuth token endpoint response. Zoho reports a bad refresh token with
/// HTTP 200 and an `error` member instead of `access_token`.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub error: Option<String>,
}
