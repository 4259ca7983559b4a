//! Maps a Pipefile file request onto the Zoho record schema.
//!
//! The mapping is pure: the only outside input is `now`, used when the
//! snapshot carries no timestamps.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::webhook_models::FileRequestSnapshot;
use crate::zoho_models::{fields, CrmRecord};

/// Values substituted for absent or empty snapshot fields.
#[derive(Debug, Clone, Copy)]
pub struct FieldDefaults {
    pub first_name: &'static str,
    pub last_name: &'static str,
    pub status: &'static str,
    pub subject: &'static str,
    pub message: &'static str,
    pub lead_source: &'static str,
}

pub const DEFAULTS: FieldDefaults = FieldDefaults {
    first_name: "Unknown",
    last_name: "User",
    status: "unknown",
    subject: "File Request",
    message: "",
    lead_source: "Pipefile",
};

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Splits a full name into (first, last): the first whitespace token and the rest.
pub fn split_name(full_name: Option<&str>) -> (String, String) {
    let mut tokens = full_name.unwrap_or_default().split_whitespace();
    let first = tokens.next().unwrap_or(DEFAULTS.first_name).to_string();
    let rest = tokens.collect::<Vec<_>>().join(" ");
    let last = if rest.is_empty() {
        DEFAULTS.last_name.to_string()
    } else {
        rest
    };
    (first, last)
}

pub fn build_description(subject: &str, message: &str, num_files: u64, unreviewed: u64) -> String {
    format!(
        "{}\n\n{}\n\nFiles: {} | Unreviewed: {}",
        subject, message, num_files, unreviewed
    )
}

/// Builds the Zoho record for a snapshot.
pub fn normalize(snapshot: &FileRequestSnapshot, now: DateTime<Utc>) -> CrmRecord {
    let user = snapshot.user.clone().unwrap_or_default();
    let (first_name, last_name) = split_name(user.name.as_deref());
    let email = present(user.email.as_deref()).map(str::to_string);

    let status = present(snapshot.status.as_deref()).unwrap_or(DEFAULTS.status);
    let subject = present(snapshot.subject.as_deref()).unwrap_or(DEFAULTS.subject);
    let message = snapshot.message.as_deref().unwrap_or(DEFAULTS.message);
    let tags = snapshot.tags.clone().unwrap_or_default();

    let now_iso = now.to_rfc3339_opts(SecondsFormat::Millis, true);
    let created_at = present(snapshot.created_at.as_deref())
        .map(str::to_string)
        .unwrap_or_else(|| now_iso.clone());
    let last_modified = present(snapshot.last_modified.as_deref())
        .map(str::to_string)
        .unwrap_or(now_iso);

    let num_files = snapshot.num_files();
    let unreviewed = snapshot.unreviewed();
    let recipients = snapshot.recipients.as_deref().unwrap_or_default();
    let items = snapshot.items.as_deref().unwrap_or_default();
    let required_items = items.iter().filter(|i| i.required).count() as u64;
    let responded_items = items.iter().filter(|i| i.responded).count() as u64;

    tracing::debug!(
        request_id = ?snapshot.id,
        status,
        subject,
        num_files,
        unreviewed,
        reviewed = num_files.saturating_sub(unreviewed),
        recipients = recipients.len(),
        items = items.len(),
        required_items,
        responded_items,
        "Parsed Pipefile request"
    );
    for (index, item) in items.iter().enumerate() {
        tracing::trace!(
            "Item {}: {} [{}] [{}]",
            index + 1,
            item.name.as_deref().unwrap_or("unnamed"),
            if item.responded { "responded" } else { "pending" },
            if item.required { "required" } else { "optional" }
        );
    }

    let mut record = CrmRecord::new();
    record.insert(fields::FIRST_NAME, first_name);
    record.insert(fields::LAST_NAME, last_name);
    record.insert(fields::EMAIL, email.map_or(Value::Null, Value::String));
    record.insert(
        fields::DESCRIPTION,
        build_description(subject, message, num_files, unreviewed),
    );
    record.insert(fields::LEAD_SOURCE, DEFAULTS.lead_source);
    record.insert(fields::REQUEST_ID, snapshot.id.clone().unwrap_or(Value::Null));
    record.insert(fields::STATUS, status);
    record.insert(fields::SUBJECT, subject);
    record.insert(fields::TOTAL_FILES, num_files);
    record.insert(fields::UNREVIEWED_FILES, unreviewed);
    record.insert(fields::RECIPIENTS_COUNT, recipients.len() as u64);
    record.insert(fields::ITEMS_COUNT, items.len() as u64);
    record.insert(fields::REQUIRED_ITEMS, required_items);
    record.insert(fields::RESPONDED_ITEMS, responded_items);
    record.insert(fields::TAGS, tags.join(", "));
    record.insert(fields::CREATED_AT, created_at);
    record.insert(fields::LAST_MODIFIED, last_modified);
    record
}
