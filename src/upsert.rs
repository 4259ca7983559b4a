use crate::errors::AppError;
use crate::zoho_client::ZohoClient;
use crate::zoho_models::CrmRecord;

/// Field used to find an existing record when none is given.
pub const DEFAULT_SEARCH_FIELD: &str = "Email";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAction {
    Created,
    Updated,
}

impl UpsertAction {
    pub fn as_str(self) -> &'static str {
        match self {
            UpsertAction::Created => "created",
            UpsertAction::Updated => "updated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertResult {
    pub record_id: String,
    pub action: UpsertAction,
}

/// Creates or updates `record` in `module`, keyed by `search_field`.
///
/// An empty search value goes straight to create. Otherwise the first search
/// match is overwritten; its position is whatever order Zoho returned. Errors
/// propagate as-is and nothing is rolled back.
pub async fn upsert(
    client: &ZohoClient,
    module: &str,
    record: &CrmRecord,
    search_field: &str,
) -> Result<UpsertResult, AppError> {
    let Some(search_value) = record.search_value(search_field) else {
        tracing::warn!("No {} on record, creating new record", search_field);
        let record_id = client.create(module, record).await?;
        return Ok(UpsertResult {
            record_id,
            action: UpsertAction::Created,
        });
    };

    let existing = client.search(module, search_field, &search_value).await?;

    match existing.first() {
        Some(first) => {
            let existing_id = first.id().ok_or_else(|| AppError::CrmApi {
                message: "Zoho search match has no id".to_string(),
                status: None,
                body: serde_json::to_string(first).unwrap_or_default(),
            })?;
            if existing.len() > 1 {
                tracing::warn!(
                    "{} records share {}={}, updating the first ({})",
                    existing.len(),
                    search_field,
                    search_value,
                    existing_id
                );
            }
            tracing::info!("Found existing record (ID: {}), updating", existing_id);
            let record_id = client.update(module, &existing_id, record).await?;
            Ok(UpsertResult {
                record_id,
                action: UpsertAction::Updated,
            })
        }
        None => {
            tracing::info!("No existing record found, creating new one");
            let record_id = client.create(module, record).await?;
            Ok(UpsertResult {
                record_id,
                action: UpsertAction::Created,
            })
        }
    }
}
