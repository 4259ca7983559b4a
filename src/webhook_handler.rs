use crate::config::AttachmentMode;
use crate::errors::AppError;
use crate::handlers::AppState;
use crate::normalizer::normalize;
use crate::upsert::{upsert, DEFAULT_SEARCH_FIELD};
use crate::webhook_models::{FileRequestSnapshot, WebhookPayload, WebhookResponse, WebhookResult};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use chrono::{SecondsFormat, Utc};
use std::sync::Arc;

/// Pipefile webhook handler.
///
/// Flow:
/// 1. Reject (400) bodies that are not JSON or lack `hook` / `data`; oversized bodies get 413.
/// 2. Acknowledge and ignore every event except `file_request.file_uploaded`.
/// 3. Normalize the file request, upsert it into Zoho by email.
/// 4. Attach the file pipe link when a key is present; failures are only logged.
///
/// Any error after validation is returned as HTTP 200 with `success: false`
/// (see `AppError::into_response`) so Pipefile does not redeliver.
pub async fn pipefile_webhook(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<WebhookPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<WebhookResponse>), AppError> {
    tracing::info!("📥 Webhook received from Pipefile");

    let Json(payload) = payload.map_err(|e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return AppError::PayloadTooLarge;
        }
        tracing::warn!("Unreadable webhook body: {}", e);
        AppError::invalid_payload()
    })?;

    let (Some(hook), Some(data)) = (payload.hook, payload.data) else {
        tracing::warn!("Invalid webhook payload - missing hook or data");
        return Err(AppError::invalid_payload());
    };

    tracing::info!(
        hook_id = ?hook.id,
        event = ?hook.event,
        target = ?hook.target,
        created = ?hook.created,
        "Webhook hook info"
    );

    if !hook.is_file_upload() {
        tracing::info!("Ignoring event: {}", hook.event_name().unwrap_or("<none>"));
        return Ok((StatusCode::OK, Json(WebhookResponse::ignored())));
    }

    let snapshot: FileRequestSnapshot = serde_json::from_value(data).map_err(|e| {
        tracing::warn!("File request payload has unexpected shape: {}", e);
        AppError::invalid_payload()
    })?;

    let result = process_file_upload(&state, &snapshot).await?;

    tracing::info!(
        action = %result.action,
        zoho_record_id = %result.zoho_record_id,
        files_processed = result.files_processed,
        unreviewed_files = result.unreviewed_files,
        "✓ Webhook processed successfully"
    );

    Ok((StatusCode::OK, Json(WebhookResponse::processed(result))))
}

/// Normalizes and upserts one file request, then attaches the file reference.
///
/// The record write is never undone: an attachment failure after a successful
/// create or update still returns the record.
pub async fn process_file_upload(
    state: &AppState,
    snapshot: &FileRequestSnapshot,
) -> Result<WebhookResult, AppError> {
    let record = normalize(snapshot, Utc::now());

    tracing::info!("📤 Upserting data to Zoho CRM");
    let outcome = upsert(
        &state.zoho,
        &state.config.zoho_module,
        &record,
        DEFAULT_SEARCH_FIELD,
    )
    .await?;
    tracing::info!(
        "Successfully {} record in Zoho CRM: {}",
        outcome.action.as_str(),
        outcome.record_id
    );

    if let Some(key) = snapshot.file_pipe_key() {
        let file_url = format!("{}/{}", state.config.pipefile_file_base_url, key);
        match attach_file_reference(state, &outcome.record_id, &file_url, key).await {
            Ok(attachment_id) => {
                tracing::info!("File attached to record (attachment ID: {})", attachment_id)
            }
            Err(e) => tracing::warn!(
                "⚠️ Failed to attach {} to record {}: {}",
                file_url,
                outcome.record_id,
                e
            ),
        }
    }

    Ok(WebhookResult {
        action: outcome.action.as_str().to_string(),
        zoho_record_id: outcome.record_id,
        files_processed: snapshot.num_files(),
        unreviewed_files: snapshot.unreviewed(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

async fn attach_file_reference(
    state: &AppState,
    record_id: &str,
    file_url: &str,
    file_name: &str,
) -> Result<String, AppError> {
    let module = &state.config.zoho_module;
    match state.config.attachment_mode {
        AttachmentMode::Link => state.zoho.attach_url(module, record_id, file_url).await,
        AttachmentMode::File => {
            state
                .zoho
                .attach_file(
                    module,
                    record_id,
                    file_url,
                    file_name,
                    state.config.attachment_max_bytes,
                )
                .await
        }
    }
}
