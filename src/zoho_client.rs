use crate::errors::AppError;
use crate::token_cache::TokenCache;
use crate::zoho_models::{CrmRecord, RecordOutcome, ZohoEnvelope};
use reqwest::{multipart, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;

/// Builds the HTTP client shared by the token cache and the Zoho client.
///
/// Every outbound call is bounded by `timeout`.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))
}

/// Client for the Zoho CRM v8 REST API.
#[derive(Clone)]
pub struct ZohoClient {
    client: reqwest::Client,
    api_domain: String,
    tokens: Arc<TokenCache>,
}

impl ZohoClient {
    /// Creates a new `ZohoClient`.
    ///
    /// # Arguments
    ///
    /// * `client` - Shared HTTP client (carries the request timeout).
    /// * `api_domain` - Base URL such as `https://www.zohoapis.com`.
    /// * `tokens` - Token cache used to authorise every call.
    pub fn new(client: reqwest::Client, api_domain: impl Into<String>, tokens: Arc<TokenCache>) -> Self {
        Self {
            client,
            api_domain: api_domain.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    fn module_url(&self, module: &str) -> String {
        format!("{}/crm/v8/{}", self.api_domain, module)
    }

    async fn authorization(&self) -> Result<String, AppError> {
        let token = self.tokens.get_access_token().await?;
        Ok(format!("Zoho-oauthtoken {}", token))
    }

    /// Reads the response body and turns an unauthorised status into a cache invalidation.
    async fn read_body(&self, response: Response, context: &str) -> Result<(StatusCode, String), AppError> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate().await;
        }
        let body = response
            .text()
            .await
            .map_err(|e| AppError::crm_transport(context, e))?;
        Ok((status, body))
    }

    /// Searches `module` for records where `field` equals `value`.
    ///
    /// A 404, a 204 or an empty result set yields an empty vector.
    pub async fn search(
        &self,
        module: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<CrmRecord>, AppError> {
        let criteria = format!("({}:equals:{})", field, value);
        let url = reqwest::Url::parse_with_params(
            &format!("{}/search", self.module_url(module)),
            &[("criteria", criteria.as_str())],
        )
        .map_err(|e| AppError::Internal(format!("Failed to build search URL: {}", e)))?;

        tracing::info!("Searching Zoho {} for {}={}", module, field, value);

        let response = self
            .client
            .get(url)
            .header("Authorization", self.authorization().await?)
            .send()
            .await
            .map_err(|e| AppError::crm_transport("Zoho search request failed", e))?;

        let (status, body) = self.read_body(response, "Zoho search request failed").await?;

        if status == StatusCode::NOT_FOUND || status == StatusCode::NO_CONTENT {
            tracing::info!("No matching records found");
            return Ok(Vec::new());
        }

        if !status.is_success() {
            return Err(AppError::CrmApi {
                message: format!("Zoho search failed with {}", status),
                status: Some(status.as_u16()),
                body,
            });
        }

        if body.trim().is_empty() {
            return Ok(Vec::new());
        }

        let envelope: ZohoEnvelope<CrmRecord> =
            serde_json::from_str(&body).map_err(|e| AppError::CrmApi {
                message: format!("Failed to parse Zoho search response: {}", e),
                status: Some(status.as_u16()),
                body: body.clone(),
            })?;

        tracing::info!("Found {} matching record(s)", envelope.data.len());
        Ok(envelope.data)
    }

    /// Inserts a single record and returns its id.
    pub async fn create(&self, module: &str, record: &CrmRecord) -> Result<String, AppError> {
        tracing::info!("Creating record in Zoho module {}", module);

        let response = self
            .client
            .post(self.module_url(module))
            .header("Authorization", self.authorization().await?)
            .json(&ZohoEnvelope::single(record))
            .send()
            .await
            .map_err(|e| AppError::crm_transport("Zoho create request failed", e))?;

        let (status, body) = self.read_body(response, "Zoho create request failed").await?;

        match RecordOutcome::decode(&body) {
            RecordOutcome::Success(Some(id)) => {
                tracing::info!("✓ Record created in Zoho: {}", id);
                Ok(id)
            }
            RecordOutcome::Success(None) => Err(AppError::CrmApi {
                message: "Zoho create response missing record id".to_string(),
                status: Some(status.as_u16()),
                body,
            }),
            RecordOutcome::Failure(reason) => Err(AppError::CrmApi {
                message: format!("Failed to create record in Zoho: {}", reason),
                status: Some(status.as_u16()),
                body,
            }),
        }
    }

    /// Overwrites the named fields of an existing record.
    pub async fn update(
        &self,
        module: &str,
        record_id: &str,
        record: &CrmRecord,
    ) -> Result<String, AppError> {
        tracing::info!("Updating Zoho record {} in {}", record_id, module);

        let response = self
            .client
            .put(format!("{}/{}", self.module_url(module), record_id))
            .header("Authorization", self.authorization().await?)
            .json(&ZohoEnvelope::single(record))
            .send()
            .await
            .map_err(|e| AppError::crm_transport("Zoho update request failed", e))?;

        let (status, body) = self.read_body(response, "Zoho update request failed").await?;

        match RecordOutcome::decode(&body) {
            RecordOutcome::Success(id) => {
                let id = id.unwrap_or_else(|| record_id.to_string());
                tracing::info!("✓ Record updated in Zoho: {}", id);
                Ok(id)
            }
            RecordOutcome::Failure(reason) => Err(AppError::CrmApi {
                message: format!("Failed to update record in Zoho: {}", reason),
                status: Some(status.as_u16()),
                body,
            }),
        }
    }

    /// Attaches a link to a record. Zoho stores the URL; no bytes are transferred here.
    pub async fn attach_url(
        &self,
        module: &str,
        record_id: &str,
        attachment_url: &str,
    ) -> Result<String, AppError> {
        tracing::info!("Attaching URL to Zoho record {}: {}", record_id, attachment_url);

        let form = multipart::Form::new().text("attachmentUrl", attachment_url.to_string());
        self.upload_attachment(module, record_id, form).await
    }

    /// Downloads `file_url` into memory and uploads it as a binary attachment.
    ///
    /// There is no streaming path; downloads larger than `max_bytes` are refused.
    pub async fn attach_file(
        &self,
        module: &str,
        record_id: &str,
        file_url: &str,
        file_name: &str,
        max_bytes: u64,
    ) -> Result<String, AppError> {
        tracing::info!("Downloading attachment from {}", file_url);

        let response = self
            .client
            .get(file_url)
            .send()
            .await
            .map_err(|e| AppError::Attachment(format!("download failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Attachment(format!(
                "download returned {}",
                response.status()
            )));
        }

        if let Some(length) = response.content_length() {
            if length > max_bytes {
                return Err(AppError::Attachment(format!(
                    "file is {} bytes, limit is {}",
                    length, max_bytes
                )));
            }
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::Attachment(format!("download failed: {}", e)))?;

        if bytes.len() as u64 > max_bytes {
            return Err(AppError::Attachment(format!(
                "file is {} bytes, limit is {}",
                bytes.len(),
                max_bytes
            )));
        }

        tracing::info!("File downloaded ({} bytes)", bytes.len());

        let part = multipart::Part::bytes(bytes.to_vec())
            .file_name(file_name.to_string())
            .mime_str(&content_type)
            .map_err(|e| AppError::Attachment(format!("invalid content type: {}", e)))?;
        let form = multipart::Form::new().part("file", part);

        self.upload_attachment(module, record_id, form).await
    }

    async fn upload_attachment(
        &self,
        module: &str,
        record_id: &str,
        form: multipart::Form,
    ) -> Result<String, AppError> {
        let url = format!("{}/{}/Attachments", self.module_url(module), record_id);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.authorization().await?)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::crm_transport("Zoho attachment request failed", e))?;

        let (status, body) = self
            .read_body(response, "Zoho attachment request failed")
            .await?;

        match RecordOutcome::decode(&body) {
            RecordOutcome::Success(Some(id)) => {
                tracing::info!("✓ Attachment uploaded (ID: {})", id);
                Ok(id)
            }
            RecordOutcome::Success(None) => Err(AppError::CrmApi {
                message: "Zoho attachment response missing id".to_string(),
                status: Some(status.as_u16()),
                body,
            }),
            RecordOutcome::Failure(reason) => Err(AppError::CrmApi {
                message: format!("Failed to upload attachment: {}", reason),
                status: Some(status.as_u16()),
                body,
            }),
        }
    }
}
