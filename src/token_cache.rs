//! OAuth access-token cache for the Zoho API.
//!
//! Zoho access tokens live for 60 minutes. The cache keeps one token and treats
//! it as expired 5 minutes early, then exchanges the long-lived refresh token
//! for a new one.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::errors::AppError;
use crate::zoho_models::TokenResponse;

/// Validity assigned to a freshly issued token.
pub const TOKEN_VALIDITY_MINUTES: i64 = 55;

/// Source of the current time, injected so expiry can be tested.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl BearerToken {
    fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[derive(Clone)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

/// Holds a single bearer token and refreshes it on demand.
///
/// The lock is never held across the refresh request. Callers racing through an
/// expired window may each refresh; the provider accepts repeated refresh-token
/// grants so the last writer simply wins.
pub struct TokenCache {
    client: reqwest::Client,
    accounts_domain: String,
    credentials: OAuthCredentials,
    clock: Arc<dyn Clock>,
    state: RwLock<Option<BearerToken>>,
}

impl TokenCache {
    pub fn new(
        client: reqwest::Client,
        accounts_domain: impl Into<String>,
        credentials: OAuthCredentials,
    ) -> Self {
        Self {
            client,
            accounts_domain: accounts_domain.into(),
            credentials,
            clock: Arc::new(SystemClock),
            state: RwLock::new(None),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns a valid access token, refreshing it when absent or expired.
    pub async fn get_access_token(&self) -> Result<String, AppError> {
        let now = self.clock.now();
        {
            let cached = self.state.read().await;
            if let Some(token) = cached.as_ref().filter(|t| t.is_valid_at(now)) {
                tracing::debug!("Using cached Zoho access token");
                return Ok(token.value.clone());
            }
        }

        let token = self.refresh().await?;
        let value = token.value.clone();
        *self.state.write().await = Some(token);
        Ok(value)
    }

    /// Currently cached token, if any (valid or not).
    pub async fn cached(&self) -> Option<BearerToken> {
        self.state.read().await.clone()
    }

    /// Drops the cached token so the next call performs a refresh.
    pub async fn invalidate(&self) {
        tracing::info!("Zoho access token invalidated");
        *self.state.write().await = None;
    }

    async fn refresh(&self) -> Result<BearerToken, AppError> {
        tracing::info!("Refreshing Zoho access token");

        let url = format!("{}/oauth/v2/token", self.accounts_domain);
        let response = self
            .client
            .post(&url)
            .query(&[
                ("refresh_token", self.credentials.refresh_token.as_str()),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Auth(format!("token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("Zoho token endpoint returned {}: {}", status, error_text);
            return Err(AppError::Auth(format!("token endpoint returned {}", status)));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::Auth(format!("unreadable token response: {}", e)))?;

        let value = match (body.access_token, body.error) {
            (Some(token), _) if !token.is_empty() => token,
            (_, Some(error)) => {
                tracing::error!("Zoho rejected the refresh token: {}", error);
                return Err(AppError::Auth(error));
            }
            _ => return Err(AppError::Auth("response contained no access_token".to_string())),
        };

        if let Some(expires_in) = body.expires_in {
            tracing::debug!("Zoho reports token lifetime of {}s", expires_in);
        }

        let expires_at = self.clock.now() + Duration::minutes(TOKEN_VALIDITY_MINUTES);
        tracing::info!("✓ Zoho access token refreshed, valid until {}", expires_at);

        Ok(BearerToken { value, expires_at })
    }
}
