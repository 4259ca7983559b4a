use std::sync::Arc;
use std::time::Duration;

use pipefile_zoho_sync::config::Config;
use pipefile_zoho_sync::handlers::{self, AppState};
use pipefile_zoho_sync::token_cache::{OAuthCredentials, TokenCache};
use pipefile_zoho_sync::zoho_client::{self, ZohoClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the application.
///
/// Initializes tracing, loads configuration, builds the Zoho token cache and
/// client, then serves the webhook router.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pipefile_zoho_sync=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    let http = zoho_client::http_client(Duration::from_secs(config.http_timeout_secs))?;

    let tokens = Arc::new(TokenCache::new(
        http.clone(),
        config.zoho_accounts_domain.clone(),
        OAuthCredentials {
            client_id: config.zoho_client_id.clone(),
            client_secret: config.zoho_client_secret.clone(),
            refresh_token: config.zoho_refresh_token.clone(),
        },
    ));
    let zoho = ZohoClient::new(http, config.zoho_api_domain.clone(), tokens);
    tracing::info!("✓ Zoho client initialized: {}", config.zoho_api_domain);

    let app_state = Arc::new(AppState {
        config: config.clone(),
        zoho,
    });

    let app = handlers::router(app_state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("🚀 Webhook receiver listening on {}", addr);
    tracing::info!("Webhook URL: http://localhost:{}/webhook", config.port);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
