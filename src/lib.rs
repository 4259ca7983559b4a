//! Pipefile → Zoho CRM webhook sync library
//!
//! Receives Pipefile `file_request.file_uploaded` webhooks and upserts the
//! uploader as a Zoho CRM record, attaching a link to the uploaded files.
//!
//! # Modules
//!
//! - `api`: API-layer namespace (handlers, webhook handler).
//! - `core`: Domain-layer namespace (normalizer, upsert, errors).
//! - `integrations`: External service namespace (Zoho client, token cache, wire models).
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `handlers`: Application state, health check and router.
//! - `normalizer`: Pipefile → Zoho field mapping.
//! - `token_cache`: Zoho OAuth access-token cache.
//! - `upsert`: Create-or-update orchestration.
//! - `webhook_handler`: Pipefile webhook handler.
//! - `webhook_models`: Webhook payload models.
//! - `zoho_client`: Zoho CRM REST client.
//! - `zoho_models`: Zoho record and response models.

pub mod api;
pub mod core;
pub mod integrations;

// Re-export primary modules for shared use in tests and the binary
pub mod config;
pub mod errors;
pub mod handlers;
pub mod normalizer;
pub mod token_cache;
pub mod upsert;
pub mod webhook_handler;
pub mod webhook_models;
pub mod zoho_client;
pub mod zoho_models;
