//! External service integrations.

pub mod zoho_client {
    pub use crate::zoho_client::*;
}

pub mod token_cache {
    pub use crate::token_cache::*;
}

pub mod zoho_models {
    pub use crate::zoho_models::*;
}

pub mod webhook_models {
    pub use crate::webhook_models::*;
}
