//! Event-store client configuration.

use serde::{Deserialize, Serialize};

/// Connection settings for an [`crate::store::EventStore`] backend.
///
/// Plain, serde-derived data — no loader crate, env-var layering, or file
/// discovery. Callers construct it however their own application wires up
/// configuration and pass it to the backend they choose.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend address (host:port, connection string, etc).
    pub address: String,
    /// Tenant or namespace identifier the backend scopes streams under.
    pub tenant_id: String,
    /// Opaque credential material, if the backend requires authentication.
    pub credentials: Option<String>,
}

impl StoreConfig {
    /// Builds a config with no credentials set.
    pub fn new(address: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            tenant_id: tenant_id.into(),
            credentials: None,
        }
    }

    /// Attaches credentials to this config.
    pub fn with_credentials(mut self, credentials: impl Into<String>) -> Self {
        self.credentials = Some(credentials.into());
        self
    }
}
