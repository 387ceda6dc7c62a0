//! Client credential set
//!
//! Immutable for the lifetime of a token manager. All four identifying
//! fields must be non-empty; the token endpoint is derived from the tenant
//! unless explicitly overridden.

use common::Secret;

use crate::constants::token_endpoint_for;
use crate::error::{Error, Result};

/// Identity of the confidential client requesting tokens.
///
/// `Debug` output never includes the client secret.
#[derive(Debug, Clone)]
pub struct Credentials {
    tenant_id: String,
    client_id: String,
    client_secret: Secret<String>,
    scope: String,
    token_endpoint: String,
}

impl Credentials {
    /// Validate and build a credential set.
    ///
    /// Returns `Error::Config` naming the first empty field.
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<Secret<String>>,
        scope: impl Into<String>,
    ) -> Result<Self> {
        let tenant_id = tenant_id.into();
        let client_id = client_id.into();
        let client_secret = client_secret.into();
        let scope = scope.into();

        require("tenant_id", &tenant_id)?;
        require("client_id", &client_id)?;
        if client_secret.is_blank() {
            return Err(Error::Config("client_secret must not be empty".into()));
        }
        require("scope", &scope)?;

        let token_endpoint = token_endpoint_for(tenant_id.trim());
        Ok(Self {
            tenant_id,
            client_id,
            client_secret,
            scope,
            token_endpoint,
        })
    }

    /// Replace the derived token endpoint (sovereign clouds, local test servers).
    pub fn with_token_endpoint(mut self, endpoint: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into();
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(Error::Config(format!(
                "token_endpoint must start with http:// or https://, got: {endpoint}"
            )));
        }
        self.token_endpoint = endpoint;
        Ok(self)
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &Secret<String> {
        &self.client_secret
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Config(format!("{field} must not be empty")));
    }
    Ok(())
}
