//! OAuth2 protocol constants
//!
//! Grant type strings and the default authority used to derive the token
//! endpoint from a tenant identifier.

/// Authority host for the v2.0 token endpoint
pub const AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Grant type for app-only acquisition
pub const GRANT_CLIENT_CREDENTIALS: &str = "client_credentials";

/// Grant type for exchanging a refresh token
pub const GRANT_REFRESH_TOKEN: &str = "refresh_token";

/// Lifetime assumed when the provider omits `expires_in`
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// Provider error code for a rejected (expired/revoked) refresh token
pub const INVALID_GRANT: &str = "invalid_grant";

/// Build the token endpoint URL for a tenant.
pub fn token_endpoint_for(tenant_id: &str) -> String {
    format!("{AUTHORITY_HOST}/{tenant_id}/oauth2/v2.0/token")
}
