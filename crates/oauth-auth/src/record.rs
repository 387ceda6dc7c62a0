//! Immutable token record
//!
//! A record is created from a successful grant and replaced wholesale on
//! every refresh; it is never edited in place. Timestamps are absolute unix
//! seconds.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::DEFAULT_EXPIRES_IN_SECS;
use crate::error::{Error, Result};
use crate::token::{GrantFlow, TokenResponse};

/// The latest access token plus the metadata needed to decide when to refresh.
///
/// Invariants: `access_token` is non-empty and `expires_at > issued_at`.
/// Serialized form is the token-file layout.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    access_token: String,
    #[serde(default, deserialize_with = "non_empty_refresh_token")]
    refresh_token: Option<String>,
    expires_at: i64,
    #[serde(default)]
    issued_at: i64,
}

impl TokenRecord {
    /// Build a record, enforcing the record invariants.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        issued_at: i64,
        expires_at: i64,
    ) -> Result<Self> {
        let record = Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.filter(|rt| !rt.is_empty()),
            expires_at,
            issued_at,
        };
        record.validate()?;
        Ok(record)
    }

    /// Build the record that replaces `previous` after a successful grant.
    ///
    /// `expires_at = issued_at + expires_in` (3600 when omitted). A refresh
    /// response without a refresh token keeps the one that was presented;
    /// a client-credentials response carries only what the provider sent.
    pub fn from_response(
        response: TokenResponse,
        flow: GrantFlow,
        issued_at: i64,
        previous_refresh: Option<&str>,
    ) -> Result<Self> {
        let lifetime = response.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        let lifetime = i64::try_from(lifetime)
            .map_err(|_| Error::MalformedResponse(format!("expires_in out of range: {lifetime}")))?;
        let expires_at = issued_at
            .checked_add(lifetime)
            .ok_or_else(|| Error::MalformedResponse(format!("expires_in out of range: {lifetime}")))?;

        let refresh_token = match flow {
            GrantFlow::RefreshToken => response
                .refresh_token
                .filter(|rt| !rt.is_empty())
                .or_else(|| previous_refresh.map(str::to_owned)),
            GrantFlow::ClientCredentials => response.refresh_token,
        };

        Self::new(response.access_token, refresh_token, issued_at, expires_at)
            .map_err(|e| match e {
                Error::Config(msg) => Error::MalformedResponse(msg),
                other => other,
            })
    }

    /// Check the record invariants (used after deserializing a token file).
    pub fn validate(&self) -> Result<()> {
        if self.access_token.is_empty() {
            return Err(Error::Config("access_token must not be empty".into()));
        }
        if self.expires_at <= self.issued_at {
            return Err(Error::Config(format!(
                "expires_at ({}) must be after issued_at ({})",
                self.expires_at, self.issued_at
            )));
        }
        Ok(())
    }

    /// Whether the access token can be handed out at `now` without a refresh:
    /// `now + buffer < expires_at`.
    pub fn is_usable(&self, now: i64, buffer_secs: i64) -> bool {
        now.saturating_add(buffer_secs) < self.expires_at
    }

    /// Copy of this record with the refresh token discarded.
    pub fn without_refresh_token(&self) -> Self {
        Self {
            refresh_token: None,
            ..self.clone()
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    pub fn issued_at(&self) -> i64 {
        self.issued_at
    }
}

/// An empty refresh token in the token file means "none held".
fn non_empty_refresh_token<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|rt| !rt.is_empty()))
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}
