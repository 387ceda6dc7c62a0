//! OAuth2 client-credentials / refresh-token primitives
//!
//! Provides the credential set, the immutable token record, the token
//! endpoint exchange, and durable token-file storage. This crate holds no
//! caching or refresh policy; `token-manager` composes these pieces.
//!
//! Exchange flow:
//! 1. `Credentials::new()` validates tenant/client/secret/scope
//! 2. `GrantClient::exchange()` POSTs one form-encoded grant request
//! 3. `TokenRecord::from_response()` turns the decoded response into a record
//! 4. `TokenStore::save()` persists it with temp-file + rename

pub mod constants;
pub mod credentials;
pub mod error;
pub mod record;
pub mod store;
pub mod token;

pub use constants::*;
pub use credentials::Credentials;
pub use error::{Error, Result};
pub use record::TokenRecord;
pub use store::TokenStore;
pub use token::{
    GrantClient, GrantFlow, GrantFuture, HttpGrantClient, TokenResponse, decode_token_response,
};
