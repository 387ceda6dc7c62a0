//! Shared types for the OAuth token workspace
//!
//! `Secret` keeps client secrets and bearer tokens out of `Debug` output and
//! logs. `Error` covers configuration loading shared by embedding services.

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
