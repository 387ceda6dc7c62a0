//! OAuth2 bearer-token lifecycle manager
//!
//! Acquires, caches, and transparently refreshes the bearer token used for
//! outbound machine-to-machine calls, persisting it across restarts.
//!
//! Token lifecycle:
//! 1. Startup loads the token file; missing/corrupt means no token
//! 2. `get_token()` returns the cached token while `now + buffer < expires_at`
//! 3. Otherwise one refresh runs for all concurrent callers
//! 4. Refresh-token grant if a refresh token is held, else client credentials
//! 5. `invalid_grant` on refresh drops the refresh token and retries once
//!    with client credentials
//! 6. The new record replaces the old in memory, then in the token file

pub mod classify;
pub mod clock;
pub mod error;
pub mod manager;
pub mod metrics;
pub mod settings;

pub use classify::{RefreshFailure, classify_refresh_error, is_invalid_grant};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use manager::TokenManager;
pub use settings::ManagerSettings;
