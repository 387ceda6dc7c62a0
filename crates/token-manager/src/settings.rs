//! Manager tuning knobs

use std::path::PathBuf;
use std::time::Duration;

/// Default lead time before expiry at which a refresh is triggered.
pub const DEFAULT_REFRESH_BUFFER: Duration = Duration::from_secs(300);

/// Default bound on each token endpoint exchange.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default token file location.
pub const DEFAULT_TOKEN_FILE: &str = "token.json";

/// Refresh buffer, request timeout, and token file location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerSettings {
    pub refresh_buffer: Duration,
    pub request_timeout: Duration,
    pub token_file: PathBuf,
}

impl ManagerSettings {
    pub fn new(token_file: impl Into<PathBuf>) -> Self {
        Self {
            token_file: token_file.into(),
            ..Self::default()
        }
    }

    /// Refresh buffer as whole seconds for comparison against unix timestamps.
    pub fn refresh_buffer_secs(&self) -> i64 {
        i64::try_from(self.refresh_buffer.as_secs()).unwrap_or(i64::MAX)
    }
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            refresh_buffer: DEFAULT_REFRESH_BUFFER,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            token_file: PathBuf::from(DEFAULT_TOKEN_FILE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = ManagerSettings::default();
        assert_eq!(settings.refresh_buffer, Duration::from_secs(300));
        assert_eq!(settings.request_timeout, Duration::from_secs(10));
        assert_eq!(settings.token_file, PathBuf::from("token.json"));
        assert_eq!(settings.refresh_buffer_secs(), 300);
    }

    #[test]
    fn new_overrides_only_token_file() {
        let settings = ManagerSettings::new("/var/lib/app/token.json");
        assert_eq!(settings.token_file, PathBuf::from("/var/lib/app/token.json"));
        assert_eq!(settings.refresh_buffer, DEFAULT_REFRESH_BUFFER);
    }
}
