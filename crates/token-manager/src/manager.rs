//! Token cache with single-flight refresh
//!
//! `TokenManager` is the only type callers interact with. The fast path
//! reads the current record under a shared lock and never touches the
//! network. When the record is missing or inside the refresh buffer, the
//! first stale caller spawns one refresh task; every other stale caller
//! subscribes to that task's outcome instead of issuing its own request.
//!
//! The refresh task is detached from the caller that started it, so a caller
//! that gives up waiting (dropped future, timeout) does not abort the
//! exchange other callers are waiting on.

use std::sync::Arc;

use oauth_auth::{
    Credentials, GrantClient, GrantFlow, HttpGrantClient, TokenRecord, TokenStore,
};
use tokio::sync::{Mutex, RwLock, watch};
use tracing::{debug, info, warn};

use crate::classify::{RefreshFailure, classify_refresh_error};
use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::metrics;
use crate::settings::ManagerSettings;

/// Result of one refresh, shared by every caller that waited on it.
type Outcome = Result<Arc<TokenRecord>>;

type FlightReceiver = watch::Receiver<Option<Outcome>>;

/// Acquires, caches, refreshes, and persists one bearer token.
///
/// Cheap to clone; clones share the same cache and refresh section.
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<Inner>,
}

struct Inner {
    credentials: Credentials,
    settings: ManagerSettings,
    grant: Arc<dyn GrantClient>,
    clock: Arc<dyn Clock>,
    store: TokenStore,
    current: RwLock<Option<Arc<TokenRecord>>>,
    /// Receiver for the refresh currently running, if any.
    in_flight: Mutex<Option<FlightReceiver>>,
}

impl TokenManager {
    /// Create a manager, seeding the cache from the token file.
    ///
    /// An unreadable, corrupt, or invalid token file is logged and treated as
    /// absent; the first `get_token` then acquires a new token.
    pub async fn new(
        credentials: Credentials,
        settings: ManagerSettings,
        grant: Arc<dyn GrantClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = TokenStore::new(settings.token_file.clone());
        let current = match store.load().await {
            Ok(record) => record.map(Arc::new),
            Err(e) => {
                warn!(path = %store.path().display(), error = %e, "could not read token file, starting without a token");
                None
            }
        };

        info!(
            client_id = credentials.client_id(),
            token_file = %store.path().display(),
            cached = current.is_some(),
            "token manager initialized"
        );

        Self {
            inner: Arc::new(Inner {
                credentials,
                settings,
                grant,
                clock,
                store,
                current: RwLock::new(current),
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// Create a manager that talks to the real token endpoint on the wall clock.
    pub async fn with_http_client(
        credentials: Credentials,
        settings: ManagerSettings,
    ) -> Result<Self> {
        let grant = HttpGrantClient::new(settings.request_timeout)?;
        Ok(Self::new(credentials, settings, Arc::new(grant), Arc::new(SystemClock)).await)
    }

    /// Return a usable access token, refreshing it if needed.
    ///
    /// Errors are `Network`, `Http`, or `MalformedResponse` from the one
    /// exchange (or fallback pair) performed for this refresh. Failure to
    /// persist a new token is logged and does not fail the call.
    pub async fn get_token(&self) -> Result<String> {
        if let Some(token) = self.inner.usable_token().await {
            metrics::record_cache_hit();
            return Ok(token);
        }

        let mut flight = {
            let mut in_flight = self.inner.in_flight.lock().await;

            // Another caller may have finished a refresh while we waited.
            if let Some(token) = self.inner.usable_token().await {
                metrics::record_cache_hit();
                return Ok(token);
            }

            match in_flight.as_ref() {
                Some(rx) if rx.has_changed().is_ok() => {
                    debug!("joining in-flight token refresh");
                    rx.clone()
                }
                _ => {
                    let rx = self.spawn_refresh();
                    *in_flight = Some(rx.clone());
                    rx
                }
            }
        };

        let outcome = flight
            .wait_for(Option::is_some)
            .await
            .map_err(|_| Error::Internal("token refresh task ended without a result".into()))?
            .clone();

        let record = outcome
            .unwrap_or_else(|| Err(Error::Internal("token refresh published no result".into())))?;
        Ok(record.access_token().to_owned())
    }

    /// `Authorization` header value for the current token.
    pub async fn authorization_header(&self) -> Result<String> {
        let token = self.get_token().await?;
        Ok(format!("Bearer {token}"))
    }

    /// Current record, usable or not, without triggering a refresh.
    pub async fn snapshot(&self) -> Option<TokenRecord> {
        self.inner
            .current
            .read()
            .await
            .as_deref()
            .cloned()
    }

    pub fn credentials(&self) -> &Credentials {
        &self.inner.credentials
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.inner.settings
    }

    /// Start the refresh task and return the receiver its outcome is published on.
    ///
    /// Caller must hold the `in_flight` lock.
    fn spawn_refresh(&self) -> FlightReceiver {
        let (tx, rx) = watch::channel(None);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let outcome = inner.refresh().await;
            let mut in_flight = inner.in_flight.lock().await;
            tx.send_replace(Some(outcome));
            *in_flight = None;
        });
        rx
    }
}

impl Inner {
    async fn usable_token(&self) -> Option<String> {
        let now = self.clock.now();
        let buffer = self.settings.refresh_buffer_secs();
        self.current
            .read()
            .await
            .as_ref()
            .filter(|record| record.is_usable(now, buffer))
            .map(|record| record.access_token().to_owned())
    }

    /// Run one refresh: refresh-token grant if a refresh token is held,
    /// otherwise client credentials. An `invalid_grant` rejection drops the
    /// refresh token and retries once with client credentials.
    async fn refresh(&self) -> Outcome {
        let previous = self.current.read().await.clone();
        let refresh_token = previous
            .as_deref()
            .and_then(TokenRecord::refresh_token)
            .map(str::to_owned);

        let record = match refresh_token {
            Some(refresh_token) => {
                match self
                    .exchange(GrantFlow::RefreshToken, Some(refresh_token.as_str()))
                    .await
                {
                    Ok(record) => record,
                    Err(err) => match classify_refresh_error(&err) {
                        RefreshFailure::InvalidGrant => {
                            warn!("refresh token rejected (invalid_grant), falling back to client credentials");
                            if let Some(previous) = previous.as_deref() {
                                self.replace(Arc::new(previous.without_refresh_token()))
                                    .await;
                            }
                            self.exchange(GrantFlow::ClientCredentials, None).await?
                        }
                        RefreshFailure::Other => return Err(err.into()),
                    },
                }
            }
            None => self.exchange(GrantFlow::ClientCredentials, None).await?,
        };

        let record = Arc::new(record);
        self.replace(Arc::clone(&record)).await;
        Ok(record)
    }

    /// One exchange, decoded into the record that would replace the current one.
    async fn exchange(
        &self,
        flow: GrantFlow,
        refresh_token: Option<&str>,
    ) -> oauth_auth::Result<TokenRecord> {
        debug!(%flow, "requesting token");
        let result = self
            .grant
            .exchange(flow, &self.credentials, refresh_token)
            .await
            .and_then(|response| {
                TokenRecord::from_response(response, flow, self.clock.now(), refresh_token)
            });

        match &result {
            Ok(record) => {
                metrics::record_exchange(flow, "success");
                info!(
                    %flow,
                    expires_at = record.expires_at(),
                    has_refresh_token = record.refresh_token().is_some(),
                    "token acquired"
                );
            }
            Err(e) => {
                metrics::record_exchange(flow, "failure");
                warn!(%flow, error = %e, "token request failed");
            }
        }
        result
    }

    /// Swap in a new record, then persist it. Persistence is best-effort.
    async fn replace(&self, record: Arc<TokenRecord>) {
        *self.current.write().await = Some(Arc::clone(&record));
        if let Err(e) = self.store.save(&record).await {
            warn!(path = %self.store.path().display(), error = %e, "failed to persist token record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use oauth_auth::{GrantFuture, TokenResponse};
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::time::Duration;

    const T0: i64 = 1_700_000_000;

    type Call = (GrantFlow, Option<String>);

    /// Grant client double replaying a fixed script of responses.
    struct ScriptedGrant {
        responses: std::sync::Mutex<VecDeque<oauth_auth::Result<TokenResponse>>>,
        calls: std::sync::Mutex<Vec<Call>>,
        delay: Duration,
    }

    impl ScriptedGrant {
        fn new(responses: Vec<oauth_auth::Result<TokenResponse>>) -> Arc<Self> {
            Self::with_delay(responses, Duration::ZERO)
        }

        fn with_delay(
            responses: Vec<oauth_auth::Result<TokenResponse>>,
            delay: Duration,
        ) -> Arc<Self> {
            Arc::new(Self {
                responses: std::sync::Mutex::new(responses.into()),
                calls: std::sync::Mutex::new(Vec::new()),
                delay,
            })
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl GrantClient for ScriptedGrant {
        fn exchange<'a>(
            &'a self,
            flow: GrantFlow,
            _credentials: &'a Credentials,
            refresh_token: Option<&'a str>,
        ) -> GrantFuture<'a> {
            Box::pin(async move {
                self.calls
                    .lock()
                    .unwrap()
                    .push((flow, refresh_token.map(str::to_owned)));
                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
                let next = self.responses.lock().unwrap().pop_front();
                next.unwrap_or_else(|| Err(oauth_auth::Error::Network("script exhausted".into())))
            })
        }
    }

    fn ok(access: &str, refresh: Option<&str>, expires_in: Option<u64>) -> oauth_auth::Result<TokenResponse> {
        Ok(TokenResponse {
            access_token: access.into(),
            refresh_token: refresh.map(str::to_owned),
            expires_in,
            token_type: Some("Bearer".into()),
        })
    }

    fn http(status: u16, body: &str) -> oauth_auth::Result<TokenResponse> {
        Err(oauth_auth::Error::Http {
            status,
            body: body.into(),
        })
    }

    fn credentials() -> Credentials {
        Credentials::new("contoso", "app-123", "s3cr3t", "https://graph.microsoft.com/.default")
            .unwrap()
    }

    fn token_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("token.json")
    }

    async fn manager_at(
        path: PathBuf,
        grant: Arc<ScriptedGrant>,
        clock: Arc<ManualClock>,
    ) -> TokenManager {
        TokenManager::new(credentials(), ManagerSettings::new(path), grant, clock).await
    }

    async fn preload(path: &PathBuf, record: &TokenRecord) {
        TokenStore::new(path).save(record).await.unwrap();
    }

    #[tokio::test]
    async fn first_call_uses_client_credentials_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let grant = ScriptedGrant::new(vec![ok("at_1", None, Some(3600))]);
        let clock = Arc::new(ManualClock::new(T0));
        let manager = manager_at(token_path(&dir), grant.clone(), clock).await;

        assert_eq!(manager.get_token().await.unwrap(), "at_1");
        assert_eq!(grant.calls(), vec![(GrantFlow::ClientCredentials, None)]);

        let persisted = TokenStore::new(token_path(&dir)).load().await.unwrap().unwrap();
        assert_eq!(persisted.access_token(), "at_1");
        assert_eq!(persisted.issued_at(), T0);
        assert_eq!(persisted.expires_at(), T0 + 3600);
    }

    #[tokio::test]
    async fn cached_token_is_reused_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let grant = ScriptedGrant::new(vec![ok("at_1", None, Some(3600))]);
        let clock = Arc::new(ManualClock::new(T0));
        let manager = manager_at(token_path(&dir), grant.clone(), clock.clone()).await;

        let first = manager.get_token().await.unwrap();
        for _ in 0..10 {
            clock.advance(Duration::from_secs(300));
            assert_eq!(manager.get_token().await.unwrap(), first);
        }
        assert_eq!(grant.calls().len(), 1);
    }

    #[tokio::test]
    async fn refresh_triggers_exactly_at_buffer_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let grant = ScriptedGrant::new(vec![
            ok("at_1", Some("rt_1"), Some(3600)),
            ok("at_2", None, Some(3600)),
        ]);
        let clock = Arc::new(ManualClock::new(T0));
        let manager = manager_at(token_path(&dir), grant.clone(), clock.clone()).await;

        assert_eq!(manager.get_token().await.unwrap(), "at_1");

        clock.set(T0 + 3299);
        assert_eq!(manager.get_token().await.unwrap(), "at_1");
        assert_eq!(grant.calls().len(), 1);

        clock.set(T0 + 3301);
        assert_eq!(manager.get_token().await.unwrap(), "at_2");
        assert_eq!(
            grant.calls(),
            vec![
                (GrantFlow::ClientCredentials, None),
                (GrantFlow::RefreshToken, Some("rt_1".into())),
            ]
        );

        let record = manager.snapshot().await.unwrap();
        assert_eq!(record.expires_at(), T0 + 3301 + 3600);
        assert_eq!(record.refresh_token(), Some("rt_1"), "omitted refresh token must be kept");
    }

    #[tokio::test]
    async fn missing_expires_in_defaults_to_one_hour() {
        let dir = tempfile::tempdir().unwrap();
        let grant = ScriptedGrant::new(vec![ok("at_1", None, None)]);
        let clock = Arc::new(ManualClock::new(T0));
        let manager = manager_at(token_path(&dir), grant, clock).await;

        manager.get_token().await.unwrap();
        let record = manager.snapshot().await.unwrap();
        assert_eq!(record.expires_at(), record.issued_at() + 3600);
    }

    #[tokio::test]
    async fn concurrent_stale_callers_share_one_exchange() {
        let dir = tempfile::tempdir().unwrap();
        let grant = ScriptedGrant::with_delay(
            vec![ok("at_shared", None, Some(3600))],
            Duration::from_millis(50),
        );
        let clock = Arc::new(ManualClock::new(T0));
        let manager = manager_at(token_path(&dir), grant.clone(), clock).await;

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.get_token().await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "at_shared");
        }
        assert_eq!(grant.calls().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_stale_callers_share_one_failure() {
        let dir = tempfile::tempdir().unwrap();
        let grant = ScriptedGrant::with_delay(
            vec![http(503, "service unavailable")],
            Duration::from_millis(50),
        );
        let clock = Arc::new(ManualClock::new(T0));
        let manager = manager_at(token_path(&dir), grant.clone(), clock).await;

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.get_token().await })
            })
            .collect();

        for handle in handles {
            assert_eq!(
                handle.await.unwrap().unwrap_err(),
                Error::Http {
                    status: 503,
                    body: "service unavailable".into()
                }
            );
        }
        assert_eq!(grant.calls().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_callers_with_expired_cached_token_share_one_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = token_path(&dir);
        let stale = TokenRecord::new("at_old", Some("rt_1".into()), T0 - 7200, T0 - 3600).unwrap();
        preload(&path, &stale).await;

        let grant = ScriptedGrant::with_delay(
            vec![ok("at_refreshed", None, Some(3600))],
            Duration::from_millis(50),
        );
        let clock = Arc::new(ManualClock::new(T0));
        let manager = manager_at(path, grant.clone(), clock).await;

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.get_token().await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "at_refreshed");
        }
        assert_eq!(
            grant.calls(),
            vec![(GrantFlow::RefreshToken, Some("rt_1".into()))]
        );
    }

    #[tokio::test]
    async fn empty_persisted_refresh_token_uses_client_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let path = token_path(&dir);
        tokio::fs::write(
            &path,
            format!(
                r#"{{"access_token":"at_old","refresh_token":"","expires_at":{},"issued_at":{}}}"#,
                T0 - 3600,
                T0 - 7200
            ),
        )
        .await
        .unwrap();

        let grant = ScriptedGrant::new(vec![ok("at_cc", None, Some(3600))]);
        let clock = Arc::new(ManualClock::new(T0));
        let manager = manager_at(path, grant.clone(), clock).await;

        assert_eq!(manager.get_token().await.unwrap(), "at_cc");
        assert_eq!(grant.calls(), vec![(GrantFlow::ClientCredentials, None)]);
    }

    #[tokio::test]
    async fn invalid_grant_falls_back_to_client_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let path = token_path(&dir);
        let stale = TokenRecord::new("at_old", Some("rt_revoked".into()), T0 - 7200, T0 - 3600).unwrap();
        preload(&path, &stale).await;

        let grant = ScriptedGrant::new(vec![
            http(400, r#"{"error":"invalid_grant","error_description":"AADSTS700082"}"#),
            ok("at_cc", None, Some(3600)),
        ]);
        let clock = Arc::new(ManualClock::new(T0));
        let manager = manager_at(path.clone(), grant.clone(), clock).await;

        assert_eq!(manager.get_token().await.unwrap(), "at_cc");
        assert_eq!(
            grant.calls(),
            vec![
                (GrantFlow::RefreshToken, Some("rt_revoked".into())),
                (GrantFlow::ClientCredentials, None),
            ]
        );

        let record = manager.snapshot().await.unwrap();
        assert_eq!(record.refresh_token(), None);
        let persisted = TokenStore::new(&path).load().await.unwrap().unwrap();
        assert_eq!(persisted.access_token(), "at_cc");
        assert_eq!(persisted.refresh_token(), None);
    }

    #[tokio::test]
    async fn invalid_grant_then_failed_fallback_keeps_downgraded_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = token_path(&dir);
        let stale = TokenRecord::new("at_old", Some("rt_revoked".into()), T0 - 7200, T0 - 3600).unwrap();
        preload(&path, &stale).await;

        let grant = ScriptedGrant::new(vec![
            http(400, r#"{"error":"invalid_grant"}"#),
            http(401, r#"{"error":"invalid_client"}"#),
        ]);
        let clock = Arc::new(ManualClock::new(T0));
        let manager = manager_at(path.clone(), grant.clone(), clock).await;

        let err = manager.get_token().await.unwrap_err();
        assert!(matches!(err, Error::Http { status: 401, .. }), "got: {err:?}");
        assert_eq!(grant.calls().len(), 2);

        let persisted = TokenStore::new(&path).load().await.unwrap().unwrap();
        assert_eq!(persisted.access_token(), "at_old");
        assert_eq!(persisted.refresh_token(), None);
    }

    #[tokio::test]
    async fn transient_refresh_failure_leaves_state_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = token_path(&dir);
        let stale = TokenRecord::new("at_old", Some("rt_old".into()), T0 - 3000, T0 + 100).unwrap();
        preload(&path, &stale).await;

        let grant = ScriptedGrant::new(vec![http(503, "upstream busy")]);
        let clock = Arc::new(ManualClock::new(T0));
        let manager = manager_at(path.clone(), grant.clone(), clock).await;

        let err = manager.get_token().await.unwrap_err();
        assert!(matches!(err, Error::Http { status: 503, .. }), "got: {err:?}");
        assert_eq!(grant.calls(), vec![(GrantFlow::RefreshToken, Some("rt_old".into()))]);

        assert_eq!(manager.snapshot().await, Some(stale.clone()));
        assert_eq!(TokenStore::new(&path).load().await.unwrap(), Some(stale));
    }

    #[tokio::test]
    async fn network_failure_is_surfaced_and_next_call_retries() {
        let dir = tempfile::tempdir().unwrap();
        let grant = ScriptedGrant::new(vec![
            Err(oauth_auth::Error::Network("connection refused".into())),
            ok("at_retry", None, Some(3600)),
        ]);
        let clock = Arc::new(ManualClock::new(T0));
        let manager = manager_at(token_path(&dir), grant.clone(), clock).await;

        assert!(matches!(manager.get_token().await, Err(Error::Network(_))));
        assert_eq!(manager.get_token().await.unwrap(), "at_retry");
        assert_eq!(grant.calls().len(), 2);
    }

    #[tokio::test]
    async fn malformed_response_keeps_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = token_path(&dir);
        let stale = TokenRecord::new("at_old", None, T0 - 3000, T0 + 100).unwrap();
        preload(&path, &stale).await;

        let grant = ScriptedGrant::new(vec![Err(oauth_auth::Error::MalformedResponse(
            "missing field `access_token`".into(),
        ))]);
        let clock = Arc::new(ManualClock::new(T0));
        let manager = manager_at(path, grant, clock).await;

        assert!(matches!(
            manager.get_token().await,
            Err(Error::MalformedResponse(_))
        ));
        assert_eq!(manager.snapshot().await, Some(stale));
    }

    #[tokio::test]
    async fn corrupt_token_file_triggers_fresh_acquisition() {
        let dir = tempfile::tempdir().unwrap();
        let path = token_path(&dir);
        tokio::fs::write(&path, "{{ definitely not json").await.unwrap();

        let grant = ScriptedGrant::new(vec![ok("at_fresh", None, Some(3600))]);
        let clock = Arc::new(ManualClock::new(T0));
        let manager = manager_at(path.clone(), grant.clone(), clock).await;

        assert!(manager.snapshot().await.is_none());
        assert_eq!(manager.get_token().await.unwrap(), "at_fresh");
        assert_eq!(grant.calls(), vec![(GrantFlow::ClientCredentials, None)]);
        assert!(TokenStore::new(&path).load().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn persisted_token_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(T0));

        let first = manager_at(
            token_path(&dir),
            ScriptedGrant::new(vec![ok("at_1", None, Some(3600))]),
            clock.clone(),
        )
        .await;
        assert_eq!(first.get_token().await.unwrap(), "at_1");
        drop(first);

        let grant = ScriptedGrant::new(vec![]);
        let restarted = manager_at(token_path(&dir), grant.clone(), clock).await;
        assert_eq!(restarted.get_token().await.unwrap(), "at_1");
        assert!(grant.calls().is_empty());
    }

    #[tokio::test]
    async fn persistence_failure_does_not_fail_get_token() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        tokio::fs::write(&blocker, "not a directory").await.unwrap();

        let grant = ScriptedGrant::new(vec![ok("at_mem", None, Some(3600))]);
        let clock = Arc::new(ManualClock::new(T0));
        let manager = manager_at(blocker.join("token.json"), grant.clone(), clock).await;

        assert_eq!(manager.get_token().await.unwrap(), "at_mem");
        assert_eq!(manager.get_token().await.unwrap(), "at_mem");
        assert_eq!(grant.calls().len(), 1);
    }

    #[tokio::test]
    async fn abandoned_caller_does_not_abort_shared_exchange() {
        let dir = tempfile::tempdir().unwrap();
        let grant = ScriptedGrant::with_delay(
            vec![ok("at_shared", None, Some(3600))],
            Duration::from_millis(100),
        );
        let clock = Arc::new(ManualClock::new(T0));
        let manager = manager_at(token_path(&dir), grant.clone(), clock).await;

        let impatient = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.get_token().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        impatient.abort();
        assert!(impatient.await.unwrap_err().is_cancelled());

        assert_eq!(manager.get_token().await.unwrap(), "at_shared");
        assert_eq!(grant.calls().len(), 1);
    }

    #[tokio::test]
    async fn caller_timeout_releases_only_that_caller() {
        let dir = tempfile::tempdir().unwrap();
        let grant = ScriptedGrant::with_delay(
            vec![ok("at_slow", None, Some(3600))],
            Duration::from_millis(100),
        );
        let clock = Arc::new(ManualClock::new(T0));
        let manager = manager_at(token_path(&dir), grant.clone(), clock).await;

        let hurried = tokio::time::timeout(Duration::from_millis(10), manager.get_token()).await;
        assert!(hurried.is_err(), "short deadline should elapse first");

        assert_eq!(manager.get_token().await.unwrap(), "at_slow");
        assert_eq!(grant.calls().len(), 1);
    }

    #[tokio::test]
    async fn authorization_header_uses_bearer_scheme() {
        let dir = tempfile::tempdir().unwrap();
        let grant = ScriptedGrant::new(vec![ok("at_hdr", None, Some(3600))]);
        let clock = Arc::new(ManualClock::new(T0));
        let manager = manager_at(token_path(&dir), grant, clock).await;

        assert_eq!(manager.authorization_header().await.unwrap(), "Bearer at_hdr");
    }
}
