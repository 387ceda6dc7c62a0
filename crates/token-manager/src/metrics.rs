//! Token exchange metrics
//!
//! - `oauth_token_requests_total` (counter): labels `flow`, `outcome`
//! - `oauth_token_cache_hits_total` (counter)
//!
//! Without an installed recorder these calls are no-ops.

use oauth_auth::GrantFlow;

/// Record one exchange with the token endpoint.
pub fn record_exchange(flow: GrantFlow, outcome: &'static str) {
    metrics::counter!(
        "oauth_token_requests_total",
        "flow" => flow.grant_type(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a `get_token` call served from the cache.
pub fn record_cache_hit() {
    metrics::counter!("oauth_token_cache_hits_total").increment(1);
}
