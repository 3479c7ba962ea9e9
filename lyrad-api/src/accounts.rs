//! Upstream account pool
//!
//! Round-robin rotation over the configured accounts with per-account
//! circuit breaking: consecutive failures past a threshold quarantine the
//! account for a cooldown, after which it rejoins the rotation. Accounts
//! without credentials are kept visible for monitoring but never rotate.
//! One mutex serializes the rotation index and all health state.

use crate::stats::AccountStats;
use lyrad_common::Error;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// One configured upstream account. Immutable after startup; ephemeral
/// health lives in the pool.
#[derive(Debug, Clone)]
pub struct Account {
    /// Human label, also the stats counter key
    pub name: String,
    /// Per-account `media-user-token` header value
    pub media_user_token: String,
    /// Regional catalog identifier
    pub storefront: String,
    /// Credentials missing; excluded from rotation, visible for monitoring
    pub out_of_service: bool,
}

/// Ephemeral per-account circuit-breaker state
#[derive(Debug, Default, Clone)]
struct AccountHealth {
    consecutive_failures: u32,
    quarantined_until: Option<Instant>,
}

impl AccountHealth {
    fn quarantined(&self, now: Instant) -> bool {
        self.quarantined_until.is_some_and(|until| until > now)
    }
}

struct PoolState {
    index: usize,
    health: Vec<AccountHealth>,
}

/// Monitoring view of one account
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub name: String,
    pub storefront: String,
    pub out_of_service: bool,
    pub consecutive_failures: u32,
    /// Remaining quarantine, in seconds, when the breaker is open
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quarantined_for_secs: Option<u64>,
    /// Successful upstream requests attributed to this account
    pub successes: u64,
}

/// Round-robin account pool with per-account circuit breaking
pub struct AccountPool {
    accounts: Vec<Account>,
    state: Mutex<PoolState>,
    threshold: u32,
    cooldown: Duration,
    stats: Arc<AccountStats>,
}

impl AccountPool {
    pub fn new(
        accounts: Vec<Account>,
        threshold: u32,
        cooldown: Duration,
        stats: Arc<AccountStats>,
    ) -> Self {
        let health = vec![AccountHealth::default(); accounts.len()];
        Self {
            accounts,
            state: Mutex::new(PoolState { index: 0, health }),
            threshold: threshold.max(1),
            cooldown,
            stats,
        }
    }

    /// The account at the rotation cursor, advancing past quarantined and
    /// out-of-service entries first.
    pub async fn current(&self) -> Result<Account, Error> {
        let mut state = self.state.lock().await;
        let idx = self.find_eligible(&state, state.index)?;
        state.index = idx;
        Ok(self.accounts[idx].clone())
    }

    /// Advance the cursor to the next eligible account and return it.
    pub async fn next_account(&self) -> Result<Account, Error> {
        let mut state = self.state.lock().await;
        let start = (state.index + 1) % self.accounts.len().max(1);
        let idx = self.find_eligible(&state, start)?;
        state.index = idx;
        Ok(self.accounts[idx].clone())
    }

    /// Force the cursor past `name` without quarantining it. Used when the
    /// upstream rate-limits an account that is not yet unhealthy. Returns
    /// the new current account.
    pub async fn skip(&self, name: &str) -> Result<Account, Error> {
        let mut state = self.state.lock().await;
        if self
            .accounts
            .get(state.index)
            .is_some_and(|a| a.name == name)
        {
            let start = (state.index + 1) % self.accounts.len().max(1);
            let idx = self.find_eligible(&state, start)?;
            state.index = idx;
        }
        let idx = self.find_eligible(&state, state.index)?;
        state.index = idx;
        Ok(self.accounts[idx].clone())
    }

    /// Reset the failure streak and record the success in the usage stats.
    pub async fn report_success(&self, name: &str) {
        let mut state = self.state.lock().await;
        if let Some(idx) = self.position(name) {
            state.health[idx].consecutive_failures = 0;
            state.health[idx].quarantined_until = None;
        }
        drop(state);
        self.stats.record_success(name).await;
    }

    /// Count a failure; open the breaker once the streak hits the threshold.
    pub async fn report_failure(&self, name: &str) {
        let mut state = self.state.lock().await;
        let Some(idx) = self.position(name) else { return };
        let health = &mut state.health[idx];
        health.consecutive_failures += 1;
        if health.consecutive_failures >= self.threshold {
            health.quarantined_until = Some(Instant::now() + self.cooldown);
            health.consecutive_failures = 0;
            warn!(
                account = name,
                cooldown_secs = self.cooldown.as_secs(),
                "account quarantined after repeated failures"
            );
        } else {
            info!(
                account = name,
                failures = health.consecutive_failures,
                "upstream failure recorded"
            );
        }
    }

    /// Current failure streak for one account (monitoring and tests)
    pub async fn consecutive_failures(&self, name: &str) -> u32 {
        let state = self.state.lock().await;
        self.position(name)
            .map(|idx| state.health[idx].consecutive_failures)
            .unwrap_or(0)
    }

    /// Monitoring snapshot of every configured account
    pub async fn snapshot(&self) -> Vec<AccountView> {
        let state = self.state.lock().await;
        let now = Instant::now();
        let mut views = Vec::with_capacity(self.accounts.len());
        for (idx, account) in self.accounts.iter().enumerate() {
            let health = &state.health[idx];
            let quarantined_for_secs = health
                .quarantined_until
                .filter(|until| *until > now)
                .map(|until| (until - now).as_secs());
            views.push(AccountView {
                name: account.name.clone(),
                storefront: account.storefront.clone(),
                out_of_service: account.out_of_service,
                consecutive_failures: health.consecutive_failures,
                quarantined_for_secs,
                successes: self.stats.successes(&account.name).await,
            });
        }
        views
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.accounts.iter().position(|a| a.name == name)
    }

    fn find_eligible(&self, state: &PoolState, start: usize) -> Result<usize, Error> {
        let n = self.accounts.len();
        if n == 0 {
            return Err(Error::NoHealthyAccount);
        }
        let now = Instant::now();
        for offset in 0..n {
            let idx = (start + offset) % n;
            if self.accounts[idx].out_of_service {
                continue;
            }
            if state.health[idx].quarantined(now) {
                continue;
            }
            return Ok(idx);
        }
        Err(Error::NoHealthyAccount)
    }
}
