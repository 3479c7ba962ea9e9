//! Two-tier request admission
//!
//! Two token-bucket families: one for requests that will probably reach an
//! upstream provider, a larger one for requests a cache probe says will be
//! served locally. The classification is advisory; once admitted, a request
//! that turns out to be the other kind is not re-charged.

use governor::clock::{Clock, DefaultClock};
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use lyrad_common::Error;
use std::num::NonZeroU32;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Which bucket family a request is charged against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Probable cache hit
    Cached,
    /// Probable upstream fetch
    Upstream,
}

/// Token-bucket configuration for one family
#[derive(Debug, Clone, Copy)]
pub struct BucketConfig {
    pub per_second: u32,
    pub burst: u32,
}

/// Two-family request limiter
pub struct RequestLimiter {
    upstream: DirectLimiter,
    cached: DirectLimiter,
    clock: DefaultClock,
}

impl RequestLimiter {
    pub fn new(upstream: BucketConfig, cached: BucketConfig) -> Self {
        let clock = DefaultClock::default();
        Self {
            upstream: RateLimiter::direct_with_clock(quota(upstream), clock.clone()),
            cached: RateLimiter::direct_with_clock(quota(cached), clock.clone()),
            clock,
        }
    }

    /// Admit or refuse a request. Refusal carries a retry hint in
    /// milliseconds for the 429 response body.
    pub fn admit(&self, class: Admission) -> Result<(), Error> {
        let limiter = match class {
            Admission::Upstream => &self.upstream,
            Admission::Cached => &self.cached,
        };
        limiter.check().map_err(|not_until| {
            let wait = not_until.wait_time_from(self.clock.now());
            Error::RateLimited {
                retry_after_ms: wait.as_millis().max(1) as u64,
            }
        })
    }
}

fn quota(config: BucketConfig) -> Quota {
    let per_second = NonZeroU32::new(config.per_second.max(1)).expect("nonzero rate");
    let burst = NonZeroU32::new(config.burst.max(1)).expect("nonzero burst");
    Quota::per_second(per_second).allow_burst(burst)
}
