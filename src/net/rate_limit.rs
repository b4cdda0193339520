//! Fixed-window, per-client request counting.
//!
//! Every client address gets a counter. All counters are dropped together
//! when the window elapses, so a client that hit the limit is served again
//! as soon as the next window starts, regardless of when it was blocked.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_std::task::{self, JoinHandle};
use dashmap::DashMap;
use thiserror::Error;

/// Length of one counting window.
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("client {client} exceeded {limit} requests per minute")]
pub struct RateLimitExceeded {
    pub client: IpAddr,
    pub limit: u32,
}

pub struct RateLimiter {
    counters: DashMap<IpAddr, u32>,
    limit: u32,
}

impl RateLimiter {
    pub fn new(limit: u32) -> Self {
        Self {
            counters: DashMap::new(),
            limit,
        }
    }

    /// Fails if `client` already used up the current window, without counting.
    pub fn check_only(&self, client: IpAddr) -> Result<(), RateLimitExceeded> {
        let count = self.count(client);
        if count >= self.limit {
            return Err(self.exceeded(client));
        }
        Ok(())
    }

    /// Fails if `client` already used up the current window, otherwise counts
    /// one more request.
    pub fn check_and_increment(&self, client: IpAddr) -> Result<(), RateLimitExceeded> {
        // The entry guard holds the shard lock, so check and increment are atomic.
        let mut count = self.counters.entry(client).or_insert(0);
        if *count >= self.limit {
            return Err(self.exceeded(client));
        }
        *count += 1;
        Ok(())
    }

    pub fn count(&self, client: IpAddr) -> u32 {
        self.counters.get(&client).map_or(0, |c| *c)
    }

    pub fn reset(&self) {
        self.counters.clear();
    }

    /// Spawns the task clearing every counter once per `period`.
    pub fn spawn_reset_timer(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        task::spawn(async move {
            loop {
                task::sleep(period).await;
                log::debug!("rate window elapsed, clearing {} counters", limiter.counters.len());
                limiter.reset();
            }
        })
    }

    fn exceeded(&self, client: IpAddr) -> RateLimitExceeded {
        RateLimitExceeded {
            client,
            limit: self.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const A: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
    const B: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

    #[test]
    fn unknown_client_counts_as_zero() {
        let limiter = RateLimiter::new(1);
        assert_eq!(limiter.count(A), 0);
        assert!(limiter.check_only(A).is_ok());
        assert_eq!(limiter.count(A), 0);
    }

    #[test]
    fn increments_until_limit() {
        let limiter = RateLimiter::new(2);
        assert!(limiter.check_and_increment(A).is_ok());
        assert!(limiter.check_and_increment(A).is_ok());

        let err = limiter.check_and_increment(A).unwrap_err();
        assert_eq!(err, RateLimitExceeded { client: A, limit: 2 });
        assert!(limiter.check_only(A).is_err());
        assert_eq!(limiter.count(A), 2);

        assert!(limiter.check_and_increment(B).is_ok());
    }

    #[test]
    fn reset_clears_every_client() {
        let limiter = RateLimiter::new(1);
        limiter.check_and_increment(A).unwrap();
        limiter.check_and_increment(B).unwrap();

        limiter.reset();
        assert!(limiter.check_only(A).is_ok());
        assert!(limiter.check_only(B).is_ok());
    }

    #[test]
    fn zero_limit_refuses_everyone() {
        let limiter = RateLimiter::new(0);
        assert!(limiter.check_only(A).is_err());
        assert!(limiter.check_and_increment(A).is_err());
    }

    #[async_std::test]
    async fn timer_resets_window() {
        let limiter = Arc::new(RateLimiter::new(1));
        limiter.check_and_increment(A).unwrap();

        let timer = limiter.spawn_reset_timer(Duration::from_millis(20));
        task::sleep(Duration::from_millis(100)).await;
        assert_eq!(limiter.count(A), 0);
        timer.cancel().await;
    }
}
