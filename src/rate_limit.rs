// src/rate_limit.rs
//! Per-client token bucket limiter exposed as a Rocket request guard.

use dashmap::DashMap;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::Request;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::app_log;
use crate::error::ApiError;

const STALE_AFTER: Duration = Duration::from_secs(300);

/// `burst` requests at once, then `refill_per_sec` sustained. A zero refill never recovers
/// and asks clients to come back in a minute.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub burst: u32,
    pub refill_per_sec: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            burst: 60,
            refill_per_sec: 10.0,
        }
    }
}

impl RateLimitConfig {
    fn capacity(&self) -> f64 {
        f64::from(self.burst)
    }

    /// Whole seconds until `deficit` tokens have dripped back in.
    fn wait_secs(&self, deficit: f64) -> u64 {
        if self.refill_per_sec > 0.0 {
            (deficit / self.refill_per_sec).ceil().max(1.0) as u64
        } else {
            60
        }
    }
}

#[derive(Debug, Clone)]
struct Bucket {
    level: f64,
    seen: Instant,
}

impl Bucket {
    fn full(config: &RateLimitConfig, now: Instant) -> Self {
        Self {
            level: config.capacity(),
            seen: now,
        }
    }

    fn refill(&mut self, config: &RateLimitConfig, now: Instant) {
        let idle = now.saturating_duration_since(self.seen).as_secs_f64();
        self.level = config
            .capacity()
            .min(self.level + idle * config.refill_per_sec);
        self.seen = now;
    }

    fn take(&mut self, config: &RateLimitConfig) -> Result<(), u64> {
        match self.level - 1.0 {
            left if left >= 0.0 => {
                self.level = left;
                Ok(())
            }
            short => Err(config.wait_secs(-short)),
        }
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<DashMap<IpAddr, Bucket>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: Arc::default(),
            config,
        }
    }

    /// Spend one token for `ip`. `Err` carries the seconds to wait.
    pub fn check(&self, ip: IpAddr) -> Result<(), u64> {
        self.check_at(ip, Instant::now())
    }

    fn check_at(&self, ip: IpAddr, now: Instant) -> Result<(), u64> {
        let mut bucket = self
            .buckets
            .entry(ip)
            .or_insert_with(|| Bucket::full(&self.config, now));
        bucket.refill(&self.config, now);
        bucket.take(&self.config)
    }

    /// Forget clients idle for longer than `STALE_AFTER`.
    pub fn cleanup(&self) {
        self.evict_idle(Instant::now());
    }

    fn evict_idle(&self, now: Instant) {
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.seen) < STALE_AFTER);
    }

    /// Spawn the periodic eviction task on the current runtime.
    pub fn spawn_cleanup(&self) {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                limiter.cleanup();
            }
        });
    }
}

/// X-Forwarded-For first, then the peer address, then localhost.
pub fn client_ip(req: &Request<'_>) -> IpAddr {
    req.headers()
        .get_one("X-Forwarded-For")
        .and_then(|value| value.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok())
        .or_else(|| req.client_ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Request-local record of the last rejection, read back by the 429 catcher.
pub struct RetryAfter(pub Option<u64>);

/// Guard placed on mutating routes. Fails with 429 once the client bucket is empty.
pub struct RateLimited;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for RateLimited {
    type Error = ApiError;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(limiter) = req.rocket().state::<RateLimiter>() else {
            return Outcome::Success(RateLimited);
        };

        let ip = client_ip(req);
        match limiter.check(ip) {
            Ok(()) => Outcome::Success(RateLimited),
            Err(retry_after) => {
                app_log!(warn, "Rate limited {} for {}s", ip, retry_after);
                req.local_cache(|| RetryAfter(Some(retry_after)));
                Outcome::Error((
                    Status::TooManyRequests,
                    ApiError::RateLimited { retry_after },
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn test_bucket_allows_burst() {
        let limiter = RateLimiter::new(RateLimitConfig {
            burst: 3,
            refill_per_sec: 0.0,
        });

        assert!(limiter.check(ip(1)).is_ok());
        assert!(limiter.check(ip(1)).is_ok());
        assert!(limiter.check(ip(1)).is_ok());
        assert_eq!(limiter.check(ip(1)), Err(60));
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = RateLimiter::new(RateLimitConfig {
            burst: 1,
            refill_per_sec: 0.0,
        });

        assert!(limiter.check(ip(1)).is_ok());
        assert!(limiter.check(ip(1)).is_err());
        assert!(limiter.check(ip(2)).is_ok());
    }

    #[test]
    fn test_retry_after_is_at_least_one_second() {
        let limiter = RateLimiter::new(RateLimitConfig {
            burst: 1,
            refill_per_sec: 1.0,
        });

        limiter.check(ip(1)).unwrap();
        let retry = limiter.check(ip(1)).unwrap_err();
        assert!(retry >= 1);
    }

    #[test]
    fn test_tokens_drip_back_over_time() {
        let limiter = RateLimiter::new(RateLimitConfig {
            burst: 2,
            refill_per_sec: 0.5,
        });
        let start = Instant::now();

        assert!(limiter.check_at(ip(1), start).is_ok());
        assert!(limiter.check_at(ip(1), start).is_ok());
        assert_eq!(limiter.check_at(ip(1), start), Err(2));

        // One token back after two seconds, never more than the burst.
        assert!(limiter.check_at(ip(1), start + Duration::from_secs(2)).is_ok());
        assert!(limiter.check_at(ip(1), start + Duration::from_secs(2)).is_err());
        let later = start + Duration::from_secs(3600);
        assert!(limiter.check_at(ip(1), later).is_ok());
        assert!(limiter.check_at(ip(1), later).is_ok());
        assert!(limiter.check_at(ip(1), later).is_err());
    }

    #[test]
    fn test_cleanup_drops_only_idle_buckets() {
        let limiter = RateLimiter::new(RateLimitConfig::default());
        let start = Instant::now();
        limiter.check_at(ip(1), start).unwrap();
        limiter.check_at(ip(2), start + STALE_AFTER).unwrap();

        limiter.evict_idle(start + Duration::from_secs(1));
        assert_eq!(limiter.buckets.len(), 2);

        limiter.evict_idle(start + STALE_AFTER + Duration::from_secs(1));
        assert_eq!(limiter.buckets.len(), 1);
        assert!(limiter.buckets.contains_key(&ip(2)));
    }
}
