//! 请求限速
//!
//! 所有 worker 共享同一个令牌桶，按 provider 公布的每分钟请求数放行。

use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use tracing::debug;

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// 共享的请求限速器
///
/// `requests_per_minute == 0` 时不限速。
pub struct RequestLimiter {
    limiter: Option<DirectRateLimiter>,
    requests_per_minute: u32,
}

impl RequestLimiter {
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let limiter = NonZeroU32::new(requests_per_minute)
            .map(|rpm| RateLimiter::direct(Quota::per_minute(rpm).allow_burst(NonZeroU32::MIN)));

        Self {
            limiter,
            requests_per_minute,
        }
    }

    pub fn unlimited() -> Self {
        Self::per_minute(0)
    }

    pub fn is_limited(&self) -> bool {
        self.limiter.is_some()
    }

    /// 等待一个请求名额
    pub async fn acquire(&self) {
        if let Some(limiter) = &self.limiter {
            if limiter.check().is_err() {
                debug!("达到请求速率上限 ({}/分钟)，等待放行", self.requests_per_minute);
                limiter.until_ready().await;
            }
        }
    }
}
