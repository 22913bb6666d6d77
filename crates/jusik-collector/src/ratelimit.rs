//! 제공자별 요청 속도 제한.
//!
//! Token Bucket 알고리즘 기반으로 "고정 간격마다 최대 한 번" 요청을 허용합니다.
//! 대기자는 잠금 획득 순서(FIFO)대로 토큰을 받으며,
//! 순차 호출에서는 단순한 간격 지연과 같습니다.

use crate::error::Cancelled;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Token Bucket 구조체.
#[derive(Debug)]
struct TokenBucket {
    /// 현재 토큰 수
    tokens: u32,
    /// 최대 토큰 수 (버킷 용량)
    max_tokens: u32,
    /// 토큰 하나가 리필되는 간격
    interval: Duration,
    /// 마지막 리필 시각
    last_refill: Instant,
}

impl TokenBucket {
    fn new(interval: Duration, max_tokens: u32) -> Self {
        let max_tokens = max_tokens.max(1);
        Self {
            tokens: max_tokens,
            max_tokens,
            interval,
            last_refill: Instant::now(),
        }
    }

    /// 경과한 간격만큼 토큰 리필.
    fn refill(&mut self, now: Instant) {
        if self.tokens >= self.max_tokens {
            self.last_refill = now;
            return;
        }

        let elapsed = now.saturating_duration_since(self.last_refill);
        let periods = (elapsed.as_nanos() / self.interval.as_nanos()).min(u32::MAX as u128) as u32;
        if periods == 0 {
            return;
        }

        self.tokens = self.tokens.saturating_add(periods).min(self.max_tokens);
        if self.tokens >= self.max_tokens {
            self.last_refill = now;
        } else {
            self.last_refill += self.interval * periods;
        }
    }

    /// 토큰 소비 시도.
    fn try_acquire(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// 다음 토큰이 리필되는 시각.
    fn next_token_at(&self) -> Instant {
        self.last_refill + self.interval
    }
}

/// 공유 Rate Limiter.
///
/// 복제본은 같은 버킷을 공유합니다. 전역 싱글턴이 아니며
/// 제공자 실행마다 만들어 수집기에 넘깁니다.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval: Duration,
    bucket: Option<Arc<Mutex<TokenBucket>>>,
}

impl RateLimiter {
    /// 간격마다 한 번 (버스트 1).
    pub fn new(interval: Duration) -> Self {
        Self::with_burst(interval, 1)
    }

    /// 버스트 용량을 지정하여 생성.
    pub fn with_burst(interval: Duration, burst: u32) -> Self {
        if interval.is_zero() {
            return Self::unlimited();
        }
        Self {
            interval,
            bucket: Some(Arc::new(Mutex::new(TokenBucket::new(interval, burst)))),
        }
    }

    /// 대기 없이 항상 통과하는 limiter.
    pub fn unlimited() -> Self {
        Self {
            interval: Duration::ZERO,
            bucket: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 토큰을 얻을 때까지 대기.
    ///
    /// 대기 중 취소되면 토큰을 소비하지 않고 즉시 `Cancelled`를 반환합니다.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), Cancelled> {
        let Some(bucket) = &self.bucket else {
            return if cancel.is_cancelled() {
                Err(Cancelled)
            } else {
                Ok(())
            };
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Cancelled),
            _ = Self::wait_for_token(bucket) => Ok(()),
        }
    }

    async fn wait_for_token(bucket: &Mutex<TokenBucket>) {
        // 대기 중에도 잠금을 유지해야 뒤따르는 호출자가 순서대로 줄을 섭니다
        let mut bucket = bucket.lock().await;
        loop {
            if bucket.try_acquire(Instant::now()) {
                return;
            }
            sleep_until(bucket.next_token_at()).await;
        }
    }
}
