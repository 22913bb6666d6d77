//! 지수 백오프 재시도.
//!
//! 재시도 여부와 대기 시간은 순수 함수 [`RetryPolicy::next_action`]이 결정하고,
//! [`RetryExecutor`]는 그 결정에 따라 호출/대기만 수행합니다.
//!
//! 대기 시간: `min(initial_backoff × 2^(attempt-1), max_backoff)`

use crate::ratelimit::RateLimiter;
use jusik_data::ProviderError;
use rand::Rng;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// 재시도 설정.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// 첫 재시도 전 대기 시간
    pub initial_backoff: Duration,
    /// 최대 호출 횟수 (1이면 재시도 없음)
    pub max_attempts: u32,
    /// 대기 시간 상한
    pub max_backoff: Duration,
}

impl RetryConfig {
    /// 새 설정 생성. `max_attempts`는 최소 1로 보정됩니다.
    pub const fn new(initial_backoff: Duration, max_attempts: u32, max_backoff: Duration) -> Self {
        Self {
            initial_backoff,
            max_attempts: if max_attempts == 0 { 1 } else { max_attempts },
            max_backoff,
        }
    }

    /// `attempt`번째 호출이 실패한 뒤의 대기 시간 (attempt는 1부터).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        1u32.checked_shl(exponent)
            .and_then(|factor| self.initial_backoff.checked_mul(factor))
            .map_or(self.max_backoff, |d| d.min(self.max_backoff))
    }
}

/// 재시도 가능 여부 분류.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for ProviderError {
    fn is_retryable(&self) -> bool {
        ProviderError::is_retryable(self)
    }
}

/// 실패 후 다음 동작.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    /// 대기 후 재시도
    RetryAfter(Duration),
    /// 재시도 중단
    Fail,
}

/// 재시도 정책.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    config: RetryConfig,
    full_jitter: bool,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            full_jitter: false,
        }
    }

    /// 대기 시간을 `[0, backoff]`에서 무작위로 선택.
    pub fn with_full_jitter(mut self) -> Self {
        self.full_jitter = true;
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// `attempt`번째 호출이 `err`로 실패했을 때 다음 동작 결정.
    pub fn next_action<E: Retryable>(&self, attempt: u32, err: &E) -> RetryAction {
        if !err.is_retryable() || attempt >= self.config.max_attempts {
            return RetryAction::Fail;
        }

        let backoff = self.config.backoff(attempt);
        if self.full_jitter && !backoff.is_zero() {
            let millis = backoff.as_millis().min(u64::MAX as u128) as u64;
            let jittered = rand::thread_rng().gen_range(0..=millis);
            RetryAction::RetryAfter(Duration::from_millis(jittered))
        } else {
            RetryAction::RetryAfter(backoff)
        }
    }
}

/// 재시도 실행 에러.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// 재시도 불가 에러 (즉시 반환)
    #[error("{0}")]
    NonRetriable(E),

    /// 최대 시도 횟수 소진
    #[error("retries exhausted after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    /// 호출 또는 대기 중 취소
    #[error("operation cancelled")]
    Cancelled,
}

impl<E> RetryError<E> {
    /// 마지막 실패 원인.
    pub fn last_error(&self) -> Option<&E> {
        match self {
            RetryError::NonRetriable(e) | RetryError::Exhausted { last: e, .. } => Some(e),
            RetryError::Cancelled => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled)
    }
}

/// 재시도 실행기.
#[derive(Debug, Clone, Copy)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self::with_policy(RetryPolicy::new(config))
    }

    pub fn with_policy(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// 작업을 재시도하며 실행.
    pub async fn execute<T, E, F, Fut>(
        &self,
        cancel: &CancellationToken,
        operation: F,
    ) -> Result<T, RetryError<E>>
    where
        E: Retryable + fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run(cancel, None, operation).await
    }

    /// 매 시도 전에 limiter 토큰을 얻고 작업 실행.
    ///
    /// 재시도 호출도 속도 제한을 따릅니다.
    pub async fn execute_rate_limited<T, E, F, Fut>(
        &self,
        cancel: &CancellationToken,
        limiter: &RateLimiter,
        operation: F,
    ) -> Result<T, RetryError<E>>
    where
        E: Retryable + fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run(cancel, Some(limiter), operation).await
    }

    async fn run<T, E, F, Fut>(
        &self,
        cancel: &CancellationToken,
        limiter: Option<&RateLimiter>,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        E: Retryable + fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0u32;

        loop {
            if let Some(limiter) = limiter {
                limiter
                    .acquire(cancel)
                    .await
                    .map_err(|_| RetryError::Cancelled)?;
            }

            attempt += 1;
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                result = operation() => result,
            };

            let err = match result {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            match self.policy.next_action(attempt, &err) {
                RetryAction::Fail => {
                    return Err(if err.is_retryable() {
                        RetryError::Exhausted {
                            attempts: attempt,
                            last: err,
                        }
                    } else {
                        RetryError::NonRetriable(err)
                    });
                }
                RetryAction::RetryAfter(delay) => {
                    warn!(
                        attempt,
                        max_attempts = self.policy.config.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "일시적 오류, 재시도 대기"
                    );

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    #[derive(Debug, PartialEq)]
    struct TestError {
        retryable: bool,
    }

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test error (retryable: {})", self.retryable)
        }
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            self.retryable
        }
    }

    const TRANSIENT: TestError = TestError { retryable: true };
    const PERMANENT: TestError = TestError { retryable: false };

    fn config() -> RetryConfig {
        RetryConfig::new(Duration::from_secs(5), 3, Duration::from_secs(60))
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let cfg = RetryConfig::new(Duration::from_secs(5), 10, Duration::from_secs(60));
        assert_eq!(cfg.backoff(1), Duration::from_secs(5));
        assert_eq!(cfg.backoff(2), Duration::from_secs(10));
        assert_eq!(cfg.backoff(3), Duration::from_secs(20));
        assert_eq!(cfg.backoff(4), Duration::from_secs(40));
        assert_eq!(cfg.backoff(5), Duration::from_secs(60));
        assert_eq!(cfg.backoff(64), Duration::from_secs(60));
    }

    #[test]
    fn test_next_action_decisions() {
        let policy = RetryPolicy::new(config());

        assert_eq!(
            policy.next_action(1, &TRANSIENT),
            RetryAction::RetryAfter(Duration::from_secs(5))
        );
        assert_eq!(
            policy.next_action(2, &TRANSIENT),
            RetryAction::RetryAfter(Duration::from_secs(10))
        );
        assert_eq!(policy.next_action(3, &TRANSIENT), RetryAction::Fail);
        assert_eq!(policy.next_action(1, &PERMANENT), RetryAction::Fail);
    }

    #[test]
    fn test_zero_attempts_normalized() {
        assert_eq!(
            RetryConfig::new(Duration::from_secs(1), 0, Duration::from_secs(1)).max_attempts,
            1
        );
    }

    #[test]
    fn test_full_jitter_within_bound() {
        let policy = RetryPolicy::new(config()).with_full_jitter();
        for _ in 0..100 {
            match policy.next_action(2, &TRANSIENT) {
                RetryAction::RetryAfter(d) => assert!(d <= Duration::from_secs(10)),
                RetryAction::Fail => panic!("unexpected fail"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let executor = RetryExecutor::new(config());
        let calls = Arc::new(AtomicU32::new(0));

        let result = executor
            .execute(&CancellationToken::new(), || {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(TestError { retryable: true })
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retriable_returns_immediately() {
        let executor = RetryExecutor::new(config());
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let result: Result<(), _> = executor
            .execute(&CancellationToken::new(), || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(TestError { retryable: false })
                }
            })
            .await;

        assert!(matches!(result, Err(RetryError::NonRetriable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let executor = RetryExecutor::new(config());
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let start = Instant::now();
        let result: Result<(), _> = executor
            .execute(&cancel, || async { Err(TestError { retryable: true }) })
            .await;

        assert!(matches!(result, Err(RetryError::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_in_flight_call() {
        let executor = RetryExecutor::new(config());
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            canceller.cancel();
        });

        let start = Instant::now();
        let result: Result<(), RetryError<TestError>> = executor
            .execute(&cancel, || async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(RetryError::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_attempts_wait_for_tokens() {
        let executor = RetryExecutor::new(RetryConfig::new(
            Duration::from_millis(100),
            3,
            Duration::from_secs(1),
        ));
        let limiter = RateLimiter::new(Duration::from_secs(3));
        let start = Instant::now();

        let result: Result<(), _> = executor
            .execute_rate_limited(&CancellationToken::new(), &limiter, || async {
                Err(TestError { retryable: true })
            })
            .await;

        assert!(matches!(result, Err(RetryError::Exhausted { attempts: 3, .. })));
        // 토큰 간격(3초)이 백오프보다 길어 시도 간격을 결정
        assert!(start.elapsed() >= Duration::from_secs(6));
    }
}
