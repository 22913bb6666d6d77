//! 제공자별 수집기.
//!
//! 심볼마다 토큰 획득 → 재시도 래핑된 제공자 호출 → 구간 필터 순서로 진행합니다.
//! 한 심볼의 실패가 다른 심볼 수집을 중단시키지 않으며,
//! 모인 행은 실패 집계와 함께 반환됩니다.

use crate::error::{FetchError, PartialFailure, SymbolFailure};
use crate::ratelimit::RateLimiter;
use crate::retry::{RetryConfig, RetryError, RetryExecutor};
use jusik_core::{DailyPrice, FxRate, Gap, WatchlistEntry};
use jusik_data::{DailyPriceFetcher, FxRateFetcher};
use std::collections::{HashMap, HashSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 수집 결과: 모인 행과 선택적 부분 실패.
///
/// `failure`가 있어도 `rows`는 저장 대상입니다.
#[derive(Debug)]
pub struct CollectOutcome<T> {
    pub rows: Vec<T>,
    pub failure: Option<PartialFailure>,
}

impl<T> CollectOutcome<T> {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// 일봉 가격 수집기.
pub struct PriceCollector<F> {
    fetcher: F,
    limiter: RateLimiter,
    executor: RetryExecutor,
}

impl<F: DailyPriceFetcher> PriceCollector<F> {
    pub fn new(fetcher: F, limiter: RateLimiter, retry: RetryConfig) -> Self {
        Self {
            fetcher,
            limiter,
            executor: RetryExecutor::new(retry),
        }
    }

    /// 재시도 실행기 교체 (지터 정책 등).
    pub fn with_executor(mut self, executor: RetryExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn source(&self) -> &str {
        self.fetcher.source()
    }

    /// 워치리스트 순서대로 구간이 있는 심볼을 수집.
    ///
    /// 같은 심볼은 처음 나온 항목에서 한 번만 수집합니다.
    /// 취소되면 진행 중인 심볼을 버리고 그때까지 모인 행을 반환합니다.
    pub async fn collect_all(
        &self,
        cancel: &CancellationToken,
        entries: &[WatchlistEntry],
        gaps: &HashMap<String, Vec<Gap>>,
    ) -> CollectOutcome<DailyPrice> {
        let source = self.source();
        let mut rows = Vec::new();
        let mut partial = PartialFailure::default();
        let mut seen = HashSet::with_capacity(entries.len());

        'symbols: for entry in entries {
            if !seen.insert(entry.symbol.as_str()) {
                warn!(source, symbol = %entry.symbol, "중복 심볼 건너뜀");
                continue;
            }
            let Some(symbol_gaps) = gaps.get(&entry.symbol) else {
                debug!(source, symbol = %entry.symbol, "수집할 구간 없음");
                continue;
            };

            for gap in symbol_gaps {
                match self.fetch_gap(cancel, entry, gap).await {
                    Ok(fetched) => {
                        let before = fetched.len();
                        let in_gap: Vec<DailyPrice> =
                            fetched.into_iter().filter(|p| gap.contains(p.date)).collect();
                        if in_gap.len() < before {
                            debug!(
                                source,
                                symbol = %entry.symbol,
                                dropped = before - in_gap.len(),
                                "구간 밖 행 제외"
                            );
                        }
                        info!(source, symbol = %entry.symbol, rows = in_gap.len(), "수집 완료");
                        rows.extend(in_gap);
                    }
                    Err(RetryError::Cancelled) => {
                        warn!(source, symbol = %entry.symbol, "수집 취소");
                        partial.cancelled = true;
                        break 'symbols;
                    }
                    Err(error) => {
                        warn!(source, symbol = %entry.symbol, error = %error, "심볼 수집 실패");
                        partial.failures.push(SymbolFailure {
                            symbol: entry.symbol.clone(),
                            error,
                        });
                        // 같은 심볼의 나머지 구간은 건너뜀
                        continue 'symbols;
                    }
                }
            }
        }

        CollectOutcome {
            rows,
            failure: partial.into_option(),
        }
    }

    async fn fetch_gap(
        &self,
        cancel: &CancellationToken,
        entry: &WatchlistEntry,
        gap: &Gap,
    ) -> Result<Vec<DailyPrice>, FetchError> {
        self.executor
            .execute_rate_limited(cancel, &self.limiter, || {
                self.fetcher
                    .fetch_daily_prices(entry, gap.from_date(), gap.to_date())
            })
            .await
    }
}

/// 환율 수집기. 속도 제한 없이 통화쌍 구간마다 한 번 호출합니다.
pub struct FxCollector<F> {
    fetcher: F,
    executor: RetryExecutor,
}

impl<F: FxRateFetcher> FxCollector<F> {
    pub fn new(fetcher: F, retry: RetryConfig) -> Self {
        Self {
            fetcher,
            executor: RetryExecutor::new(retry),
        }
    }

    pub fn source(&self) -> &str {
        self.fetcher.source()
    }

    /// `base/target` 구간 수집. 구간이 없으면 빈 결과.
    pub async fn collect(
        &self,
        cancel: &CancellationToken,
        base: &str,
        target: &str,
        gaps: &[Gap],
    ) -> Result<Vec<FxRate>, FetchError> {
        let mut rates = Vec::new();
        for gap in gaps {
            let fetched = self
                .executor
                .execute(cancel, || {
                    self.fetcher
                        .fetch_rates(base, target, gap.from_date(), gap.to_date())
                })
                .await?;
            rates.extend(fetched.into_iter().filter(|r| gap.contains(r.date)));
        }

        info!(
            source = self.source(),
            pair = %FxRate::pair_name(base, target),
            rows = rates.len(),
            "환율 수집 완료"
        );
        Ok(rates)
    }
}
