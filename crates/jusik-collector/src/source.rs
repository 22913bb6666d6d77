//! 제공자 이름별 수집 실행.
//!
//! 한 제공자 실행은 다음 순서로 진행됩니다:
//! 1. 제공자 이름 확인 (알 수 없으면 네트워크 호출 없이 실패)
//! 2. 인증 정보 확인
//! 3. 워치리스트 시장 필터 (비어 있으면 성공)
//! 4. 구간 탐지 (저장소 조회 실패는 전체 실패)
//! 5. 수집 후 저장 (부분 실패여도 모은 행은 저장)

use crate::collector::{CollectOutcome, FxCollector, PriceCollector};
use crate::config::{CollectorConfig, ProviderSettings};
use crate::error::CollectorError;
use crate::gap::GapDetector;
use crate::ratelimit::RateLimiter;
use crate::result::CollectionResult;
use crate::retry::RetryError;
use chrono::NaiveDate;
use futures::future::join_all;
use jusik_core::{filter_by_market, DailyPrice, FxRate, Market, WatchlistEntry};
use jusik_data::{
    DailyPriceFetcher, FrankfurterClient, KisClient, PriceStore, ProviderError, TiingoClient,
};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 환율 기준 통화
pub const FX_BASE: &str = "USD";
/// 환율 대상 통화
pub const FX_TARGET: &str = "KRW";

/// 수집 대상 제공자.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// 미국 시장 (Tiingo)
    Tiingo,
    /// 한국 시장 (한국투자증권)
    Kis,
    /// USD/KRW 환율 (Frankfurter)
    Fx,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Tiingo, Source::Kis, Source::Fx];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Tiingo => "tiingo",
            Source::Kis => "kis",
            Source::Fx => "fx",
        }
    }

    /// 워치리스트 필터 기준 시장. 환율은 워치리스트를 쓰지 않습니다.
    pub fn market(&self) -> Option<Market> {
        match self {
            Source::Tiingo => Some(Market::Us),
            Source::Kis => Some(Market::Kr),
            Source::Fx => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = CollectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tiingo" => Ok(Source::Tiingo),
            "kis" => Ok(Source::Kis),
            "fx" => Ok(Source::Fx),
            other => Err(CollectorError::UnknownSource(other.to_string())),
        }
    }
}

/// 제공자별 수집 실행기.
///
/// 제공자 실행끼리 공유하는 것은 저장소뿐이며,
/// limiter와 클라이언트는 실행마다 새로 만듭니다.
pub struct SourceOrchestrator {
    config: CollectorConfig,
    store: Arc<dyn PriceStore>,
    watchlist: Vec<WatchlistEntry>,
    today: Option<NaiveDate>,
}

impl SourceOrchestrator {
    pub fn new(
        config: CollectorConfig,
        store: Arc<dyn PriceStore>,
        watchlist: Vec<WatchlistEntry>,
    ) -> Self {
        Self {
            config,
            store,
            watchlist,
            today: None,
        }
    }

    /// 구간 계산 기준일 고정 (테스트용).
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// 여러 제공자를 동시에 실행. 결과는 요청 순서를 따릅니다.
    pub async fn collect_many(
        &self,
        cancel: &CancellationToken,
        names: &[&str],
    ) -> Vec<CollectionResult> {
        join_all(names.iter().map(|name| self.collect(cancel, name))).await
    }

    /// 제공자 하나 실행.
    pub async fn collect(&self, cancel: &CancellationToken, name: &str) -> CollectionResult {
        let started = Instant::now();

        let mut result = match name.parse::<Source>() {
            Ok(Source::Tiingo) => self.collect_tiingo(cancel).await,
            Ok(Source::Kis) => self.collect_kis(cancel).await,
            Ok(Source::Fx) => self.collect_fx(cancel).await,
            Err(e) => CollectionResult::failed(name, e, Duration::ZERO),
        };

        result.elapsed = started.elapsed();
        result
    }

    async fn collect_tiingo(&self, cancel: &CancellationToken) -> CollectionResult {
        let source = Source::Tiingo;
        let Some(api_key) = self.config.tiingo_api_key.as_deref() else {
            return missing_credential(source, "TIINGO_API_KEY");
        };

        let entries = self.entries_for(source);
        if entries.is_empty() {
            info!(provider = %source, "해당 시장의 워치리스트 항목 없음");
            return empty(source);
        }

        let settings = &self.config.tiingo;
        self.collect_prices(cancel, source, entries, settings, || {
            TiingoClient::new(settings.base_url.as_str(), api_key)
        })
        .await
    }

    async fn collect_kis(&self, cancel: &CancellationToken) -> CollectionResult {
        let source = Source::Kis;
        let Some(app_key) = self.config.kis_app_key.as_deref() else {
            return missing_credential(source, "KIS_APP_KEY");
        };
        let Some(app_secret) = self.config.kis_app_secret.as_deref() else {
            return missing_credential(source, "KIS_APP_SECRET");
        };

        let entries = self.entries_for(source);
        if entries.is_empty() {
            info!(provider = %source, "해당 시장의 워치리스트 항목 없음");
            return empty(source);
        }

        let settings = &self.config.kis;
        self.collect_prices(cancel, source, entries, settings, || {
            KisClient::new(settings.base_url.as_str(), app_key, app_secret)
        })
        .await
    }

    async fn collect_prices<F, B>(
        &self,
        cancel: &CancellationToken,
        source: Source,
        entries: Vec<WatchlistEntry>,
        settings: &ProviderSettings,
        build_client: B,
    ) -> CollectionResult
    where
        F: DailyPriceFetcher,
        B: FnOnce() -> Result<F, ProviderError>,
    {
        let fetcher = match build_client() {
            Ok(fetcher) => fetcher,
            Err(e) => return failed(source, CollectorError::Config(e.to_string())),
        };

        let symbols: Vec<String> = entries.iter().map(|e| e.symbol.clone()).collect();
        let gaps = match self
            .gap_detector()
            .detect_gaps(fetcher.source(), &symbols)
            .await
        {
            Ok(gaps) => gaps,
            Err(e) => return failed(source, e),
        };
        if gaps.is_empty() {
            info!(provider = %source, symbols = symbols.len(), "모든 심볼 최신 상태");
            return empty(source);
        }

        info!(
            provider = %source,
            symbols = symbols.len(),
            gaps = gaps.len(),
            "수집 시작"
        );

        let limiter = RateLimiter::new(settings.request_interval);
        let collector = PriceCollector::new(fetcher, limiter, settings.retry);
        let CollectOutcome { rows, failure } = collector.collect_all(cancel, &entries, &gaps).await;

        let collect_error = failure.map(|partial| {
            if partial.failures.is_empty() && partial.cancelled {
                CollectorError::Cancelled
            } else {
                CollectorError::Partial(partial)
            }
        });

        let (rows_written, store_error) = self
            .persist_prices(source, &rows, collect_error.is_some())
            .await;

        CollectionResult {
            provider: source.as_str().to_string(),
            rows,
            fx_rates: Vec::new(),
            rows_written,
            error: CollectorError::join(collect_error, store_error),
            elapsed: Duration::ZERO,
        }
    }

    async fn collect_fx(&self, cancel: &CancellationToken) -> CollectionResult {
        let source = Source::Fx;
        let pair = FxRate::pair_name(FX_BASE, FX_TARGET);

        let gaps = match self.gap_detector().detect_fx_gaps(&[pair.clone()]).await {
            Ok(mut gaps) => gaps.remove(&pair).unwrap_or_default(),
            Err(e) => return failed(source, e),
        };
        if gaps.is_empty() {
            info!(provider = %source, pair = %pair, "환율 최신 상태");
            return empty(source);
        }

        let settings = &self.config.fx;
        let client = match FrankfurterClient::new(settings.base_url.as_str()) {
            Ok(client) => client,
            Err(e) => return failed(source, CollectorError::Config(e.to_string())),
        };
        let collector = FxCollector::new(client, settings.retry);

        let fx_rates = match collector.collect(cancel, FX_BASE, FX_TARGET, &gaps).await {
            Ok(rates) => rates,
            Err(RetryError::Cancelled) => return failed(source, CollectorError::Cancelled),
            Err(e) => return failed(source, CollectorError::Fetch(e)),
        };

        let (rows_written, error) = if fx_rates.is_empty() {
            (0, None)
        } else {
            match self.store.upsert_fx_rates(&fx_rates).await {
                Ok(written) => (written, None),
                Err(e) => (0, Some(CollectorError::Storage(e))),
            }
        };

        CollectionResult {
            provider: source.as_str().to_string(),
            rows: Vec::new(),
            fx_rates,
            rows_written,
            error,
            elapsed: Duration::ZERO,
        }
    }

    /// 모은 행 저장. 부분 실패여도 저장합니다.
    async fn persist_prices(
        &self,
        source: Source,
        rows: &[DailyPrice],
        partial: bool,
    ) -> (u64, Option<CollectorError>) {
        if rows.is_empty() {
            return (0, None);
        }
        if partial {
            warn!(provider = %source, rows = rows.len(), "부분 결과 저장");
        }

        match self.store.upsert_prices(rows).await {
            Ok(written) => (written, None),
            Err(e) => (0, Some(CollectorError::Storage(e))),
        }
    }

    fn entries_for(&self, source: Source) -> Vec<WatchlistEntry> {
        source
            .market()
            .map(|market| filter_by_market(&self.watchlist, market))
            .unwrap_or_default()
    }

    fn gap_detector(&self) -> GapDetector {
        let detector = GapDetector::new(self.store.clone())
            .with_lookback_days(self.config.lookback_days);
        match self.today {
            Some(today) => detector.with_today(today),
            None => detector,
        }
    }
}

fn empty(source: Source) -> CollectionResult {
    CollectionResult {
        provider: source.as_str().to_string(),
        rows: Vec::new(),
        fx_rates: Vec::new(),
        rows_written: 0,
        error: None,
        elapsed: Duration::ZERO,
    }
}

fn failed(source: Source, error: CollectorError) -> CollectionResult {
    CollectionResult::failed(source.as_str(), error, Duration::ZERO)
}

fn missing_credential(source: Source, key: &str) -> CollectionResult {
    failed(source, CollectorError::MissingCredential(key.to_string()))
}
