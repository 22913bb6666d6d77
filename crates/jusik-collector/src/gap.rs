//! 수집 구간 탐지.
//!
//! 저장된 최근 날짜를 기준으로 심볼별 누락 구간을 계산합니다.
//! 거래일 달력은 사용하지 않으며, 휴장일에 대한 빈 응답은 정상입니다.

use crate::error::{CollectorError, Result};
use chrono::{Duration, NaiveDate, Utc};
use jusik_core::Gap;
use jusik_data::PriceStore;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// 저장된 데이터가 없을 때 거슬러 올라가는 일수.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 365;

/// 저장소 기반 구간 탐지기.
#[derive(Clone)]
pub struct GapDetector {
    store: Arc<dyn PriceStore>,
    lookback_days: i64,
    today: Option<NaiveDate>,
}

impl GapDetector {
    pub fn new(store: Arc<dyn PriceStore>) -> Self {
        Self {
            store,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            today: None,
        }
    }

    pub fn with_lookback_days(mut self, days: i64) -> Self {
        self.lookback_days = days.max(0);
        self
    }

    /// 기준일 고정 (테스트용). 지정하지 않으면 UTC 오늘 날짜.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }

    /// 최근 저장 날짜로부터 구간 계산.
    ///
    /// - 데이터 없음: `[today - lookback, today]`, 날짜 범위를 넘으면 표현 가능한 최소 날짜부터
    /// - 최근 날짜 D: `[D + 1, today]`, 비어 있으면 `None`
    pub fn gap_for(&self, symbol: &str, last: Option<NaiveDate>, today: NaiveDate) -> Option<Gap> {
        let from = match last {
            Some(date) => date.succ_opt()?,
            None => Duration::try_days(self.lookback_days)
                .and_then(|lookback| today.checked_sub_signed(lookback))
                .unwrap_or(NaiveDate::MIN),
        };
        Gap::new(symbol, from, today)
    }

    /// 제공자 기준 심볼별 구간 탐지.
    ///
    /// 최신 상태인 심볼은 결과에 없습니다. 저장소 조회 실패는 전체 실패입니다.
    pub async fn detect_gaps(
        &self,
        source: &str,
        symbols: &[String],
    ) -> Result<HashMap<String, Vec<Gap>>> {
        let last_dates = self
            .store
            .last_stored_dates(source, symbols)
            .await
            .map_err(CollectorError::GapDetection)?;

        let today = self.today();
        let mut gaps = HashMap::new();
        for symbol in symbols {
            let last = last_dates.get(symbol).copied();
            match self.gap_for(symbol, last, today) {
                Some(gap) => {
                    debug!(source, gap = %gap, "구간 발견");
                    gaps.insert(symbol.clone(), vec![gap]);
                }
                None => debug!(source, symbol = %symbol, "최신 상태"),
            }
        }

        Ok(gaps)
    }

    /// 통화쌍별 구간 탐지.
    pub async fn detect_fx_gaps(&self, pairs: &[String]) -> Result<HashMap<String, Vec<Gap>>> {
        let today = self.today();
        let mut gaps = HashMap::new();
        for pair in pairs {
            let last = self
                .store
                .last_fx_date(pair)
                .await
                .map_err(CollectorError::GapDetection)?;
            if let Some(gap) = self.gap_for(pair, last, today) {
                gaps.insert(pair.clone(), vec![gap]);
            }
        }
        Ok(gaps)
    }
}

impl std::fmt::Debug for GapDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GapDetector")
            .field("lookback_days", &self.lookback_days)
            .field("today", &self.today)
            .finish_non_exhaustive()
    }
}
