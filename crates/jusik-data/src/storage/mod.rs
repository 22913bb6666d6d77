//! 가격/환율 저장소.
//!
//! 수집 엔진은 `PriceStore` 트레이트만 사용하며, 구현은 다음과 같습니다:
//! - `PgPriceRepository`: PostgreSQL (`price_history`, `fx_rate` 테이블)
//! - `MemoryPriceStore`: 테스트 및 dry-run용 인메모리 저장소

pub mod memory;
pub mod postgres;

pub use memory::MemoryPriceStore;
pub use postgres::{DatabaseConfig, PgPriceRepository};

use crate::error::DataResult;
use async_trait::async_trait;
use chrono::NaiveDate;
use jusik_core::{DailyPrice, FxRate};
use std::collections::HashMap;

/// 수집 결과 저장소.
///
/// 가격의 멱등성 키는 `(symbol, date, source)`, 환율은 `(pair, date)`입니다.
/// 이미 저장된 키로 다시 upsert해도 행이 늘어나지 않습니다.
#[async_trait]
pub trait PriceStore: Send + Sync {
    /// 해당 제공자 기준 심볼의 가장 최근 저장 날짜.
    async fn last_stored_date(&self, symbol: &str, source: &str) -> DataResult<Option<NaiveDate>>;

    /// 여러 심볼의 최근 저장 날짜. 데이터가 없는 심볼은 결과에 없습니다.
    async fn last_stored_dates(
        &self,
        source: &str,
        symbols: &[String],
    ) -> DataResult<HashMap<String, NaiveDate>> {
        let mut dates = HashMap::with_capacity(symbols.len());
        for symbol in symbols {
            if let Some(date) = self.last_stored_date(symbol, source).await? {
                dates.insert(symbol.clone(), date);
            }
        }
        Ok(dates)
    }

    /// 가격 upsert. 기록된 행 수를 반환합니다.
    async fn upsert_prices(&self, rows: &[DailyPrice]) -> DataResult<u64>;

    /// 통화쌍의 가장 최근 저장 날짜.
    async fn last_fx_date(&self, pair: &str) -> DataResult<Option<NaiveDate>>;

    /// 환율 upsert. 기록된 행 수를 반환합니다.
    async fn upsert_fx_rates(&self, rates: &[FxRate]) -> DataResult<u64>;
}
