//! 인메모리 저장소.
//!
//! PostgreSQL 저장소와 같은 키 규칙을 따르며, 조회/쓰기 실패를 주입할 수 있습니다.

use super::PriceStore;
use crate::error::{DataError, DataResult};
use async_trait::async_trait;
use chrono::NaiveDate;
use jusik_core::{DailyPrice, FxRate};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

type PriceKey = (String, NaiveDate, String);
type FxKey = (String, NaiveDate);

/// 인메모리 가격/환율 저장소.
#[derive(Debug, Default)]
pub struct MemoryPriceStore {
    prices: RwLock<BTreeMap<PriceKey, DailyPrice>>,
    fx_rates: RwLock<BTreeMap<FxKey, FxRate>>,
    fail_queries: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryPriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 이후 날짜 조회가 실패하도록 설정.
    pub fn set_fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// 이후 upsert가 실패하도록 설정.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// 저장된 가격 전체 (키 순서).
    pub async fn prices(&self) -> Vec<DailyPrice> {
        self.prices.read().await.values().cloned().collect()
    }

    /// 저장된 환율 전체 (키 순서).
    pub async fn fx_rates(&self) -> Vec<FxRate> {
        self.fx_rates.read().await.values().cloned().collect()
    }

    fn check_query(&self) -> DataResult<()> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(DataError::QueryError("injected query failure".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> DataResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DataError::InsertError("injected write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PriceStore for MemoryPriceStore {
    async fn last_stored_date(&self, symbol: &str, source: &str) -> DataResult<Option<NaiveDate>> {
        self.check_query()?;
        let prices = self.prices.read().await;
        Ok(prices
            .keys()
            .filter(|(s, _, src)| s == symbol && src == source)
            .map(|(_, date, _)| *date)
            .max())
    }

    async fn upsert_prices(&self, rows: &[DailyPrice]) -> DataResult<u64> {
        self.check_write()?;
        let mut prices = self.prices.write().await;
        for row in rows {
            let key = (row.symbol.clone(), row.date, row.source.clone());
            prices.insert(key, row.clone());
        }
        Ok(rows.len() as u64)
    }

    async fn last_fx_date(&self, pair: &str) -> DataResult<Option<NaiveDate>> {
        self.check_query()?;
        let rates = self.fx_rates.read().await;
        Ok(rates
            .keys()
            .filter(|(p, _)| p == pair)
            .map(|(_, date)| *date)
            .max())
    }

    async fn upsert_fx_rates(&self, rates: &[FxRate]) -> DataResult<u64> {
        self.check_write()?;
        let mut stored = self.fx_rates.write().await;
        for rate in rates {
            stored.insert((rate.pair.clone(), rate.date), rate.clone());
        }
        Ok(rates.len() as u64)
    }
}
