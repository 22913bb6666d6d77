//! 일봉 가격 및 환율 레코드.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 하루치 OHLCV와 수정 종가.
///
/// 저장소 멱등성 키는 `(symbol, date, source)`입니다.
/// 가격은 회계 수치가 아니므로 f64로 보관합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPrice {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    pub volume: i64,
    /// 데이터 제공자 이름 (예: "tiingo", "kis")
    pub source: String,
    /// 전일 대비 변동폭이 임계값을 넘은 행
    pub is_anomaly: bool,
}

impl DailyPrice {
    /// 저장소 upsert 키.
    pub fn key(&self) -> (&str, NaiveDate, &str) {
        (&self.symbol, self.date, &self.source)
    }
}

/// 일별 환율 (예: USD/KRW).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FxRate {
    /// 통화쌍 (예: "USD/KRW")
    pub pair: String,
    pub date: NaiveDate,
    pub rate: f64,
    pub source: String,
}

impl FxRate {
    /// 기준/대상 통화로 통화쌍 이름 생성.
    pub fn pair_name(base: &str, target: &str) -> String {
        format!("{}/{}", base, target)
    }
}
