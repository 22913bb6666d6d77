//! 가격 이상치 검증.
//!
//! 시장/유형별 임계값:
//! - KR: 30% (KRX 일일 가격제한폭)
//! - US ETF: 15%
//! - US 주식: 50%

use crate::domain::{DailyPrice, Market, SecurityType};
use tracing::warn;

/// 한국 시장 임계값
pub const THRESHOLD_KR: f64 = 0.30;
/// 미국 ETF 임계값
pub const THRESHOLD_US_ETF: f64 = 0.15;
/// 미국 개별 주식 임계값
pub const THRESHOLD_US_STOCK: f64 = 0.50;

/// 시장/유형에 맞는 임계값 반환.
pub fn threshold(market: Market, security_type: SecurityType) -> f64 {
    match (market, security_type) {
        (Market::Kr, _) => THRESHOLD_KR,
        (Market::Us, SecurityType::Etf) => THRESHOLD_US_ETF,
        (Market::Us, SecurityType::Stock) => THRESHOLD_US_STOCK,
    }
}

/// 연속 거래일 수정 종가 변동률이 임계값을 넘는지 확인.
///
/// 이전 값이 0이면 (첫 데이터) 이상치가 아닙니다.
pub fn is_price_anomaly(
    current: f64,
    previous: f64,
    market: Market,
    security_type: SecurityType,
) -> bool {
    if previous == 0.0 {
        return false;
    }
    let change = (current - previous).abs() / previous;
    change > threshold(market, security_type)
}

/// 기업 행위(분할/배당)로 설명되지 않는 변동인지 확인.
///
/// `true`면 이상치 확정, `false`면 분할 또는 배당이 변동을 설명합니다.
pub fn cross_validate_adj_close(split_factor: f64, div_cash: f64) -> bool {
    let is_split = split_factor != 1.0 && split_factor != 0.0;
    let is_dividend = div_cash > 0.0;
    !is_split && !is_dividend
}

/// 날짜순 정렬된 가격에 이상치 플래그 설정.
///
/// `explained(i)`가 `true`를 반환하는 행은 기업 행위로 설명된 것으로 보고
/// 플래그를 세우지 않습니다. 플래그된 행 수를 반환합니다.
pub fn flag_anomalies<F>(
    prices: &mut [DailyPrice],
    market: Market,
    security_type: SecurityType,
    explained: F,
) -> usize
where
    F: Fn(usize) -> bool,
{
    let mut flagged = 0;
    for i in 1..prices.len() {
        let previous = prices[i - 1].adj_close;
        let current = prices[i].adj_close;
        if is_price_anomaly(current, previous, market, security_type) && !explained(i) {
            let row = &mut prices[i];
            row.is_anomaly = true;
            flagged += 1;
            warn!(
                symbol = %row.symbol,
                date = %row.date,
                change_pct = format!("{:.1}%", (current - previous) / previous * 100.0),
                "이상치 감지"
            );
        }
    }
    flagged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(day: u32, adj_close: f64) -> DailyPrice {
        DailyPrice {
            symbol: "TEST".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: adj_close,
            high: adj_close,
            low: adj_close,
            close: adj_close,
            adj_close,
            volume: 100,
            source: "test".to_string(),
            is_anomaly: false,
        }
    }

    #[test]
    fn test_thresholds_by_market_and_type() {
        // KR 30%
        assert!(!is_price_anomaly(129.0, 100.0, Market::Kr, SecurityType::Stock));
        assert!(is_price_anomaly(131.0, 100.0, Market::Kr, SecurityType::Etf));
        // US ETF 15%
        assert!(is_price_anomaly(84.0, 100.0, Market::Us, SecurityType::Etf));
        assert!(!is_price_anomaly(90.0, 100.0, Market::Us, SecurityType::Etf));
        // US 주식 50%
        assert!(!is_price_anomaly(140.0, 100.0, Market::Us, SecurityType::Stock));
        assert!(is_price_anomaly(160.0, 100.0, Market::Us, SecurityType::Stock));
    }

    #[test]
    fn test_zero_previous_is_not_anomaly() {
        assert!(!is_price_anomaly(100.0, 0.0, Market::Us, SecurityType::Etf));
    }

    #[test]
    fn test_cross_validation() {
        assert!(cross_validate_adj_close(1.0, 0.0));
        assert!(cross_validate_adj_close(0.0, 0.0));
        assert!(!cross_validate_adj_close(2.0, 0.0));
        assert!(!cross_validate_adj_close(1.0, 0.5));
    }

    #[test]
    fn test_flag_anomalies_respects_explanation() {
        let mut prices = vec![row(2, 100.0), row(3, 200.0), row(4, 100.0)];
        let flagged = flag_anomalies(&mut prices, Market::Us, SecurityType::Etf, |i| i == 2);

        assert_eq!(flagged, 1);
        assert!(!prices[0].is_anomaly);
        assert!(prices[1].is_anomaly);
        assert!(!prices[2].is_anomaly);
    }
}
