//! KIS 일봉 응답 파싱.
//!
//! KIS API는 모든 숫자를 문자열로 반환하며, 데이터가 없는 날은
//! 빈 문자열 또는 `"0"` 날짜의 행으로 채워집니다.

use super::client::SOURCE;
use crate::error::{ProviderError, ProviderResult};
use chrono::{Days, NaiveDate};
use jusik_core::DailyPrice;
use serde::Deserialize;

/// 일봉 조회 응답.
#[derive(Debug, Deserialize)]
pub(crate) struct ChartResponse {
    pub rt_cd: String,
    #[serde(default)]
    pub msg_cd: String,
    #[serde(default)]
    pub msg1: String,
    #[serde(default)]
    pub output2: Vec<OutputRow>,
}

/// `output2`의 일봉 행.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct OutputRow {
    pub stck_bsop_date: String,
    pub stck_oprc: String,
    pub stck_hgpr: String,
    pub stck_lwpr: String,
    pub stck_clpr: String,
    pub acml_vol: String,
}

fn parse_f64(field: &str, s: &str) -> ProviderResult<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Ok(0.0);
    }
    trimmed
        .parse()
        .map_err(|e| ProviderError::Parse(format!("{} {:?}: {}", field, s, e)))
}

fn parse_i64(field: &str, s: &str) -> ProviderResult<i64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    trimmed
        .parse()
        .map_err(|e| ProviderError::Parse(format!("{} {:?}: {}", field, s, e)))
}

/// 행을 도메인 가격으로 변환. 빈 행이면 `None`.
///
/// `FID_ORG_ADJ_PRC=0`은 분할만 반영된 가격을 돌려주므로 수정 종가는 종가와 같습니다.
pub(crate) fn to_daily_price(row: &OutputRow, symbol: &str) -> ProviderResult<Option<DailyPrice>> {
    let raw_date = row.stck_bsop_date.trim();
    if raw_date.is_empty() || raw_date == "0" {
        return Ok(None);
    }

    let date = NaiveDate::parse_from_str(raw_date, "%Y%m%d")
        .map_err(|e| ProviderError::Parse(format!("date {:?}: {}", raw_date, e)))?;
    let close = parse_f64("close", &row.stck_clpr)?;

    Ok(Some(DailyPrice {
        symbol: symbol.to_string(),
        date,
        open: parse_f64("open", &row.stck_oprc)?,
        high: parse_f64("high", &row.stck_hgpr)?,
        low: parse_f64("low", &row.stck_lwpr)?,
        close,
        adj_close: close,
        volume: parse_i64("volume", &row.acml_vol)?,
        source: SOURCE.to_string(),
        is_anomaly: false,
    }))
}

/// 응답 행 전체 변환. 빈 행은 건너뜁니다.
pub(crate) fn parse_rows(rows: &[OutputRow], symbol: &str) -> ProviderResult<Vec<DailyPrice>> {
    let mut prices = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        match to_daily_price(row, symbol) {
            Ok(Some(price)) => prices.push(price),
            Ok(None) => {}
            Err(e) => return Err(ProviderError::Parse(format!("row {}: {}", i, e))),
        }
    }
    Ok(prices)
}

/// 다음 페이지 종료일 계산.
///
/// KIS는 최신순으로 반환하므로 가장 오래된 날짜가 아직 `from` 이후면
/// 그 전날을 다음 페이지 종료일로 사용합니다. 더 조회할 필요가 없으면 `None`.
pub(crate) fn next_end_date(prices: &[DailyPrice], from: NaiveDate) -> Option<NaiveDate> {
    let oldest = prices.iter().map(|p| p.date).min()?;
    if oldest > from {
        oldest.checked_sub_days(Days::new(1))
    } else {
        None
    }
}
