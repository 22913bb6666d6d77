//! Tiingo 일봉 API 클라이언트 (미국 시장).
//!
//! `GET /tiingo/daily/{symbol}/prices?startDate=YYYY-MM-DD&endDate=YYYY-MM-DD`
//!
//! Tiingo는 요청 한도를 넘으면 HTTP 200과 함께 JSON이 아닌 본문을 반환하므로
//! 본문이 `[`로 시작하지 않으면 `RateLimited`로 분류합니다.

use super::http::ApiClient;
use super::DailyPriceFetcher;
use crate::error::{ProviderError, ProviderResult};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use jusik_core::validate::{cross_validate_adj_close, flag_anomalies};
use jusik_core::{DailyPrice, WatchlistEntry};
use serde::Deserialize;
use tracing::debug;

/// 저장소에 기록되는 제공자 이름.
pub const SOURCE: &str = "tiingo";

/// 운영 API 주소.
pub const DEFAULT_BASE_URL: &str = "https://api.tiingo.com";

/// Tiingo 일봉 응답 행.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TiingoPrice {
    date: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    adj_close: f64,
    /// 정수 거래량도 실수로 직렬화되는 경우가 있음
    volume: f64,
    #[serde(default)]
    div_cash: f64,
    #[serde(default = "default_split_factor")]
    split_factor: f64,
}

fn default_split_factor() -> f64 {
    1.0
}

/// Tiingo API 클라이언트.
#[derive(Debug, Clone)]
pub struct TiingoClient {
    http: ApiClient,
}

impl TiingoClient {
    /// 새 클라이언트 생성. `Authorization: Token <key>` 헤더를 설정합니다.
    pub fn new(base_url: impl Into<String>, api_key: &str) -> ProviderResult<Self> {
        let auth = format!("Token {}", api_key);
        let http = ApiClient::new(base_url, &[("Authorization", auth.as_str())])?;
        Ok(Self { http })
    }

    async fn fetch_raw(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ProviderResult<Vec<TiingoPrice>> {
        let path = format!("/tiingo/daily/{}/prices", symbol);
        let query = [
            ("startDate", from.format("%Y-%m-%d").to_string()),
            ("endDate", to.format("%Y-%m-%d").to_string()),
        ];

        let body = self.http.get(&path, &query, &[]).await.map_err(|e| match e {
            ProviderError::Http { status: 404, .. } => {
                ProviderError::TickerNotFound(symbol.to_string())
            }
            other => other,
        })?;

        let starts_with_array = body
            .iter()
            .find(|b| !b.is_ascii_whitespace())
            .is_some_and(|b| *b == b'[');
        if !starts_with_array {
            return Err(ProviderError::RateLimited(format!(
                "symbol {}: unexpected response body",
                symbol
            )));
        }

        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl DailyPriceFetcher for TiingoClient {
    fn source(&self) -> &str {
        SOURCE
    }

    async fn fetch_daily_prices(
        &self,
        entry: &WatchlistEntry,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ProviderResult<Vec<DailyPrice>> {
        let raw = self.fetch_raw(&entry.symbol, from, to).await?;
        debug!(symbol = %entry.symbol, rows = raw.len(), "Tiingo 응답 수신");
        mark_anomalies(&raw, entry)
    }
}

/// 원본 행을 도메인 가격으로 변환하고 이상치를 표시.
///
/// 분할/배당 정보는 Tiingo 응답에만 있으므로 변환 전에 교차 검증합니다.
fn mark_anomalies(raw: &[TiingoPrice], entry: &WatchlistEntry) -> ProviderResult<Vec<DailyPrice>> {
    let mut prices = raw
        .iter()
        .enumerate()
        .map(|(i, r)| {
            to_daily_price(r, &entry.symbol)
                .map_err(|e| ProviderError::Parse(format!("row {}: {}", i, e)))
        })
        .collect::<ProviderResult<Vec<_>>>()?;

    flag_anomalies(&mut prices, entry.market, entry.security_type, |i| {
        !cross_validate_adj_close(raw[i].split_factor, raw[i].div_cash)
    });

    Ok(prices)
}

fn to_daily_price(r: &TiingoPrice, symbol: &str) -> ProviderResult<DailyPrice> {
    Ok(DailyPrice {
        symbol: symbol.to_string(),
        date: parse_tiingo_date(&r.date)?,
        open: r.open,
        high: r.high,
        low: r.low,
        close: r.close,
        adj_close: r.adj_close,
        volume: r.volume as i64,
        source: SOURCE.to_string(),
        is_anomaly: false,
    })
}

/// RFC 3339 (소수 초 포함/미포함) 또는 `YYYY-MM-DD` 날짜 파싱.
fn parse_tiingo_date(s: &str) -> ProviderResult<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.date_naive());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| ProviderError::Parse(format!("date {:?}: {}", s, e)))
}
