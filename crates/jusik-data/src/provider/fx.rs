//! Frankfurter 환율 API 클라이언트.
//!
//! `GET /v1/{from}..{to}?from=USD&to=KRW`. 인증과 요청 한도가 없습니다.

use super::http::ApiClient;
use super::FxRateFetcher;
use crate::error::{ProviderError, ProviderResult};
use async_trait::async_trait;
use chrono::NaiveDate;
use jusik_core::FxRate;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

/// 저장소에 기록되는 제공자 이름.
pub const SOURCE: &str = "frankfurter";

/// 운영 API 주소.
pub const DEFAULT_BASE_URL: &str = "https://api.frankfurter.dev";

#[derive(Debug, Deserialize)]
struct FrankfurterResponse {
    #[serde(default)]
    rates: BTreeMap<String, HashMap<String, f64>>,
}

/// Frankfurter API 클라이언트.
#[derive(Debug, Clone)]
pub struct FrankfurterClient {
    http: ApiClient,
}

impl FrankfurterClient {
    pub fn new(base_url: impl Into<String>) -> ProviderResult<Self> {
        Ok(Self {
            http: ApiClient::new(base_url, &[])?,
        })
    }
}

#[async_trait]
impl FxRateFetcher for FrankfurterClient {
    fn source(&self) -> &str {
        SOURCE
    }

    async fn fetch_rates(
        &self,
        base: &str,
        target: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ProviderResult<Vec<FxRate>> {
        let path = format!("/v1/{}..{}", from.format("%Y-%m-%d"), to.format("%Y-%m-%d"));
        let query = [("from", base.to_string()), ("to", target.to_string())];

        let body = self.http.get(&path, &query, &[]).await?;
        let response: FrankfurterResponse = serde_json::from_slice(&body)?;
        parse_rates(response, base, target)
    }
}

fn parse_rates(
    response: FrankfurterResponse,
    base: &str,
    target: &str,
) -> ProviderResult<Vec<FxRate>> {
    let pair = FxRate::pair_name(base, target);
    let mut rates = Vec::with_capacity(response.rates.len());

    for (day, currencies) in response.rates {
        let rate = currencies.get(target).copied().ok_or_else(|| {
            ProviderError::Parse(format!("target currency {} missing for {}", target, day))
        })?;
        let date = NaiveDate::parse_from_str(&day, "%Y-%m-%d")
            .map_err(|e| ProviderError::Parse(format!("date {:?}: {}", day, e)))?;

        rates.push(FxRate {
            pair: pair.clone(),
            date,
            rate,
            source: SOURCE.to_string(),
        });
    }

    rates.sort_by_key(|r| r.date);
    Ok(rates)
}
