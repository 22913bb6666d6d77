//! KIS 국내주식 기간별 시세(일봉) 조회.

use super::auth::KisTokenProvider;
use super::parse::{next_end_date, parse_rows, ChartResponse};
use crate::error::{ProviderError, ProviderResult};
use crate::provider::http::ApiClient;
use crate::provider::DailyPriceFetcher;
use async_trait::async_trait;
use chrono::NaiveDate;
use jusik_core::validate::flag_anomalies;
use jusik_core::{DailyPrice, WatchlistEntry};
use tracing::debug;

/// 저장소에 기록되는 제공자 이름.
pub const SOURCE: &str = "kis";

/// 실전투자 API 주소.
pub const DEFAULT_BASE_URL: &str = "https://openapi.koreainvestment.com:9443";

const DAILY_CHART_PATH: &str = "/uapi/domestic-stock/v1/quotations/inquire-daily-itemchartprice";
const TR_ID_DAILY_CHART: &str = "FHKST03010100";

/// 한 심볼당 최대 조회 페이지 수.
const MAX_PAGES: usize = 10;

/// 초당 거래건수 초과 메시지 코드.
const MSG_CD_RATE_LIMITED: &str = "EGW00201";

/// KIS API 클라이언트.
///
/// 토큰 발급 요청에는 본문에, 시세 조회에는 헤더에 앱 키/시크릿이 들어갑니다.
#[derive(Debug)]
pub struct KisClient {
    http: ApiClient,
    token: KisTokenProvider,
}

impl KisClient {
    /// 새 클라이언트 생성.
    pub fn new(base_url: impl Into<String>, app_key: &str, app_secret: &str) -> ProviderResult<Self> {
        let base_url = base_url.into();
        let token = KisTokenProvider::new(base_url.clone(), app_key, app_secret)?;
        let http = ApiClient::new(base_url, &[("appkey", app_key), ("appsecret", app_secret)])?;
        Ok(Self { http, token })
    }

    /// `[from, to]` 구간 일봉을 모든 페이지에 걸쳐 조회 (날짜 오름차순).
    pub async fn fetch_all_pages(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ProviderResult<Vec<DailyPrice>> {
        let mut prices = Vec::new();
        let mut end = to;
        let mut has_more = true;

        for page in 0..MAX_PAGES {
            if !has_more {
                break;
            }

            let rows = self.fetch_page(symbol, from, end).await?;
            debug!(symbol, page, end = %end, rows = rows.len(), "KIS 페이지 조회");

            let next = next_end_date(&rows, from);
            prices.extend(rows);

            match next {
                // 같은 종료일이 반복되면 더 오래된 데이터가 없는 것
                Some(next_end) if next_end == end => has_more = false,
                Some(next_end) => end = next_end,
                None => has_more = false,
            }
        }

        if has_more {
            return Err(ProviderError::MaxPagesReached(symbol.to_string()));
        }

        prices.sort_by_key(|p| p.date);
        prices.dedup_by_key(|p| p.date);
        Ok(prices)
    }

    async fn fetch_page(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ProviderResult<Vec<DailyPrice>> {
        let token = self.token.token().await?;

        let query = [
            ("FID_COND_MRKT_DIV_CODE", "J".to_string()),
            ("FID_INPUT_ISCD", symbol.to_string()),
            ("FID_INPUT_DATE_1", from.format("%Y%m%d").to_string()),
            ("FID_INPUT_DATE_2", to.format("%Y%m%d").to_string()),
            ("FID_PERIOD_DIV_CODE", "D".to_string()),
            ("FID_ORG_ADJ_PRC", "0".to_string()),
        ];
        let headers = [
            ("authorization", token.auth_header()),
            ("tr_id", TR_ID_DAILY_CHART.to_string()),
        ];

        let body = self.http.get(DAILY_CHART_PATH, &query, &headers).await?;
        let response: ChartResponse = serde_json::from_slice(&body)?;

        if response.rt_cd != "0" {
            if response.msg_cd == MSG_CD_RATE_LIMITED {
                return Err(ProviderError::RateLimited(format!(
                    "{}: {}",
                    response.msg_cd, response.msg1
                )));
            }
            return Err(ProviderError::Api {
                code: response.msg_cd,
                message: format!("{} ({})", response.msg1, symbol),
            });
        }

        parse_rows(&response.output2, symbol)
    }
}

#[async_trait]
impl DailyPriceFetcher for KisClient {
    fn source(&self) -> &str {
        SOURCE
    }

    /// KIS는 분할/배당 정보를 주지 않으므로 변동폭만으로 이상치를 판단합니다.
    async fn fetch_daily_prices(
        &self,
        entry: &WatchlistEntry,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ProviderResult<Vec<DailyPrice>> {
        let mut prices = self.fetch_all_pages(&entry.symbol, from, to).await?;
        flag_anomalies(&mut prices, entry.market, entry.security_type, |_| false);
        Ok(prices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;
    use jusik_core::{Market, SecurityType};
    use mockito::{Matcher, Mock, ServerGuard};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn samsung() -> WatchlistEntry {
        WatchlistEntry::new("005930", Market::Kr, SecurityType::Stock, "삼성전자")
    }

    fn row_json(date: &str, close: u32) -> String {
        format!(
            r#"{{"stck_bsop_date": "{date}", "stck_oprc": "{close}", "stck_hgpr": "{close}",
                "stck_lwpr": "{close}", "stck_clpr": "{close}", "acml_vol": "1000"}}"#
        )
    }

    fn page_body(rows: &[String]) -> String {
        format!(
            r#"{{"rt_cd": "0", "msg_cd": "MCA00000", "msg1": "정상처리 되었습니다.",
                "output1": {{}}, "output2": [{}]}}"#,
            rows.join(",")
        )
    }

    async fn mock_token(server: &mut ServerGuard) -> Mock {
        server
            .mock("POST", "/oauth2/tokenP")
            .with_status(200)
            .with_body(r#"{"access_token": "tok", "expires_in": 86400}"#)
            .create_async()
            .await
    }

    async fn mock_page(server: &mut ServerGuard, end: &str, body: String) -> Mock {
        server
            .mock("GET", DAILY_CHART_PATH)
            .match_header("authorization", "Bearer tok")
            .match_header("appkey", "key")
            .match_header("appsecret", "secret")
            .match_header("tr_id", TR_ID_DAILY_CHART)
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("FID_INPUT_ISCD".into(), "005930".into()),
                Matcher::UrlEncoded("FID_INPUT_DATE_2".into(), end.into()),
            ]))
            .with_status(200)
            .with_body(body)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_paginates_until_from_date() {
        let mut server = mockito::Server::new_async().await;
        let token = mock_token(&mut server).await;
        let first = mock_page(
            &mut server,
            "20240110",
            page_body(&[row_json("20240110", 100), row_json("20240109", 101)]),
        )
        .await;
        let second = mock_page(
            &mut server,
            "20240108",
            page_body(&[row_json("20240108", 102), row_json("20240105", 103)]),
        )
        .await;

        let client = KisClient::new(server.url(), "key", "secret").unwrap();
        let prices = client
            .fetch_daily_prices(&samsung(), date(2024, 1, 5), date(2024, 1, 10))
            .await
            .unwrap();

        token.assert_async().await;
        first.assert_async().await;
        second.assert_async().await;

        let dates: Vec<NaiveDate> = prices.iter().map(|p| p.date).collect();
        assert_eq!(
            dates,
            vec![
                date(2024, 1, 5),
                date(2024, 1, 8),
                date(2024, 1, 9),
                date(2024, 1, 10)
            ]
        );
    }

    #[tokio::test]
    async fn test_max_pages_reached() {
        let mut server = mockito::Server::new_async().await;
        mock_token(&mut server).await;

        // 매 페이지가 종료일 하루치만 반환하도록 구성
        let mut end = date(2024, 1, 31);
        for _ in 0..MAX_PAGES {
            let key = end.format("%Y%m%d").to_string();
            mock_page(&mut server, &key, page_body(&[row_json(&key, 100)])).await;
            end = end.checked_sub_days(Days::new(1)).unwrap();
        }

        let client = KisClient::new(server.url(), "key", "secret").unwrap();
        let err = client
            .fetch_daily_prices(&samsung(), date(2024, 1, 1), date(2024, 1, 31))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::MaxPagesReached(ref s) if s == "005930"));
    }

    #[tokio::test]
    async fn test_api_error_code() {
        let mut server = mockito::Server::new_async().await;
        mock_token(&mut server).await;
        mock_page(
            &mut server,
            "20240110",
            r#"{"rt_cd": "1", "msg_cd": "OPSQ0002", "msg1": "없는 종목입니다."}"#.to_string(),
        )
        .await;

        let client = KisClient::new(server.url(), "key", "secret").unwrap();
        let err = client
            .fetch_daily_prices(&samsung(), date(2024, 1, 5), date(2024, 1, 10))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Api { ref code, .. } if code == "OPSQ0002"));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_transaction_limit_is_rate_limited() {
        let mut server = mockito::Server::new_async().await;
        mock_token(&mut server).await;
        mock_page(
            &mut server,
            "20240110",
            r#"{"rt_cd": "1", "msg_cd": "EGW00201", "msg1": "초당 거래건수를 초과하였습니다."}"#
                .to_string(),
        )
        .await;

        let client = KisClient::new(server.url(), "key", "secret").unwrap();
        let err = client
            .fetch_daily_prices(&samsung(), date(2024, 1, 5), date(2024, 1, 10))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::RateLimited(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_kr_anomaly_flagged() {
        let mut server = mockito::Server::new_async().await;
        mock_token(&mut server).await;
        mock_page(
            &mut server,
            "20240110",
            page_body(&[row_json("20240110", 140), row_json("20240109", 100)]),
        )
        .await;

        let client = KisClient::new(server.url(), "key", "secret").unwrap();
        let prices = client
            .fetch_daily_prices(&samsung(), date(2024, 1, 9), date(2024, 1, 10))
            .await
            .unwrap();

        assert!(!prices[0].is_anomaly);
        assert!(prices[1].is_anomaly);
    }
}
