//! 데이터 제공자 클라이언트.
//!
//! 각 제공자는 하나의 base URL, 인증 헤더, 응답 스키마에 묶인 얇은 HTTP 클라이언트입니다.
//! 속도 제한과 재시도는 호출하는 쪽(수집기)이 담당합니다.

pub mod fx;
pub mod http;
pub mod kis;
pub mod tiingo;

pub use fx::FrankfurterClient;
pub use http::ApiClient;
pub use kis::{KisClient, KisTokenProvider};
pub use tiingo::TiingoClient;

use crate::error::ProviderResult;
use async_trait::async_trait;
use chrono::NaiveDate;
use jusik_core::{DailyPrice, FxRate, WatchlistEntry};

/// 일봉 가격 제공자.
///
/// 반환되는 행은 날짜 오름차순이며 제공자별 이상치 검증이 끝난 상태입니다.
#[async_trait]
pub trait DailyPriceFetcher: Send + Sync {
    /// 저장소에 기록되는 제공자 이름 (예: "tiingo").
    fn source(&self) -> &str;

    /// `[from, to]` 구간(양 끝 포함)의 일봉 조회.
    async fn fetch_daily_prices(
        &self,
        entry: &WatchlistEntry,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ProviderResult<Vec<DailyPrice>>;
}

/// 일별 환율 제공자.
#[async_trait]
pub trait FxRateFetcher: Send + Sync {
    fn source(&self) -> &str;

    /// `[from, to]` 구간의 `base/target` 환율 조회 (날짜 오름차순).
    async fn fetch_rates(
        &self,
        base: &str,
        target: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ProviderResult<Vec<FxRate>>;
}
