//! 가격 데이터 제공자 및 저장소.
//!
//! 이 crate는 다음을 제공합니다:
//! - 공통 HTTP 클라이언트 (`ApiClient`)
//! - Tiingo (미국), KIS (한국), Frankfurter (환율) 제공자
//! - 가격/환율 저장소 추상화 (`PriceStore`)와 PostgreSQL, 인메모리 구현

pub mod error;
pub mod provider;
pub mod storage;

pub use error::{DataError, DataResult, ProviderError, ProviderResult};
pub use provider::{
    ApiClient, DailyPriceFetcher, FrankfurterClient, FxRateFetcher, KisClient, KisTokenProvider,
    TiingoClient,
};
pub use storage::{DatabaseConfig, MemoryPriceStore, PgPriceRepository, PriceStore};
