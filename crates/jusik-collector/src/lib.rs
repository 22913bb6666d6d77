//! 일봉 가격 수집기.
//!
//! 이 crate는 스케줄러에서 실행되는 배치 수집기를 제공합니다:
//! - 제공자별 요청 속도 제한 (`RateLimiter`)
//! - 일시적 실패에 대한 지수 백오프 재시도 (`RetryExecutor`)
//! - 저장된 최근 날짜 기반 누락 구간 탐지 (`GapDetector`)
//! - 부분 실패를 허용하는 제공자별 수집 (`PriceCollector`, `FxCollector`)
//! - 제공자 이름별 실행과 결과 보고 (`SourceOrchestrator`, `CollectionResult`)

pub mod collector;
pub mod config;
pub mod error;
pub mod gap;
pub mod ratelimit;
pub mod result;
pub mod retry;
pub mod source;

pub use collector::{CollectOutcome, FxCollector, PriceCollector};
pub use config::{CollectorConfig, ProviderSettings};
pub use error::{Cancelled, CollectorError, FetchError, PartialFailure, Result, SymbolFailure};
pub use gap::GapDetector;
pub use ratelimit::RateLimiter;
pub use result::{aggregate_exit_code, log_overall, CollectionResult, RunStatus};
pub use retry::{RetryAction, RetryConfig, RetryError, RetryExecutor, RetryPolicy, Retryable};
pub use source::{Source, SourceOrchestrator};
