//! # Jusik Core
//!
//! 가격 수집기의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 수집 파이프라인 전반에서 사용되는 기본 타입을 제공합니다:
//! - 워치리스트 항목 및 시장/증권 유형 정의
//! - 일봉 가격 및 환율 레코드
//! - 수집 구간 (Gap)
//! - 가격 이상치 검증
//! - 로깅 인프라

pub mod domain;
pub mod error;
pub mod logging;
pub mod validate;
pub mod watchlist;

pub use domain::*;
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, init_logging_from_env, LogConfig, LogFormat};
pub use watchlist::{filter_by_market, load_watchlist, parse_watchlist};
