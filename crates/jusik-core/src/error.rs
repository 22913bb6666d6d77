//! 도메인 및 워치리스트 에러 타입.

use thiserror::Error;

/// 핵심 도메인 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 워치리스트 파일 읽기 실패
    #[error("워치리스트 읽기 실패: {0}")]
    Io(#[from] std::io::Error),

    /// 워치리스트 JSON 파싱 실패
    #[error("워치리스트 JSON 파싱 실패: {0}")]
    Json(#[from] serde_json::Error),

    /// 빈 워치리스트
    #[error("워치리스트가 비어 있습니다")]
    EmptyWatchlist,

    /// 항목 검증 실패
    #[error("워치리스트 항목 [{index}]: {source}")]
    InvalidEntry {
        index: usize,
        #[source]
        source: Box<CoreError>,
    },

    /// 심볼 누락
    #[error("symbol 필드가 필요합니다")]
    MissingSymbol,

    /// 같은 심볼이 두 번 이상 등장
    #[error("중복된 심볼 {0:?}")]
    DuplicateSymbol(String),

    /// 알 수 없는 시장
    #[error("알 수 없는 시장 {0:?} (허용: US, KR)")]
    InvalidMarket(String),

    /// 알 수 없는 증권 유형
    #[error("알 수 없는 증권 유형 {0:?} (허용: stock, etf)")]
    InvalidSecurityType(String),
}

/// 코어 작업 Result 타입.
pub type CoreResult<T> = Result<T, CoreError>;
