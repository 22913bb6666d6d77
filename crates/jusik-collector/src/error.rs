//! 에러 타입 정의.

use crate::retry::RetryError;
use jusik_core::CoreError;
use jusik_data::{DataError, ProviderError};
use std::fmt;
use thiserror::Error;

/// 작업 취소 (Ctrl-C 또는 전체 수집 제한 시간 초과).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// 재시도를 거친 제공자 호출 에러.
pub type FetchError = RetryError<ProviderError>;

/// 심볼 하나의 수집 실패.
#[derive(Debug)]
pub struct SymbolFailure {
    pub symbol: String,
    pub error: FetchError,
}

impl fmt::Display for SymbolFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.symbol, self.error)
    }
}

/// 부분 실패 집계.
///
/// 실패한 심볼들과 실행 도중 취소 여부를 담습니다.
/// 성공한 심볼의 행은 이 에러와 함께 호출자에게 전달됩니다.
#[derive(Debug, Default)]
pub struct PartialFailure {
    pub failures: Vec<SymbolFailure>,
    pub cancelled: bool,
}

impl PartialFailure {
    /// 실패도 취소도 없으면 `None`.
    pub fn into_option(self) -> Option<Self> {
        if self.failures.is_empty() && !self.cancelled {
            None
        } else {
            Some(self)
        }
    }

    /// 실패한 심볼 목록 (수집 순서).
    pub fn failed_symbols(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.symbol.as_str()).collect()
    }
}

impl fmt::Display for PartialFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.failures.is_empty() {
            write!(f, "{} symbol(s) failed: ", self.failures.len())?;
            for (i, failure) in self.failures.iter().enumerate() {
                if i > 0 {
                    write!(f, "; ")?;
                }
                write!(f, "{}", failure)?;
            }
        }
        if self.cancelled {
            if !self.failures.is_empty() {
                write!(f, " (cancelled)")?;
            } else {
                write!(f, "cancelled before all symbols were collected")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for PartialFailure {}

/// Collector 에러 타입
#[derive(Debug, Error)]
pub enum CollectorError {
    /// 알 수 없는 수집 대상
    #[error("unknown source: {0} (allowed: tiingo, kis, fx)")]
    UnknownSource(String),

    /// 필수 인증 정보 누락
    #[error("missing credential: {0} is not set")]
    MissingCredential(String),

    /// 구간 계산 중 저장소 조회 실패
    #[error("gap detection failed: {0}")]
    GapDetection(#[source] DataError),

    /// 저장소 쓰기/연결 실패
    #[error("storage error: {0}")]
    Storage(#[source] DataError),

    /// 수집 취소
    #[error("collection cancelled")]
    Cancelled,

    /// 일부 심볼 실패
    #[error(transparent)]
    Partial(#[from] PartialFailure),

    /// 단일 호출 실패 (환율 등)
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// 설정 에러
    #[error("configuration error: {0}")]
    Config(String),

    /// 워치리스트 에러
    #[error("watchlist error: {0}")]
    Watchlist(#[from] CoreError),

    /// 여러 에러 (예: 부분 실패 후 저장 실패)
    #[error("{}", join_errors(.0))]
    Multiple(Vec<CollectorError>),
}

impl From<Cancelled> for CollectorError {
    fn from(_: Cancelled) -> Self {
        CollectorError::Cancelled
    }
}

impl CollectorError {
    /// 두 에러를 하나로 합침.
    pub fn join(first: Option<Self>, second: Option<Self>) -> Option<Self> {
        match (first, second) {
            (None, None) => None,
            (Some(e), None) | (None, Some(e)) => Some(e),
            (Some(a), Some(b)) => Some(CollectorError::Multiple(vec![a, b])),
        }
    }

    /// 실패한 심볼 수.
    pub fn failed_symbols(&self) -> usize {
        match self {
            CollectorError::Partial(p) => p.failures.len(),
            CollectorError::Multiple(errors) => errors.iter().map(Self::failed_symbols).sum(),
            _ => 0,
        }
    }

    /// 저장소 쓰기 실패를 포함하는지 확인.
    pub fn is_storage_failure(&self) -> bool {
        match self {
            CollectorError::Storage(_) => true,
            CollectorError::Multiple(errors) => errors.iter().any(Self::is_storage_failure),
            _ => false,
        }
    }

    /// 취소로 인한 에러인지 확인.
    pub fn is_cancelled(&self) -> bool {
        match self {
            CollectorError::Cancelled | CollectorError::Fetch(RetryError::Cancelled) => true,
            CollectorError::Partial(p) => p.cancelled,
            CollectorError::Multiple(errors) => errors.iter().any(Self::is_cancelled),
            _ => false,
        }
    }
}

fn join_errors(errors: &[CollectorError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
