//! 제공자 및 저장소 에러 타입.

use thiserror::Error;

/// 데이터 제공자 API 에러.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// 네트워크/연결 에러
    #[error("Network error: {0}")]
    Network(String),

    /// 요청 타임아웃
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// 요청 한도 초과 (HTTP 429 또는 본문 수준 제한)
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// 서버 에러 (5xx)
    #[error("HTTP {status} {url}: {body}")]
    Server { status: u16, url: String, body: String },

    /// 클라이언트 에러 (429를 제외한 4xx)
    #[error("HTTP {status} {url}: {body}")]
    Http { status: u16, url: String, body: String },

    /// 제공자에 존재하지 않는 심볼
    #[error("Ticker not found: {0}")]
    TickerNotFound(String),

    /// 응답 본문 크기 제한 초과
    #[error("Response from {url} exceeds {limit} bytes")]
    BodyTooLarge { url: String, limit: usize },

    /// 응답 파싱 에러
    #[error("Parse error: {0}")]
    Parse(String),

    /// 제공자 API 에러 코드
    #[error("API error {code}: {message}")]
    Api { code: String, message: String },

    /// 인증 실패
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 페이지네이션 한도 도달
    #[error("Max pagination pages reached: {0}")]
    MaxPagesReached(String),

    /// 잘못된 요청 구성 (헤더, URL 등)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// 재시도 가능한 에러인지 확인.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Network(_)
                | ProviderError::Timeout(_)
                | ProviderError::RateLimited(_)
                | ProviderError::Server { .. }
        )
    }

    /// HTTP 상태 코드 (응답을 받은 경우).
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Server { status, .. } | ProviderError::Http { status, .. } => {
                Some(*status)
            }
            ProviderError::RateLimited(_) => Some(429),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(err.to_string())
        } else if err.is_builder() {
            ProviderError::InvalidRequest(err.to_string())
        } else if err.is_decode() {
            ProviderError::Parse(err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Parse(err.to_string())
    }
}

/// 제공자 Result 타입.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// 저장소 에러.
#[derive(Debug, Error)]
pub enum DataError {
    /// 데이터베이스 연결 오류
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// 쿼리 실행 오류
    #[error("Query error: {0}")]
    QueryError(String),

    /// 데이터 삽입 오류
    #[error("Insert error: {0}")]
    InsertError(String),

    /// 연결 풀 소진
    #[error("Connection pool exhausted")]
    PoolExhausted,
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => DataError::PoolExhausted,
            sqlx::Error::Database(db_err) => DataError::QueryError(db_err.message().to_string()),
            _ => DataError::QueryError(err.to_string()),
        }
    }
}

/// 저장소 Result 타입.
pub type DataResult<T> = Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(ProviderError::Network("reset".into()).is_retryable());
        assert!(ProviderError::Timeout("30s".into()).is_retryable());
        assert!(ProviderError::RateLimited("429".into()).is_retryable());
        assert!(ProviderError::Server {
            status: 503,
            url: "u".into(),
            body: String::new()
        }
        .is_retryable());

        assert!(!ProviderError::Http {
            status: 400,
            url: "u".into(),
            body: String::new()
        }
        .is_retryable());
        assert!(!ProviderError::TickerNotFound("XXXX".into()).is_retryable());
        assert!(!ProviderError::Parse("bad json".into()).is_retryable());
        assert!(!ProviderError::Unauthorized("bad key".into()).is_retryable());
    }

    #[test]
    fn test_status() {
        assert_eq!(ProviderError::RateLimited("x".into()).status(), Some(429));
        assert_eq!(ProviderError::Parse("x".into()).status(), None);
    }
}
