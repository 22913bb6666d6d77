//! 제공자 공통 HTTP 클라이언트.
//!
//! base URL과 기본 헤더를 묶고, 응답 크기 제한과 상태 코드 분류를 적용합니다:
//! - 2xx: 본문 반환
//! - 429: `RateLimited` (재시도 가능)
//! - 5xx: `Server` (재시도 가능)
//! - 그 외 4xx: `Http` (재시도 불가)

use crate::error::{ProviderError, ProviderResult};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// 기본 요청 타임아웃.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// 기본 응답 본문 크기 제한 (10 MiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// 에러 메시지에 포함할 응답 본문 최대 길이.
const MAX_ERROR_BODY_LEN: usize = 512;

/// base URL과 기본 헤더에 묶인 HTTP 클라이언트.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    client: Client,
    max_body_size: usize,
}

impl ApiClient {
    /// 새 클라이언트 생성.
    ///
    /// # Errors
    /// 헤더 이름/값이 유효하지 않으면 `ProviderError::InvalidRequest`를 반환합니다.
    pub fn new(base_url: impl Into<String>, headers: &[(&str, &str)]) -> ProviderResult<Self> {
        Self::with_timeout(base_url, headers, DEFAULT_TIMEOUT)
    }

    /// 타임아웃을 지정하여 클라이언트 생성.
    pub fn with_timeout(
        base_url: impl Into<String>,
        headers: &[(&str, &str)],
        timeout: Duration,
    ) -> ProviderResult<Self> {
        let mut default_headers = HeaderMap::new();
        for (name, value) in headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ProviderError::InvalidRequest(format!("header {}: {}", name, e)))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| ProviderError::InvalidRequest(format!("header {}: {}", name, e)))?;
            default_headers.insert(header_name, header_value);
        }

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|e| ProviderError::InvalidRequest(format!("HTTP client 생성 실패: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        })
    }

    /// 응답 본문 크기 제한 설정.
    pub fn with_max_body_size(mut self, limit: usize) -> Self {
        self.max_body_size = limit;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET 요청 후 본문 바이트 반환.
    ///
    /// `headers`는 기본 헤더에 더해 이 요청에만 적용됩니다.
    pub async fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
        headers: &[(&str, String)],
    ) -> ProviderResult<Vec<u8>> {
        let url = self.url(path);
        let mut request = self.client.get(&url).query(query);
        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }

        debug!(url = %url, "GET");
        let response = request.send().await?;
        self.read_body(&url, response).await
    }

    /// JSON 본문으로 POST 요청 후 본문 바이트 반환.
    pub async fn post_json<T>(&self, path: &str, body: &T) -> ProviderResult<Vec<u8>>
    where
        T: Serialize + ?Sized,
    {
        let url = self.url(path);
        debug!(url = %url, "POST");
        let response = self.client.post(&url).json(body).send().await?;
        self.read_body(&url, response).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_body(&self, url: &str, mut response: Response) -> ProviderResult<Vec<u8>> {
        let status = response.status();
        let too_large = || ProviderError::BodyTooLarge {
            url: url.to_string(),
            limit: self.max_body_size,
        };

        if let Some(len) = response.content_length() {
            if len > self.max_body_size as u64 {
                return Err(too_large());
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            body.extend_from_slice(&chunk);
            if body.len() > self.max_body_size {
                return Err(too_large());
            }
        }

        check_status(status, url, &body)?;
        Ok(body)
    }
}

fn check_status(status: StatusCode, url: &str, body: &[u8]) -> ProviderResult<()> {
    if status.is_success() {
        return Ok(());
    }

    let body = truncate_body(body);
    let url = url.to_string();
    let code = status.as_u16();

    if status == StatusCode::TOO_MANY_REQUESTS {
        Err(ProviderError::RateLimited(format!("HTTP 429 {}: {}", url, body)))
    } else if status.is_server_error() {
        Err(ProviderError::Server {
            status: code,
            url,
            body,
        })
    } else {
        Err(ProviderError::Http {
            status: code,
            url,
            body,
        })
    }
}

/// 에러 본문을 UTF-8 경계에서 자름.
pub(crate) fn truncate_body(body: &[u8]) -> String {
    if body.len() <= MAX_ERROR_BODY_LEN {
        return String::from_utf8_lossy(body).into_owned();
    }

    let head = &body[..MAX_ERROR_BODY_LEN];
    let valid = match std::str::from_utf8(head) {
        Ok(s) => s,
        Err(e) => std::str::from_utf8(&head[..e.valid_up_to()]).unwrap_or_default(),
    };
    format!("{}...", valid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_get_success_with_headers_and_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/prices")
            .match_header("authorization", "Token secret")
            .match_header("x-extra", "1")
            .match_query(Matcher::UrlEncoded("startDate".into(), "2024-01-02".into()))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let client = ApiClient::new(server.url(), &[("Authorization", "Token secret")]).unwrap();
        let body = client
            .get(
                "/prices",
                &[("startDate", "2024-01-02".to_string())],
                &[("x-extra", "1".to_string())],
            )
            .await
            .unwrap();

        assert_eq!(body, b"[]");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_status_classification() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/limited")
            .with_status(429)
            .with_body("slow down")
            .create_async()
            .await;
        server
            .mock("GET", "/down")
            .with_status(503)
            .create_async()
            .await;
        server
            .mock("GET", "/bad")
            .with_status(400)
            .with_body("bad request")
            .create_async()
            .await;

        let client = ApiClient::new(server.url(), &[]).unwrap();

        let err = client.get("/limited", &[], &[]).await.unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited(_)));
        assert!(err.is_retryable());

        let err = client.get("/down", &[], &[]).await.unwrap_err();
        assert!(matches!(err, ProviderError::Server { status: 503, .. }));
        assert!(err.is_retryable());

        let err = client.get("/bad", &[], &[]).await.unwrap_err();
        match &err {
            ProviderError::Http { status, body, .. } => {
                assert_eq!(*status, 400);
                assert_eq!(body, "bad request");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_body_too_large() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/big")
            .with_status(200)
            .with_body("x".repeat(64))
            .create_async()
            .await;

        let client = ApiClient::new(server.url(), &[])
            .unwrap()
            .with_max_body_size(16);
        let err = client.get("/big", &[], &[]).await.unwrap_err();
        assert!(matches!(err, ProviderError::BodyTooLarge { limit: 16, .. }));
    }

    #[tokio::test]
    async fn test_connection_refused_is_retryable() {
        let client = ApiClient::new("http://127.0.0.1:1", &[]).unwrap();
        let err = client.get("/", &[], &[]).await.unwrap_err();
        assert!(err.is_retryable(), "unexpected error: {err:?}");
    }

    #[test]
    fn test_invalid_header_rejected() {
        let err = ApiClient::new("http://localhost", &[("bad header", "v")]).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
    }

    #[test]
    fn test_truncate_body_on_char_boundary() {
        assert_eq!(truncate_body(b"short"), "short");

        // 511바이트 + 3바이트 문자: 512바이트 경계가 문자 중간에 걸림
        let mut body = "a".repeat(511).into_bytes();
        body.extend_from_slice("가나".as_bytes());
        let truncated = truncate_body(&body);
        assert_eq!(truncated, format!("{}...", "a".repeat(511)));
    }
}
