//! KIS OAuth2 인증.
//!
//! `POST /oauth2/tokenP`로 client-credentials 토큰을 발급받아 캐싱하고,
//! 만료 30분 전부터는 새 토큰을 발급받습니다.

use crate::error::{ProviderError, ProviderResult};
use crate::provider::http::ApiClient;
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Asia::Seoul;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

const TOKEN_PATH: &str = "/oauth2/tokenP";

/// 만료 전 갱신 여유 시간 (분).
const RENEW_BEFORE_EXPIRY_MINUTES: i64 = 30;

/// 토큰 발급 요청 타임아웃.
const TOKEN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    expires_in: i64,
    /// 만료 시각 (KST, "YYYY-MM-DD HH:MM:SS")
    #[serde(default)]
    access_token_token_expired: Option<String>,
}

/// 캐싱된 접근 토큰.
#[derive(Debug, Clone)]
pub struct TokenState {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenState {
    /// 갱신 시점이 지났는지 확인.
    pub fn needs_renewal(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .checked_sub_signed(Duration::minutes(RENEW_BEFORE_EXPIRY_MINUTES))
            .map_or(true, |renew_at| now >= renew_at)
    }

    /// `authorization` 헤더 값.
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

/// KIS 접근 토큰 제공자.
///
/// 첫 요청 시 토큰을 발급받고, 이후에는 만료 임박 전까지 캐시를 재사용합니다.
/// 발급 중에는 잠금을 유지하므로 동시 호출이 있어도 토큰은 한 번만 발급됩니다.
pub struct KisTokenProvider {
    http: ApiClient,
    app_key: String,
    app_secret: String,
    token: Mutex<Option<TokenState>>,
}

impl std::fmt::Debug for KisTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KisTokenProvider")
            .field("base_url", &self.http.base_url())
            .field("app_key", &"***")
            .finish()
    }
}

impl KisTokenProvider {
    /// 새 토큰 제공자 생성.
    pub fn new(
        base_url: impl Into<String>,
        app_key: impl Into<String>,
        app_secret: impl Into<String>,
    ) -> ProviderResult<Self> {
        Ok(Self {
            http: ApiClient::with_timeout(base_url, &[], TOKEN_TIMEOUT)?,
            app_key: app_key.into(),
            app_secret: app_secret.into(),
            token: Mutex::new(None),
        })
    }

    /// 유효한 토큰 반환, 필요하면 발급.
    pub async fn token(&self) -> ProviderResult<TokenState> {
        let mut guard = self.token.lock().await;

        if let Some(state) = guard.as_ref() {
            if !state.needs_renewal(Utc::now()) {
                debug!(expires_at = %state.expires_at, "캐시된 KIS 토큰 사용");
                return Ok(state.clone());
            }
        }

        let state = self.issue_token().await?;
        *guard = Some(state.clone());
        Ok(state)
    }

    async fn issue_token(&self) -> ProviderResult<TokenState> {
        let request = serde_json::json!({
            "grant_type": "client_credentials",
            "appkey": self.app_key,
            "appsecret": self.app_secret,
        });

        let body = self
            .http
            .post_json(TOKEN_PATH, &request)
            .await
            .map_err(|e| match e {
                ProviderError::Http { status, body, .. } => ProviderError::Unauthorized(format!(
                    "token request failed (HTTP {}): {}",
                    status, body
                )),
                other => other,
            })?;

        let response: TokenResponse = serde_json::from_slice(&body)?;
        if response.access_token.is_empty() {
            return Err(ProviderError::Unauthorized(
                "empty access token in response".to_string(),
            ));
        }

        let expires_at = match response
            .access_token_token_expired
            .as_deref()
            .and_then(parse_kis_datetime)
        {
            Some(at) => at,
            None => expires_after(Utc::now(), response.expires_in)?,
        };

        info!(expires_at = %expires_at, "KIS 접근 토큰 발급");

        Ok(TokenState {
            access_token: response.access_token,
            expires_at,
        })
    }
}

/// `expires_in`초 뒤의 만료 시각. 표현 범위를 벗어나면 파싱 오류.
fn expires_after(now: DateTime<Utc>, expires_in: i64) -> ProviderResult<DateTime<Utc>> {
    Duration::try_seconds(expires_in)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| ProviderError::Parse(format!("invalid expires_in: {}", expires_in)))
}

/// KST 기준 "YYYY-MM-DD HH:MM:SS"를 UTC로 변환.
fn parse_kis_datetime(s: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok()?;
    let kst = Seoul.from_local_datetime(&naive).single()?;
    Some(kst.with_timezone(&Utc))
}
