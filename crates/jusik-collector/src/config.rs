//! 환경변수 기반 설정 모듈.

use crate::error::{CollectorError, Result};
use crate::gap::DEFAULT_LOOKBACK_DAYS;
use crate::retry::RetryConfig;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Tiingo 재시도 정책
pub const TIINGO_RETRY: RetryConfig =
    RetryConfig::new(Duration::from_secs(5), 3, Duration::from_secs(60));
/// KIS 재시도 정책
pub const KIS_RETRY: RetryConfig =
    RetryConfig::new(Duration::from_secs(2), 3, Duration::from_secs(30));
/// 환율 재시도 정책
pub const FX_RETRY: RetryConfig =
    RetryConfig::new(Duration::from_secs(2), 3, Duration::from_secs(30));

/// Tiingo 무료 플랜 기준 요청 간격 (시간당 약 1,200건)
const TIINGO_REQUEST_INTERVAL_MS: u64 = 3000;
/// KIS 초당 거래건수 제한 기준 요청 간격
const KIS_REQUEST_INTERVAL_MS: u64 = 56;

/// 기본 워치리스트 경로
const DEFAULT_WATCHLIST_PATH: &str = "config/watchlist.json";
/// 기본 전체 수집 제한 시간 (30분)
const DEFAULT_COLLECT_TIMEOUT_SECS: u64 = 1800;

/// 제공자별 설정
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    /// API 주소
    pub base_url: String,
    /// 요청 간 최소 간격 (0이면 제한 없음)
    pub request_interval: Duration,
    /// 재시도 정책
    pub retry: RetryConfig,
}

/// Collector 전체 설정
#[derive(Clone)]
pub struct CollectorConfig {
    /// 데이터베이스 URL (dry-run에서는 없어도 됨)
    pub database_url: Option<String>,
    /// Tiingo API 키
    pub tiingo_api_key: Option<String>,
    /// KIS 앱 키
    pub kis_app_key: Option<String>,
    /// KIS 앱 시크릿
    pub kis_app_secret: Option<String>,
    /// 워치리스트 파일 경로
    pub watchlist_path: PathBuf,
    /// 전체 수집 제한 시간
    pub collect_timeout: Duration,
    /// 저장된 데이터가 없을 때 수집 시작 일수
    pub lookback_days: i64,
    pub tiingo: ProviderSettings,
    pub kis: ProviderSettings,
    pub fx: ProviderSettings,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            tiingo_api_key: None,
            kis_app_key: None,
            kis_app_secret: None,
            watchlist_path: PathBuf::from(DEFAULT_WATCHLIST_PATH),
            collect_timeout: Duration::from_secs(DEFAULT_COLLECT_TIMEOUT_SECS),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            tiingo: ProviderSettings {
                base_url: jusik_data::provider::tiingo::DEFAULT_BASE_URL.to_string(),
                request_interval: Duration::from_millis(TIINGO_REQUEST_INTERVAL_MS),
                retry: TIINGO_RETRY,
            },
            kis: ProviderSettings {
                base_url: jusik_data::provider::kis::client::DEFAULT_BASE_URL.to_string(),
                request_interval: Duration::from_millis(KIS_REQUEST_INTERVAL_MS),
                retry: KIS_RETRY,
            },
            fx: ProviderSettings {
                base_url: jusik_data::provider::fx::DEFAULT_BASE_URL.to_string(),
                request_interval: Duration::ZERO,
                retry: FX_RETRY,
            },
        }
    }
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드
    ///
    /// 인증 정보는 여기서 검증하지 않고 제공자 실행 시점에 확인합니다.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        Self {
            database_url: env_var_opt("DATABASE_URL"),
            tiingo_api_key: env_var_opt("TIINGO_API_KEY"),
            kis_app_key: env_var_opt("KIS_APP_KEY"),
            kis_app_secret: env_var_opt("KIS_APP_SECRET"),
            watchlist_path: env_var_opt("WATCHLIST_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.watchlist_path),
            collect_timeout: Duration::from_secs(env_var_parse(
                "COLLECT_TIMEOUT_SECS",
                DEFAULT_COLLECT_TIMEOUT_SECS,
            )),
            lookback_days: env_var_parse("LOOKBACK_DAYS", DEFAULT_LOOKBACK_DAYS),
            tiingo: ProviderSettings {
                base_url: env_var_opt("TIINGO_BASE_URL").unwrap_or(defaults.tiingo.base_url),
                request_interval: Duration::from_millis(env_var_parse(
                    "TIINGO_REQUEST_INTERVAL_MS",
                    TIINGO_REQUEST_INTERVAL_MS,
                )),
                retry: TIINGO_RETRY,
            },
            kis: ProviderSettings {
                base_url: env_var_opt("KIS_BASE_URL").unwrap_or(defaults.kis.base_url),
                request_interval: Duration::from_millis(env_var_parse(
                    "KIS_REQUEST_INTERVAL_MS",
                    KIS_REQUEST_INTERVAL_MS,
                )),
                retry: KIS_RETRY,
            },
            fx: ProviderSettings {
                base_url: env_var_opt("FX_BASE_URL").unwrap_or(defaults.fx.base_url),
                request_interval: Duration::ZERO,
                retry: FX_RETRY,
            },
        }
    }

    /// DB 연결 전 URL 확인
    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url.as_deref().ok_or_else(|| {
            CollectorError::Config("DATABASE_URL 환경변수가 설정되지 않았습니다".to_string())
        })
    }
}

impl fmt::Debug for CollectorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectorConfig")
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("tiingo_api_key", &redact(&self.tiingo_api_key))
            .field("kis_app_key", &redact(&self.kis_app_key))
            .field("kis_app_secret", &redact(&self.kis_app_secret))
            .field("watchlist_path", &self.watchlist_path)
            .field("collect_timeout", &self.collect_timeout)
            .field("lookback_days", &self.lookback_days)
            .field("tiingo", &self.tiingo)
            .field("kis", &self.kis)
            .field("fx", &self.fx)
            .finish()
    }
}

fn redact(value: &Option<String>) -> Option<&'static str> {
    value.as_ref().map(|_| "[REDACTED]")
}

/// 환경변수 값 (비어 있으면 없음으로 취급)
fn env_var_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용)
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CollectorConfig::default();
        assert_eq!(config.watchlist_path, PathBuf::from("config/watchlist.json"));
        assert_eq!(config.collect_timeout, Duration::from_secs(1800));
        assert_eq!(config.lookback_days, 365);
        assert_eq!(config.tiingo.request_interval, Duration::from_secs(3));
        assert_eq!(config.kis.request_interval, Duration::from_millis(56));
        assert!(config.fx.request_interval.is_zero());
        assert_eq!(config.tiingo.retry.initial_backoff, Duration::from_secs(5));
        assert_eq!(config.kis.retry.max_backoff, Duration::from_secs(30));
    }

    #[test]
    fn test_env_var_parse_falls_back() {
        std::env::set_var("JUSIK_TEST_PARSE_OK", "42");
        std::env::set_var("JUSIK_TEST_PARSE_BAD", "forty-two");

        assert_eq!(env_var_parse("JUSIK_TEST_PARSE_OK", 7u64), 42);
        assert_eq!(env_var_parse("JUSIK_TEST_PARSE_BAD", 7u64), 7);
        assert_eq!(env_var_parse("JUSIK_TEST_PARSE_MISSING", 7u64), 7);
    }

    #[test]
    fn test_blank_env_is_none() {
        std::env::set_var("JUSIK_TEST_BLANK", "  ");
        assert_eq!(env_var_opt("JUSIK_TEST_BLANK"), None);
    }

    #[test]
    fn test_require_database_url() {
        let mut config = CollectorConfig::default();
        assert!(matches!(
            config.require_database_url(),
            Err(CollectorError::Config(_))
        ));

        config.database_url = Some("postgres://localhost/jusik".to_string());
        assert_eq!(config.require_database_url().unwrap(), "postgres://localhost/jusik");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = CollectorConfig {
            tiingo_api_key: Some("super-secret".to_string()),
            ..Default::default()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
