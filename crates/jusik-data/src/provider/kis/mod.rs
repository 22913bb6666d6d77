//! 한국투자증권(KIS) Open API 클라이언트 (한국 시장).
//!
//! - `auth`: OAuth2 접근 토큰 발급 및 캐싱
//! - `client`: 국내주식 기간별 시세(일봉) 조회와 날짜 커서 페이지네이션
//! - `parse`: 문자열 숫자 응답 파싱

pub mod auth;
pub mod client;
mod parse;

pub use auth::{KisTokenProvider, TokenState};
pub use client::{KisClient, DEFAULT_BASE_URL, SOURCE};
