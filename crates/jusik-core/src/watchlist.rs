//! 워치리스트 로드 및 필터링.
//!
//! `watchlist.json`은 다음 형식의 배열입니다:
//!
//! ```json
//! [
//!   {"symbol": "NVDA", "name": "NVIDIA", "market": "US", "type": "stock",
//!    "sector": "Semiconductors", "themes": ["AI"]},
//!   {"symbol": "069500", "name": "KODEX 200", "market": "KR", "type": "etf"}
//! ]
//! ```

use crate::domain::{Market, SecurityType, WatchlistEntry};
use crate::error::{CoreError, CoreResult};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// 파일에 기록된 원본 항목. 검증 전 단계라 모든 필드가 문자열입니다.
#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    market: String,
    #[serde(default, rename = "type")]
    security_type: String,
    #[serde(default)]
    sector: Option<String>,
    #[serde(default)]
    themes: Vec<String>,
}

impl TryFrom<RawEntry> for WatchlistEntry {
    type Error = CoreError;

    fn try_from(raw: RawEntry) -> Result<Self, Self::Error> {
        if raw.symbol.trim().is_empty() {
            return Err(CoreError::MissingSymbol);
        }
        let market: Market = raw.market.parse()?;
        let security_type: SecurityType = raw.security_type.parse()?;

        Ok(WatchlistEntry {
            symbol: raw.symbol.trim().to_string(),
            market,
            security_type,
            name: raw.name,
            sector: raw.sector.filter(|s| !s.is_empty()),
            themes: raw.themes,
        })
    }
}

/// 워치리스트 파일 로드.
pub fn load_watchlist(path: impl AsRef<Path>) -> CoreResult<Vec<WatchlistEntry>> {
    let content = std::fs::read_to_string(path.as_ref())?;
    parse_watchlist(&content)
}

/// JSON 문자열에서 워치리스트 파싱.
///
/// 빈 배열, 심볼 누락, 중복 심볼, 허용되지 않은 시장/유형은 에러입니다.
pub fn parse_watchlist(content: &str) -> CoreResult<Vec<WatchlistEntry>> {
    let raw: Vec<RawEntry> = serde_json::from_str(content)?;
    if raw.is_empty() {
        return Err(CoreError::EmptyWatchlist);
    }

    let mut seen = HashSet::with_capacity(raw.len());
    let mut entries = Vec::with_capacity(raw.len());
    for (index, r) in raw.into_iter().enumerate() {
        let invalid = |e| CoreError::InvalidEntry {
            index,
            source: Box::new(e),
        };
        let entry = WatchlistEntry::try_from(r).map_err(invalid)?;
        if !seen.insert(entry.symbol.clone()) {
            return Err(invalid(CoreError::DuplicateSymbol(entry.symbol)));
        }
        entries.push(entry);
    }
    Ok(entries)
}

/// 특정 시장 항목만 원래 순서대로 반환.
pub fn filter_by_market(entries: &[WatchlistEntry], market: Market) -> Vec<WatchlistEntry> {
    entries
        .iter()
        .filter(|e| e.market == market)
        .cloned()
        .collect()
}
