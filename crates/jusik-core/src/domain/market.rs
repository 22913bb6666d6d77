//! 시장, 증권 유형, 워치리스트 항목.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 거래소 지역.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Market {
    /// 미국 (Tiingo 수집 대상)
    #[serde(rename = "US")]
    Us,
    /// 한국 (KIS 수집 대상)
    #[serde(rename = "KR")]
    Kr,
}

impl Market {
    pub fn as_str(&self) -> &'static str {
        match self {
            Market::Us => "US",
            Market::Kr => "KR",
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Market {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "US" => Ok(Market::Us),
            "KR" => Ok(Market::Kr),
            other => Err(CoreError::InvalidMarket(other.to_string())),
        }
    }
}

/// 개별 주식과 ETF 구분.
///
/// 이상치 임계값이 유형별로 다릅니다 (미국 ETF 15%, 미국 주식 50%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityType {
    Stock,
    Etf,
}

impl SecurityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityType::Stock => "stock",
            SecurityType::Etf => "etf",
        }
    }
}

impl fmt::Display for SecurityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecurityType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stock" => Ok(SecurityType::Stock),
            "etf" => Ok(SecurityType::Etf),
            other => Err(CoreError::InvalidSecurityType(other.to_string())),
        }
    }
}

/// 워치리스트 항목.
///
/// 외부 설정에서 로드되며 수집 중에는 변경되지 않습니다. 식별자는 `symbol`입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    /// 종목 심볼 (예: "NVDA", "005930")
    pub symbol: String,
    /// 거래 시장
    pub market: Market,
    /// 증권 유형
    #[serde(rename = "type")]
    pub security_type: SecurityType,
    /// 종목명
    pub name: String,
    /// 섹터 (선택)
    #[serde(default)]
    pub sector: Option<String>,
    /// 테마 태그
    #[serde(default)]
    pub themes: Vec<String>,
}

impl WatchlistEntry {
    /// 필수 필드만으로 항목 생성.
    pub fn new(
        symbol: impl Into<String>,
        market: Market,
        security_type: SecurityType,
        name: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            market,
            security_type,
            name: name.into(),
            sector: None,
            themes: Vec::new(),
        }
    }

    /// 섹터 설정.
    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = Some(sector.into());
        self
    }

    /// 테마 설정.
    pub fn with_themes(mut self, themes: Vec<String>) -> Self {
        self.themes = themes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_parsing() {
        assert_eq!("US".parse::<Market>().unwrap(), Market::Us);
        assert_eq!("KR".parse::<Market>().unwrap(), Market::Kr);
        assert!(matches!(
            "JP".parse::<Market>(),
            Err(CoreError::InvalidMarket(m)) if m == "JP"
        ));
    }

    #[test]
    fn test_security_type_parsing() {
        assert_eq!("etf".parse::<SecurityType>().unwrap(), SecurityType::Etf);
        assert!("bond".parse::<SecurityType>().is_err());
    }

    #[test]
    fn test_entry_serde_uses_type_field() {
        let entry = WatchlistEntry::new("QQQ", Market::Us, SecurityType::Etf, "Invesco QQQ");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "etf");
        assert_eq!(json["market"], "US");
    }
}
