//! 수집 구간.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

/// 특정 심볼에 대해 저장된 가격이 없는 연속 달력 구간.
///
/// `from <= to`가 항상 성립하며 양 끝을 포함합니다.
/// 수집 실행마다 새로 계산되고 저장되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Gap {
    symbol: String,
    from: NaiveDate,
    to: NaiveDate,
}

impl Gap {
    /// 구간 생성. `from > to`이면 빈 구간이므로 `None`.
    pub fn new(symbol: impl Into<String>, from: NaiveDate, to: NaiveDate) -> Option<Self> {
        if from > to {
            return None;
        }
        Some(Self {
            symbol: symbol.into(),
            from,
            to,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn from_date(&self) -> NaiveDate {
        self.from
    }

    pub fn to_date(&self) -> NaiveDate {
        self.to
    }

    /// 날짜가 구간 안에 있는지 확인.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }

    /// 구간에 포함된 달력 일수.
    pub fn days(&self) -> i64 {
        (self.to - self.from).num_days() + 1
    }
}

impl fmt::Display for Gap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{} ~ {}]", self.symbol, self.from, self.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_gap_rejects_inverted_range() {
        assert!(Gap::new("NVDA", date(2024, 1, 2), date(2024, 1, 1)).is_none());
    }

    #[test]
    fn test_single_day_gap() {
        let gap = Gap::new("NVDA", date(2024, 1, 2), date(2024, 1, 2)).unwrap();
        assert_eq!(gap.days(), 1);
        assert!(gap.contains(date(2024, 1, 2)));
        assert!(!gap.contains(date(2024, 1, 3)));
    }
}
