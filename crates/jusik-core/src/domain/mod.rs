//! 수집 도메인 모델.

pub mod gap;
pub mod market;
pub mod price;

pub use gap::Gap;
pub use market::{Market, SecurityType, WatchlistEntry};
pub use price::{DailyPrice, FxRate};
