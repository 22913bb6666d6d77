//! 수집 실행 결과와 요약 보고.

use crate::error::CollectorError;
use jusik_core::{DailyPrice, FxRate};
use std::fmt;
use std::time::Duration;
use tracing::{error, info, warn};

/// 제공자 실행의 최종 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// 에러 없음
    Succeeded,
    /// 행과 에러가 함께 있음
    PartiallySucceeded,
    /// 모은 행이 없거나 하나도 저장하지 못함
    Failed,
}

impl RunStatus {
    pub fn label(&self) -> &'static str {
        match self {
            RunStatus::Succeeded => "OK",
            RunStatus::PartiallySucceeded => "PARTIAL",
            RunStatus::Failed => "FAIL",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 한 제공자 실행 결과.
#[derive(Debug)]
pub struct CollectionResult {
    /// 제공자 이름 (요청된 이름 그대로)
    pub provider: String,
    /// 수집된 가격 행
    pub rows: Vec<DailyPrice>,
    /// 수집된 환율 행
    pub fx_rates: Vec<FxRate>,
    /// 저장소에 기록된 행 수
    pub rows_written: u64,
    /// 실패 또는 부분 실패
    pub error: Option<CollectorError>,
    /// 소요 시간
    pub elapsed: Duration,
}

impl CollectionResult {
    /// 네트워크 호출 전에 끝난 실패.
    pub fn failed(provider: impl Into<String>, error: CollectorError, elapsed: Duration) -> Self {
        Self {
            provider: provider.into(),
            rows: Vec::new(),
            fx_rates: Vec::new(),
            rows_written: 0,
            error: Some(error),
            elapsed,
        }
    }

    /// 수집된 행 수 (가격 + 환율).
    pub fn collected(&self) -> usize {
        self.rows.len() + self.fx_rates.len()
    }

    /// 저장 실패로 한 행도 기록하지 못했다면 모은 행이 있어도 실패입니다.
    pub fn status(&self) -> RunStatus {
        match &self.error {
            None => RunStatus::Succeeded,
            Some(err) if self.rows_written == 0 && err.is_storage_failure() => RunStatus::Failed,
            Some(_) if self.collected() > 0 => RunStatus::PartiallySucceeded,
            Some(_) => RunStatus::Failed,
        }
    }

    /// 요약 한 줄 (예: `tiingo: OK | 3 rows | 1.2s`).
    pub fn summary_line(&self) -> String {
        let mut line = format!(
            "{}: {} | {} rows | {:.1}s",
            self.provider,
            self.status(),
            self.collected(),
            self.elapsed.as_secs_f64()
        );
        if let Some(err) = &self.error {
            let failed = err.failed_symbols();
            if failed > 0 {
                line.push_str(&format!(" | {} symbols failed", failed));
            }
            line.push_str(&format!(" | {}", err));
        }
        line
    }

    pub fn log_summary(&self) {
        let summary = self.summary_line();
        match self.status() {
            RunStatus::Succeeded => info!(
                provider = %self.provider,
                rows = self.collected(),
                written = self.rows_written,
                "{}",
                summary
            ),
            RunStatus::PartiallySucceeded => warn!(
                provider = %self.provider,
                rows = self.collected(),
                written = self.rows_written,
                "{}",
                summary
            ),
            RunStatus::Failed => error!(provider = %self.provider, "{}", summary),
        }
    }
}

/// 전체 결과를 종료 코드로 변환.
///
/// 하나라도 실패면 1, 부분 실패만 있으면 2, 모두 성공이면 0.
pub fn aggregate_exit_code(results: &[CollectionResult]) -> i32 {
    let statuses: Vec<RunStatus> = results.iter().map(CollectionResult::status).collect();
    if statuses.contains(&RunStatus::Failed) {
        1
    } else if statuses.contains(&RunStatus::PartiallySucceeded) {
        2
    } else {
        0
    }
}

/// 전체 실행 요약 로그.
pub fn log_overall(results: &[CollectionResult], elapsed: Duration) {
    let rows: usize = results.iter().map(CollectionResult::collected).sum();
    let written: u64 = results.iter().map(|r| r.rows_written).sum();
    let failed = results
        .iter()
        .filter(|r| r.status() != RunStatus::Succeeded)
        .count();

    let message = format!(
        "수집 완료: {} sources | {} rows | {} written | {:.1}s",
        results.len(),
        rows,
        written,
        elapsed.as_secs_f64()
    );
    if failed == 0 {
        info!("{}", message);
    } else {
        warn!(failed_sources = failed, "{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PartialFailure, SymbolFailure};
    use crate::retry::RetryError;
    use chrono::NaiveDate;
    use jusik_data::{DataError, ProviderError};

    fn row(symbol: &str) -> DailyPrice {
        DailyPrice {
            symbol: symbol.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            adj_close: 1.0,
            volume: 1,
            source: "tiingo".to_string(),
            is_anomaly: false,
        }
    }

    fn result(rows: usize, error: Option<CollectorError>) -> CollectionResult {
        CollectionResult {
            provider: "tiingo".to_string(),
            rows: (0..rows).map(|_| row("NVDA")).collect(),
            fx_rates: Vec::new(),
            rows_written: rows as u64,
            error,
            elapsed: Duration::from_millis(1200),
        }
    }

    fn partial() -> CollectorError {
        CollectorError::Partial(PartialFailure {
            failures: vec![SymbolFailure {
                symbol: "QQQ".to_string(),
                error: RetryError::NonRetriable(ProviderError::TickerNotFound("QQQ".to_string())),
            }],
            cancelled: false,
        })
    }

    #[test]
    fn test_status_from_rows_and_error() {
        assert_eq!(result(3, None).status(), RunStatus::Succeeded);
        assert_eq!(result(0, None).status(), RunStatus::Succeeded);
        assert_eq!(result(2, Some(partial())).status(), RunStatus::PartiallySucceeded);
        assert_eq!(result(0, Some(partial())).status(), RunStatus::Failed);
    }

    #[test]
    fn test_nothing_written_after_storage_error_is_failure() {
        let storage = || CollectorError::Storage(DataError::InsertError("down".into()));

        let mut unsaved = result(3, Some(storage()));
        unsaved.rows_written = 0;
        assert_eq!(unsaved.status(), RunStatus::Failed);
        assert_eq!(aggregate_exit_code(&[unsaved]), 1);

        let mut unsaved_partial = result(
            2,
            CollectorError::join(Some(partial()), Some(storage())),
        );
        unsaved_partial.rows_written = 0;
        assert_eq!(unsaved_partial.status(), RunStatus::Failed);

        // 행이 기록됐다면 부분 성공
        assert_eq!(
            result(2, Some(storage())).status(),
            RunStatus::PartiallySucceeded
        );
    }

    #[test]
    fn test_summary_line() {
        assert_eq!(result(3, None).summary_line(), "tiingo: OK | 3 rows | 1.2s");

        let line = result(2, Some(partial())).summary_line();
        assert!(line.starts_with("tiingo: PARTIAL | 2 rows | 1.2s | 1 symbols failed"));
        assert!(line.contains("QQQ"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(aggregate_exit_code(&[]), 0);
        assert_eq!(aggregate_exit_code(&[result(1, None), result(0, None)]), 0);
        assert_eq!(aggregate_exit_code(&[result(1, None), result(1, Some(partial()))]), 2);
        assert_eq!(
            aggregate_exit_code(&[result(1, Some(partial())), result(0, Some(partial()))]),
            1
        );
    }
}
