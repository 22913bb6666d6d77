//! 일봉 가격 수집 CLI.

use clap::{Parser, ValueEnum};
use jusik_collector::{
    aggregate_exit_code, log_overall, CollectorConfig, CollectorError, Source, SourceOrchestrator,
};
use jusik_core::{init_logging, load_watchlist, LogConfig};
use jusik_data::{DatabaseConfig, PgPriceRepository};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "jusik-collector")]
#[command(about = "Gap-aware daily price collector", long_about = None)]
#[command(version)]
struct Cli {
    /// 수집 대상
    #[arg(long, value_enum, default_value_t = Target::All)]
    target: Target,

    /// 설정과 워치리스트만 확인하고 종료
    #[arg(long)]
    dry_run: bool,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Target {
    Tiingo,
    Kis,
    Fx,
    All,
}

impl Target {
    fn sources(self) -> Vec<&'static str> {
        match self {
            Target::Tiingo => vec![Source::Tiingo.as_str()],
            Target::Kis => vec![Source::Kis.as_str()],
            Target::Fx => vec![Source::Fx.as_str()],
            Target::All => Source::ALL.iter().map(Source::as_str).collect(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // 로깅 초기화
    let log_config = LogConfig {
        level: cli.log_level.clone(),
        ..LogConfig::from_env()
    };
    if let Err(e) = init_logging(log_config) {
        eprintln!("failed to initialize logging: {}", e);
        return ExitCode::from(1);
    }

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!(error = %e, "수집기 시작 실패");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<u8, CollectorError> {
    tracing::info!(sources = ?cli.target.sources(), dry_run = cli.dry_run, "가격 수집기 시작");

    // 설정 로드
    let config = CollectorConfig::from_env();
    tracing::debug!(config = ?config, "설정 로드 완료");

    let watchlist = load_watchlist(&config.watchlist_path)?;
    tracing::info!(
        path = %config.watchlist_path.display(),
        entries = watchlist.len(),
        "워치리스트 로드 완료"
    );

    if cli.dry_run {
        tracing::info!("dry-run: 수집 없이 종료");
        return Ok(0);
    }

    // DB 연결
    let db_config = DatabaseConfig::new(config.require_database_url()?);
    let repository = PgPriceRepository::connect(&db_config)
        .await
        .map_err(CollectorError::Storage)?;
    let pool = repository.pool().clone();

    // Ctrl-C 또는 제한 시간 초과 시 모든 대기 지점 취소
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("종료 신호 수신, 수집 취소 중...");
            signal_token.cancel();
        }
    });
    let deadline_token = cancel.clone();
    let timeout = config.collect_timeout;
    tokio::spawn(async move {
        tokio::select! {
            _ = deadline_token.cancelled() => {}
            _ = tokio::time::sleep(timeout) => {
                tracing::warn!(
                    timeout_secs = timeout.as_secs(),
                    "수집 제한 시간 초과, 수집 취소 중..."
                );
                deadline_token.cancel();
            }
        }
    });

    let started = Instant::now();
    let orchestrator = SourceOrchestrator::new(config, Arc::new(repository), watchlist);
    let results = orchestrator
        .collect_many(&cancel, &cli.target.sources())
        .await;

    for result in &results {
        result.log_summary();
    }
    log_overall(&results, started.elapsed());

    // 제한 시간 대기 작업 종료
    cancel.cancel();
    pool.close().await;

    let code = aggregate_exit_code(&results);
    Ok(u8::try_from(code).unwrap_or(1))
}
