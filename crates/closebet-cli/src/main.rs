//! closebet CLI 엔트리포인트.

mod commands;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "closebet", about = "종가 베팅 자동매매", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 현재 시점 후보 종목 스캔
    Scan,
    /// 매수 사이클 1회 실행
    Buy,
    /// 청산 사이클 1회 실행
    Sell,
    /// 보유 포지션과 누적 성과 출력
    Portfolio,
    /// 장중 스케줄러 (매수/청산 사이클 반복)
    Scheduler,
    /// 과거 데이터 백테스트
    Backtest {
        /// 데이터셋 JSON 경로
        data: PathBuf,
        /// 리포트 저장 경로
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// 파라미터 최적화
    Optimize {
        /// 데이터셋 JSON 경로
        data: PathBuf,
        /// 탐색 공간 JSON 경로 (생략 시 기본 격자)
        #[arg(long)]
        space: Option<PathBuf>,
        /// 격자 대신 무작위 탐색
        #[arg(long)]
        random: bool,
        /// 무작위 탐색 샘플 수
        #[arg(long, default_value_t = 30)]
        samples: usize,
        /// 무작위 탐색 시드
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// 순위 지표 (total-return | sharpe | win-rate)
        #[arg(long, default_value = "total-return")]
        metric: String,
        /// 리포트 저장 경로
        #[arg(long, default_value = "optimization.json")]
        output: PathBuf,
    },
    /// 거래 기록 성과 리포트
    Report {
        /// 거래 기록 경로 (생략 시 설정값)
        #[arg(long)]
        history: Option<PathBuf>,
        /// 기간 (all | day:YYYY-MM-DD | week:YYYY-MM-DD | month:YYYY-MM | range:A..B)
        #[arg(long, default_value = "all")]
        period: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    match cli.command {
        Commands::Scan => commands::live::run_scan(&config).await,
        Commands::Buy => commands::live::run_buy(&config).await,
        Commands::Sell => commands::live::run_sell(&config).await,
        Commands::Portfolio => commands::live::run_portfolio(&config).await,
        Commands::Scheduler => commands::live::run_scheduler(&config).await,
        Commands::Backtest { data, output } => {
            commands::backtest::run(&config, &data, output.as_deref()).await
        }
        Commands::Optimize {
            data,
            space,
            random,
            samples,
            seed,
            metric,
            output,
        } => commands::optimize::run(
            &config,
            &data,
            space.as_deref(),
            random,
            samples,
            seed,
            &metric,
            &output,
        ),
        Commands::Report { history, period } => {
            commands::report::run(&config, history.as_deref(), &period)
        }
    }
}
