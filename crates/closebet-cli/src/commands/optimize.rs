//! 파라미터 최적화 커맨드.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context};

use closebet_analytics::{
    BacktestConfig, OptimizationReport, ParameterOptimizer, ParameterSpace, RankMetric, SearchMode,
};

use crate::commands::backtest::load_dataset;
use crate::config::AppConfig;

fn parse_metric(raw: &str) -> anyhow::Result<RankMetric> {
    Ok(match raw {
        "total-return" => RankMetric::TotalReturn,
        "sharpe" => RankMetric::Sharpe,
        "win-rate" => RankMetric::WinRate,
        other => bail!("지원하지 않는 지표: {other} (total-return | sharpe | win-rate)"),
    })
}

/// 탐색 공간. `--space` JSON 파일이 없으면 기본 격자를 씁니다.
fn load_space(path: Option<&Path>) -> anyhow::Result<ParameterSpace> {
    match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("탐색 공간 읽기 실패: {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("탐색 공간 파싱 실패: {}", path.display()))
        }
        None => Ok(ParameterSpace {
            v_signal_thresholds: vec![
                rust_decimal::Decimal::from(60u32),
                rust_decimal::Decimal::from(70u32),
                rust_decimal::Decimal::from(80u32),
            ],
            stop_loss_pcts: vec![
                rust_decimal::Decimal::from(-2i32),
                rust_decimal::Decimal::from(-3i32),
                rust_decimal::Decimal::from(-4i32),
            ],
            technical_pass_scores: vec![],
            max_entries_per_day: vec![2, 3],
        }),
    }
}

fn print_leaderboard(report: &OptimizationReport, top: usize) {
    println!(
        "{:<4} {:>10} {:>8} {:>8} {:>8} {:>8}",
        "순위", "수익률%", "샤프", "승률", "손절%", "V기준"
    );
    for (i, entry) in report.entries.iter().take(top).enumerate() {
        println!(
            "{:<4} {:>10.2} {:>8.3} {:>8.2} {:>8} {:>8}",
            i + 1,
            entry.metrics.total_return_pct,
            entry.metrics.sharpe_ratio,
            entry.metrics.win_rate,
            entry.params.stop_loss_pct,
            entry.params.v_signal_threshold,
        );
    }
}

/// 최적화 실행.
#[allow(clippy::too_many_arguments)]
pub fn run(
    config: &AppConfig,
    data_path: &Path,
    space_path: Option<&Path>,
    random: bool,
    samples: usize,
    seed: u64,
    metric: &str,
    output: &Path,
) -> anyhow::Result<()> {
    let data = load_dataset(data_path)?;
    let params = config.strategy_params()?;
    let space = load_space(space_path)?;
    let metric = parse_metric(metric)?;
    let mode = if random {
        SearchMode::Random { samples, seed }
    } else {
        SearchMode::Grid
    };

    let optimizer = ParameterOptimizer::new(
        params,
        BacktestConfig::new(config.initial_capital),
        space,
        metric,
        mode,
    );
    let report = optimizer.run(&data)?;

    print_leaderboard(&report, 10);
    if let Some(best) = report.best() {
        println!(
            "최적 지점: 손절 {}%, V기준 {}, 일일 진입 {}회",
            best.params.stop_loss_pct,
            best.params.v_signal_threshold,
            best.params.max_entries_per_day,
        );
    }

    report
        .save_json(output)
        .with_context(|| format!("리포트 저장 실패: {}", output.display()))?;
    println!("리포트 저장: {}", output.display());
    Ok(())
}
