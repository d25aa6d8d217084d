//! 백테스트 커맨드.
//!
//! 입력은 JSON 데이터셋 파일입니다 (종목별 일봉/분봉/수급/뉴스 +
//! 일별 지수 등락률). 결과 리포트는 요약을 표준 출력으로, 전체 내용을
//! JSON 파일로 내보낼 수 있습니다.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;

use closebet_analytics::{BacktestConfig, BacktestEngine, BacktestReport, HistoricalData, SymbolHistory};
use closebet_core::{DailyBar, InvestorFlow, MinuteBar, NewsItem};
use closebet_notification::{NotificationEvent, NotificationSender};

use crate::config::AppConfig;

/// 데이터셋 파일의 종목 하나.
#[derive(Debug, Deserialize)]
struct SymbolInput {
    symbol: String,
    name: String,
    daily_bars: Vec<DailyBar>,
    #[serde(default)]
    minute_bars: HashMap<NaiveDate, Vec<MinuteBar>>,
    #[serde(default)]
    flow: HashMap<NaiveDate, InvestorFlow>,
    #[serde(default)]
    headlines: HashMap<NaiveDate, Vec<NewsItem>>,
}

/// 데이터셋 파일 전체.
#[derive(Debug, Deserialize)]
struct DatasetInput {
    #[serde(default)]
    index_change: HashMap<NaiveDate, Decimal>,
    symbols: Vec<SymbolInput>,
}

/// JSON 데이터셋을 읽어 HistoricalData로 변환합니다.
pub fn load_dataset(path: &Path) -> anyhow::Result<HistoricalData> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("데이터셋 읽기 실패: {}", path.display()))?;
    let input: DatasetInput =
        serde_json::from_str(&raw).with_context(|| format!("데이터셋 파싱 실패: {}", path.display()))?;

    let mut data = HistoricalData::new();
    for entry in input.symbols {
        let mut history = SymbolHistory::new(&entry.symbol, &entry.name)
            .with_daily_bars(entry.daily_bars);
        for (date, bars) in entry.minute_bars {
            history = history.with_minute_bars(date, bars);
        }
        for (date, flow) in entry.flow {
            history = history.with_flow(date, flow);
        }
        for (date, items) in entry.headlines {
            history = history.with_headlines(date, items);
        }
        data.add_symbol(history);
    }
    for (date, pct) in input.index_change {
        data.set_index_change(date, pct);
    }
    Ok(data)
}

fn print_summary(report: &BacktestReport) {
    let m = &report.metrics;
    println!("기간 거래일: {}", report.equity_curve.len());
    println!("거래 수: {} (승 {} / 패 {})", m.trades, m.wins, m.losses);
    println!("승률: {:.2}", m.win_rate);
    println!("총 수익률: {:.2}%", m.total_return_pct);
    println!("최종 자산: {}", m.final_equity);
    println!("최대 낙폭: {:.2}%", m.max_drawdown_pct);
    println!("샤프 비율: {:.3}", m.sharpe_ratio);
}

/// 백테스트 실행.
pub async fn run(config: &AppConfig, data_path: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let data = load_dataset(data_path)?;
    let params = config.strategy_params()?;
    let engine = BacktestEngine::new(params, BacktestConfig::new(config.initial_capital));

    let report = engine.run(&data)?;
    print_summary(&report);

    let notifier = config.build_notifier();
    let event = NotificationEvent::AnalyticsSummary {
        label: format!("백테스트 {}", data_path.display()),
        trades: report.metrics.trades,
        total_return_pct: report.metrics.total_return_pct,
        win_rate: report.metrics.win_rate,
    };
    if let Err(error) = notifier.send(&event).await {
        tracing::warn!(%error, "백테스트 요약 알림 실패");
    }

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(path, json).with_context(|| format!("리포트 저장 실패: {}", path.display()))?;
        println!("리포트 저장: {}", path.display());
    }
    Ok(())
}
