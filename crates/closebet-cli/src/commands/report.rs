//! 거래 기록 성과 리포트 커맨드.

use std::path::Path;

use anyhow::{bail, Context};
use chrono::NaiveDate;

use closebet_analytics::{Period, PerformanceAnalyzer, PerformanceSummary};
use rust_decimal::Decimal;
use closebet_execution::TradeHistory;

use crate::config::AppConfig;

/// 기간 표현 파싱.
/// `all` | `day:2025-06-30` | `week:2025-06-30` | `month:2025-06` | `range:2025-06-01..2025-06-30`
fn parse_period(raw: &str) -> anyhow::Result<Period> {
    if raw == "all" {
        return Ok(Period::All);
    }
    let (kind, rest) = raw
        .split_once(':')
        .with_context(|| format!("기간 형식 오류: {raw}"))?;
    match kind {
        "day" => {
            let date = parse_date(rest)?;
            Ok(Period::Day(date))
        }
        "week" => {
            let date = parse_date(rest)?;
            Ok(Period::Week(date))
        }
        "month" => {
            let (year, month) = rest
                .split_once('-')
                .with_context(|| format!("월 형식 오류: {rest}"))?;
            Ok(Period::Month {
                year: year.parse().with_context(|| format!("연도 파싱 실패: {year}"))?,
                month: month.parse().with_context(|| format!("월 파싱 실패: {month}"))?,
            })
        }
        "range" => {
            let (start, end) = rest
                .split_once("..")
                .with_context(|| format!("범위 형식 오류: {rest}"))?;
            Ok(Period::Range {
                start: parse_date(start)?,
                end: parse_date(end)?,
            })
        }
        other => bail!("지원하지 않는 기간: {other} (all | day | week | month | range)"),
    }
}

fn parse_date(raw: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").with_context(|| format!("날짜 파싱 실패: {raw}"))
}

/// 성과 리포트 출력.
pub fn run(config: &AppConfig, history_path: Option<&Path>, period: &str) -> anyhow::Result<()> {
    let path = history_path.unwrap_or(&config.history_path);
    let history = TradeHistory::open(path)
        .with_context(|| format!("거래 기록 열기 실패: {}", path.display()))?;
    let period = parse_period(period)?;
    let summary = PerformanceAnalyzer.analyze(history.records(), period);

    print!("{}", render_summary(&summary));
    Ok(())
}

/// 요약 테이블 렌더링. 승률은 0~1 비율이라 %로 환산해 보여줍니다.
fn render_summary(summary: &PerformanceSummary) -> String {
    use std::fmt::Write;

    if summary.trades == 0 {
        return "해당 기간 거래 없음\n".to_string();
    }

    let mut out = String::new();
    let win_rate_pct = summary.win_rate * Decimal::ONE_HUNDRED;
    let _ = writeln!(out, "거래 {}건 (승 {} / 패 {})", summary.trades, summary.wins, summary.losses);
    let _ = writeln!(out, "승률           {:>8.2}%", win_rate_pct);
    let _ = writeln!(out, "총 손익        {:>12}", summary.total_pnl);
    let _ = writeln!(out, "평균 수익률    {:>8.2}%", summary.avg_win_pct);
    let _ = writeln!(out, "평균 손실률    {:>8.2}%", summary.avg_loss_pct);
    let _ = writeln!(out, "최고 거래      {:>8.2}%", summary.best_trade_pct);
    let _ = writeln!(out, "최악 거래      {:>8.2}%", summary.worst_trade_pct);
    let _ = writeln!(out, "최대 연승 {} / 최대 연패 {}", summary.max_win_streak, summary.max_loss_streak);

    if !summary.by_symbol.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{:<10} {:>6} {:>6} {:>14} {:>10}", "종목", "거래", "승", "손익", "평균%");
        for s in &summary.by_symbol {
            let _ = writeln!(
                out,
                "{:<10} {:>6} {:>6} {:>14} {:>10.2}",
                s.symbol, s.trades, s.wins, s.total_pnl, s.avg_pnl_pct
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_period_variants() {
        assert!(matches!(parse_period("all").unwrap(), Period::All));
        assert!(matches!(parse_period("day:2025-06-30").unwrap(), Period::Day(_)));
        assert!(matches!(
            parse_period("month:2025-06").unwrap(),
            Period::Month { year: 2025, month: 6 }
        ));
        assert!(matches!(parse_period("range:2025-06-01..2025-06-30").unwrap(), Period::Range { .. }));
        assert!(parse_period("hour:3").is_err());
        assert!(parse_period("day:notadate").is_err());
    }

    #[test]
    fn win_rate_is_rendered_as_percent() {
        let summary = PerformanceSummary {
            trades: 4,
            wins: 3,
            losses: 1,
            win_rate: Decimal::new(75, 2),
            total_pnl: Decimal::new(120_000, 0),
            avg_win_pct: Decimal::new(25, 1),
            avg_loss_pct: Decimal::new(-18, 1),
            best_trade_pct: Decimal::new(41, 1),
            worst_trade_pct: Decimal::new(-18, 1),
            max_win_streak: 2,
            max_loss_streak: 1,
            by_symbol: vec![],
        };

        let rendered = render_summary(&summary);
        // 0.75 비율은 75.00%로 표시되어야 함
        assert!(rendered.contains("75.00%"));
        assert!(!rendered.contains("0.75%"));
    }

    #[test]
    fn empty_summary_renders_placeholder() {
        let summary = PerformanceSummary {
            trades: 0,
            wins: 0,
            losses: 0,
            win_rate: Decimal::ZERO,
            total_pnl: Decimal::ZERO,
            avg_win_pct: Decimal::ZERO,
            avg_loss_pct: Decimal::ZERO,
            best_trade_pct: Decimal::ZERO,
            worst_trade_pct: Decimal::ZERO,
            max_win_streak: 0,
            max_loss_streak: 0,
            by_symbol: vec![],
        };
        assert!(render_summary(&summary).contains("거래 없음"));
    }
}
