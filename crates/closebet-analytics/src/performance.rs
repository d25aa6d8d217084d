//! 성과 분석.
//!
//! TradeRecord 목록에 대한 순수 집계입니다. 기간 필터는 KST 청산일
//! 기준으로 적용합니다.

use std::collections::BTreeMap;

use chrono::{Datelike, Days, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use closebet_core::clock::kst_date;
use closebet_core::TradeRecord;

/// 집계 기간.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "period", rename_all = "snake_case")]
pub enum Period {
    /// 전체
    All,
    /// 특정 거래일
    Day(NaiveDate),
    /// 해당 날짜가 속한 주 (월~일)
    Week(NaiveDate),
    /// 특정 연월
    Month { year: i32, month: u32 },
    /// 임의 구간 [start, end]
    Range { start: NaiveDate, end: NaiveDate },
}

impl Period {
    fn contains(&self, date: NaiveDate) -> bool {
        match self {
            Period::All => true,
            Period::Day(day) => date == *day,
            Period::Week(anchor) => {
                let monday = *anchor - Days::new(anchor.weekday().num_days_from_monday() as u64);
                let sunday = monday + Days::new(6);
                date >= monday && date <= sunday
            }
            Period::Month { year, month } => date.year() == *year && date.month() == *month,
            Period::Range { start, end } => date >= *start && date <= *end,
        }
    }
}

/// 종목별 성과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolPerformance {
    pub symbol: String,
    pub trades: usize,
    pub wins: usize,
    pub total_pnl: Decimal,
    pub avg_pnl_pct: Decimal,
}

/// 기간 성과 요약.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: Decimal,
    pub total_pnl: Decimal,
    pub avg_win_pct: Decimal,
    pub avg_loss_pct: Decimal,
    /// 최고 수익 거래 수익률 (%)
    pub best_trade_pct: Decimal,
    /// 최악 손실 거래 수익률 (%)
    pub worst_trade_pct: Decimal,
    pub max_win_streak: usize,
    pub max_loss_streak: usize,
    /// 종목별 성과 (손익 내림차순)
    pub by_symbol: Vec<SymbolPerformance>,
}

/// 성과 분석기.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerformanceAnalyzer;

impl PerformanceAnalyzer {
    /// 기간 내 거래에 대한 요약 집계.
    pub fn analyze(&self, records: &[TradeRecord], period: Period) -> PerformanceSummary {
        let filtered: Vec<&TradeRecord> = records
            .iter()
            .filter(|r| period.contains(kst_date(r.exit_time)))
            .collect();

        let trades = filtered.len();
        let wins: Vec<&&TradeRecord> = filtered.iter().filter(|r| r.is_win()).collect();
        let losses: Vec<&&TradeRecord> = filtered.iter().filter(|r| r.is_loss()).collect();

        let avg = |rs: &[&&TradeRecord]| -> Decimal {
            if rs.is_empty() {
                Decimal::ZERO
            } else {
                rs.iter().map(|r| r.pnl_pct).sum::<Decimal>() / Decimal::from(rs.len())
            }
        };

        let (max_win_streak, max_loss_streak) = streaks(&filtered);

        PerformanceSummary {
            trades,
            wins: wins.len(),
            losses: losses.len(),
            win_rate: if trades == 0 {
                Decimal::ZERO
            } else {
                Decimal::from(wins.len()) / Decimal::from(trades)
            },
            total_pnl: filtered.iter().map(|r| r.pnl).sum(),
            avg_win_pct: avg(&wins),
            avg_loss_pct: avg(&losses),
            best_trade_pct: filtered
                .iter()
                .map(|r| r.pnl_pct)
                .max()
                .unwrap_or(Decimal::ZERO),
            worst_trade_pct: filtered
                .iter()
                .map(|r| r.pnl_pct)
                .min()
                .unwrap_or(Decimal::ZERO),
            max_win_streak,
            max_loss_streak,
            by_symbol: by_symbol(&filtered),
        }
    }
}

/// 최대 연승/연패. 청산 순서(입력 순서) 기준.
fn streaks(records: &[&TradeRecord]) -> (usize, usize) {
    let mut max_win = 0;
    let mut max_loss = 0;
    let mut win_run = 0;
    let mut loss_run = 0;

    for record in records {
        if record.is_win() {
            win_run += 1;
            loss_run = 0;
        } else if record.is_loss() {
            loss_run += 1;
            win_run = 0;
        } else {
            // 본전 거래는 양쪽 스트릭을 모두 끊음
            win_run = 0;
            loss_run = 0;
        }
        max_win = max_win.max(win_run);
        max_loss = max_loss.max(loss_run);
    }
    (max_win, max_loss)
}

fn by_symbol(records: &[&TradeRecord]) -> Vec<SymbolPerformance> {
    let mut grouped: BTreeMap<&str, Vec<&TradeRecord>> = BTreeMap::new();
    for record in records {
        grouped.entry(&record.symbol).or_default().push(record);
    }

    let mut result: Vec<SymbolPerformance> = grouped
        .into_iter()
        .map(|(symbol, rs)| SymbolPerformance {
            symbol: symbol.to_string(),
            trades: rs.len(),
            wins: rs.iter().filter(|r| r.is_win()).count(),
            total_pnl: rs.iter().map(|r| r.pnl).sum(),
            avg_pnl_pct: rs.iter().map(|r| r.pnl_pct).sum::<Decimal>()
                / Decimal::from(rs.len()),
        })
        .collect();
    result.sort_by(|a, b| b.total_pnl.cmp(&a.total_pnl));
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use closebet_core::clock::kst_datetime;
    use closebet_core::ExitReason;
    use uuid::Uuid;

    fn record(symbol: &str, exit_day: NaiveDate, pnl_pct: Decimal) -> TradeRecord {
        let entry_price = dec!(10000);
        let quantity = dec!(100);
        let exit_price = entry_price * (Decimal::ONE + pnl_pct / dec!(100));
        let exit_time = kst_datetime(exit_day, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        TradeRecord {
            id: Uuid::new_v4(),
            position_id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            entry_price,
            exit_price,
            quantity,
            entry_time: exit_time - chrono::Duration::hours(18),
            exit_time,
            pnl: (exit_price - entry_price) * quantity,
            pnl_pct,
            holding_minutes: 1080,
            exit_reason: ExitReason::StopLoss,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    #[test]
    fn streaks_track_runs_in_close_order() {
        let records = vec![
            record("A", day(2), dec!(1.0)),
            record("A", day(3), dec!(2.0)),
            record("A", day(4), dec!(3.0)),
            record("A", day(5), dec!(-1.0)),
            record("A", day(6), dec!(-2.0)),
            record("A", day(9), dec!(1.0)),
        ];

        let summary = PerformanceAnalyzer.analyze(&records, Period::All);
        assert_eq!(summary.max_win_streak, 3);
        assert_eq!(summary.max_loss_streak, 2);
        assert_eq!(summary.best_trade_pct, dec!(3.0));
        assert_eq!(summary.worst_trade_pct, dec!(-2.0));
    }

    #[test]
    fn day_filter_selects_single_trading_day() {
        let records = vec![
            record("A", day(2), dec!(1.0)),
            record("A", day(3), dec!(-1.0)),
        ];

        let summary = PerformanceAnalyzer.analyze(&records, Period::Day(day(2)));
        assert_eq!(summary.trades, 1);
        assert_eq!(summary.wins, 1);
        assert_eq!(summary.win_rate, Decimal::ONE);
    }

    #[test]
    fn week_filter_spans_monday_to_sunday() {
        // 2025-06-02는 월요일
        let records = vec![
            record("A", day(2), dec!(1.0)),
            record("A", day(8), dec!(1.0)),
            record("A", day(9), dec!(1.0)),
        ];

        let summary = PerformanceAnalyzer.analyze(&records, Period::Week(day(4)));
        assert_eq!(summary.trades, 2);
    }

    #[test]
    fn month_filter() {
        let records = vec![
            record("A", day(30), dec!(1.0)),
            record(
                "A",
                NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
                dec!(1.0),
            ),
        ];

        let summary = PerformanceAnalyzer.analyze(
            &records,
            Period::Month {
                year: 2025,
                month: 6,
            },
        );
        assert_eq!(summary.trades, 1);
    }

    #[test]
    fn per_symbol_breakdown_sorted_by_pnl() {
        let records = vec![
            record("A", day(2), dec!(1.0)),
            record("A", day(3), dec!(-3.0)),
            record("B", day(4), dec!(5.0)),
        ];

        let summary = PerformanceAnalyzer.analyze(&records, Period::All);
        assert_eq!(summary.by_symbol.len(), 2);
        assert_eq!(summary.by_symbol[0].symbol, "B");
        assert_eq!(summary.by_symbol[0].total_pnl, dec!(50000));
        assert_eq!(summary.by_symbol[1].symbol, "A");
        assert_eq!(summary.by_symbol[1].trades, 2);
    }

    #[test]
    fn empty_period_yields_zeroed_summary() {
        let summary = PerformanceAnalyzer.analyze(&[], Period::All);
        assert_eq!(summary.trades, 0);
        assert_eq!(summary.win_rate, Decimal::ZERO);
        assert_eq!(summary.total_pnl, Decimal::ZERO);
        assert!(summary.by_symbol.is_empty());
    }
}
