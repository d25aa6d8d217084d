//! 백테스트 엔진.
//!
//! 거래일 단위로 "오전 청산 재생 → 종가 베팅 재생"을 반복합니다.
//! 판단 코드는 라이브와 동일한 EntryPipeline / ExitStateMachine /
//! RiskGuard를 그대로 호출하므로 두 경로의 판단이 갈릴 수 없습니다.
//! 체결은 호가 ± 슬리피지에 수수료를 반영한 가격으로 시뮬레이션합니다.
//!
//! 실행마다 GuardState / 원장 / 이력을 독점 소유하므로 rayon 병렬
//! 파라미터 탐색에서도 공유 상태가 없습니다. 같은 입력과 파라미터면
//! 결과는 항상 동일합니다.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use closebet_core::clock::{kst_datetime, kst_time};
use closebet_core::{
    ConfigError, DailyBar, EnsembleResult, ExitReason, GuardState, MinuteBar, Snapshot,
    StrategyParams, TradeRecord,
};
use closebet_execution::{HistoryError, LedgerError, PositionLedger, TradeHistory};
use closebet_risk::{ExitContext, ExitDecision, ExitStateMachine, RiskGuard};
use closebet_strategy::{CandidateData, EntryPipeline, KellyCriterion, SizingContext};

use crate::backtest::data::HistoricalData;

/// 백테스트 오류.
#[derive(Debug, Error)]
pub enum BacktestError {
    /// 거래일이 하나도 없는 데이터
    #[error("백테스트 데이터가 비어 있습니다")]
    EmptyData,
    /// 파라미터 오류
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// 원장 정합성 오류
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// 이력 오류
    #[error(transparent)]
    History(#[from] HistoryError),
}

/// 백테스트 설정.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// 초기 자본금 (원)
    pub initial_capital: Decimal,
    /// 거래 수수료율 (예: 0.00015 = 0.015%)
    pub commission_rate: Decimal,
    /// 슬리피지율 (예: 0.001 = 0.1%)
    pub slippage_rate: Decimal,
}

impl BacktestConfig {
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            initial_capital,
            commission_rate: dec!(0.00015),
            slippage_rate: dec!(0.001),
        }
    }

    pub fn with_commission_rate(mut self, rate: Decimal) -> Self {
        self.commission_rate = rate;
        self
    }

    pub fn with_slippage_rate(mut self, rate: Decimal) -> Self {
        self.slippage_rate = rate;
        self
    }

    /// 마찰 비용 없는 설정. 판정 로직 테스트용.
    pub fn frictionless(initial_capital: Decimal) -> Self {
        Self {
            initial_capital,
            commission_rate: Decimal::ZERO,
            slippage_rate: Decimal::ZERO,
        }
    }
}

/// 일별 자산 곡선의 한 점.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    /// 현금 + 보유 평가액 (당일 종가 기준)
    pub equity: Decimal,
}

/// 요약 성과 지표.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub initial_capital: Decimal,
    pub final_equity: Decimal,
    pub total_return_pct: Decimal,
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: Decimal,
    pub avg_win_pct: Decimal,
    pub avg_loss_pct: Decimal,
    pub max_drawdown_pct: Decimal,
    /// 일 수익률 기반 연율화 샤프 비율
    pub sharpe_ratio: f64,
}

/// 백테스트 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub params: StrategyParams,
    pub config: BacktestConfig,
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
    pub metrics: SummaryMetrics,
}

/// 실행 중 상태. 실행마다 독점 소유합니다.
struct RunState {
    ledger: PositionLedger,
    history: TradeHistory,
    guard_state: GuardState,
    /// 종목별 마지막 관측 가격 (자산 평가용)
    last_price: HashMap<String, Decimal>,
}

/// 백테스트 엔진.
#[derive(Debug, Clone)]
pub struct BacktestEngine {
    params: StrategyParams,
    config: BacktestConfig,
}

impl BacktestEngine {
    pub fn new(params: StrategyParams, config: BacktestConfig) -> Self {
        Self { params, config }
    }

    /// 종가 베팅 판단 시각 (KST).
    fn closing_bell(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(15, 10, 0).unwrap()
    }

    /// 매수 체결가. 슬리피지와 수수료를 가격에 반영합니다.
    fn buy_fill(&self, price: Decimal) -> Decimal {
        price * (Decimal::ONE + self.config.slippage_rate + self.config.commission_rate)
    }

    /// 매도 체결가.
    fn sell_fill(&self, price: Decimal) -> Decimal {
        price * (Decimal::ONE - self.config.slippage_rate - self.config.commission_rate)
    }

    /// 전체 기간 재생.
    pub fn run(&self, data: &HistoricalData) -> Result<BacktestReport, BacktestError> {
        self.params.validate()?;
        let days = data.trading_days();
        if days.is_empty() {
            return Err(BacktestError::EmptyData);
        }

        let pipeline = EntryPipeline::new(&self.params);
        let guard = RiskGuard::new(&self.params);
        let machine = ExitStateMachine::new(&self.params);
        let sizer = KellyCriterion::new(&self.params);

        let mut state = RunState {
            ledger: PositionLedger::new(self.config.initial_capital),
            history: TradeHistory::in_memory(),
            guard_state: GuardState::new(days[0]),
            last_price: HashMap::new(),
        };
        let mut equity_curve = Vec::with_capacity(days.len());

        for &day in days {
            state.guard_state.roll_over(day);
            self.replay_morning(day, data, &machine, &guard, &mut state)?;
            self.replay_closing_bell(day, data, &pipeline, &guard, &sizer, &mut state)?;
            equity_curve.push(EquityPoint {
                date: day,
                equity: state.ledger.equity(&state.last_price),
            });
        }

        self.liquidate_remaining(*days.last().unwrap(), &mut state)?;

        let trades = state.history.records().to_vec();
        let metrics = self.summarize(&trades, &equity_curve, &state);
        Ok(BacktestReport {
            params: self.params.clone(),
            config: self.config.clone(),
            trades,
            equity_curve,
            metrics,
        })
    }

    /// 오전 청산 재생. 전일 진입 포지션마다 당일 분봉을 시간 순으로
    /// 한 틱씩 먹이며 청산 상태머신을 평가합니다.
    fn replay_morning(
        &self,
        day: NaiveDate,
        data: &HistoricalData,
        machine: &ExitStateMachine,
        guard: &RiskGuard,
        state: &mut RunState,
    ) -> Result<(), BacktestError> {
        let index_change = data.index_change(day);

        for id in state.ledger.position_ids() {
            let Some(position) = state.ledger.position(id).cloned() else {
                continue;
            };
            let symbol = position.symbol.clone();
            let bars = data.day_minute_bars(&symbol, day);

            if bars.is_empty() {
                // 분봉이 없는 날은 일봉 시가로 강제 청산
                let price = data
                    .symbol(&symbol)
                    .and_then(|h| h.daily_bar(day))
                    .map(|b| b.open)
                    .unwrap_or(position.entry_price);
                self.force_close(id, day, price, guard, state)?;
                continue;
            }

            let open_price = bars[0].open;
            for i in 0..bars.len() {
                let Some(current) = state.ledger.position(id) else {
                    break;
                };
                let recent: Vec<_> = bars[..=i].iter().rev().copied().collect();
                let ctx = ExitContext {
                    now_kst: kst_time(bars[i].timestamp),
                    current_price: bars[i].close,
                    index_change_pct: index_change,
                    open_price,
                    minute_bars: &recent,
                };

                match machine.evaluate(current, &ctx) {
                    ExitDecision::Hold => {}
                    ExitDecision::FullClose { reason }
                    | ExitDecision::TierClose {
                        reason, last: true, ..
                    } => {
                        let record = state.ledger.close(
                            id,
                            self.sell_fill(bars[i].close),
                            reason,
                            bars[i].timestamp,
                        )?;
                        guard.record_trade_result(&mut state.guard_state, &record);
                        state.history.append(record)?;
                        break;
                    }
                    ExitDecision::TierClose { tier_index, .. } => {
                        state.ledger.partial_close(
                            id,
                            tier_index,
                            self.sell_fill(bars[i].close),
                        )?;
                    }
                }
            }

            // 분봉이 강제 청산 시각 전에 끊겼으면 마지막 봉으로 정리
            if state.ledger.position(id).is_some() {
                let last = bars[bars.len() - 1];
                debug!(%symbol, %day, "분봉 조기 종료, 마지막 봉으로 강제 청산");
                self.force_close(id, day, last.close, guard, state)?;
            }

            if let Some(last) = bars.last() {
                state.last_price.insert(symbol, last.close);
            }
        }

        Ok(())
    }

    fn force_close(
        &self,
        id: uuid::Uuid,
        day: NaiveDate,
        price: Decimal,
        guard: &RiskGuard,
        state: &mut RunState,
    ) -> Result<(), BacktestError> {
        let time = kst_datetime(day, self.params.time_fallback);
        let record = state
            .ledger
            .close(id, self.sell_fill(price), ExitReason::TimeFallback, time)?;
        guard.record_trade_result(&mut state.guard_state, &record);
        state.history.append(record)?;
        Ok(())
    }

    /// 종가 베팅 재생. 당일 15:10 KST 커서로 잘린 데이터만 파이프라인에
    /// 공급합니다.
    ///
    /// 당일 일봉은 장 마감(15:30)에야 확정되므로 판단 입력으로 쓰지
    /// 않습니다. 벨 이전 분봉 누적으로 당일 봉을 합성하며, 벨 이전
    /// 관측치가 없는 종목은 그날 판단 대상에서 빠집니다.
    fn replay_closing_bell(
        &self,
        day: NaiveDate,
        data: &HistoricalData,
        pipeline: &EntryPipeline,
        guard: &RiskGuard,
        sizer: &KellyCriterion,
        state: &mut RunState,
    ) -> Result<(), BacktestError> {
        let bell = self.closing_bell();
        let now = kst_datetime(day, bell);

        let mut candidates = Vec::new();
        for history in data.symbols() {
            // 시가는 09:00에 확정된 관측치라 그대로 씁니다
            let Some(day_open) = history.daily_bar(day).map(|b| b.open) else {
                continue;
            };
            let minute_bars = data.minute_bars_until(&history.symbol, day, bell);
            let Some(latest) = minute_bars.first() else {
                debug!(symbol = %history.symbol, %day, "벨 이전 분봉 없음, 제외");
                continue;
            };
            let price = latest.close;
            let session = session_bar(day, day_open, price, &minute_bars);

            let mut daily_bars = data.daily_bars_until(&history.symbol, day);
            if let Some(current) = daily_bars.first_mut() {
                if current.date == day {
                    *current = session;
                }
            }

            let prev_close = daily_bars.get(1).map(|b| b.close);
            let change_rate = match prev_close {
                Some(prev) if !prev.is_zero() => (price - prev) / prev * dec!(100),
                _ => Decimal::ZERO,
            };

            // 장 마감 평가액용. 판단에는 쓰지 않습니다
            if let Some(close) = history.daily_bar(day).map(|b| b.close) {
                state.last_price.insert(history.symbol.clone(), close);
            }
            candidates.push(CandidateData {
                snapshot: Snapshot {
                    symbol: history.symbol.clone(),
                    name: history.name.clone(),
                    timestamp: now,
                    price,
                    open_price: day_open,
                    volume: session.volume,
                    // 거래대금 근사: 벨 시점 가격 × 벨 이전 누적 거래량
                    trading_value: price * session.volume,
                    change_rate,
                    flow: data.flow(&history.symbol, day),
                },
                daily_bars,
                minute_bars,
                headlines: data.headlines(&history.symbol, day),
            });
        }

        let stats = state.history.statistics(self.params.kelly_recent_trades);
        let ctx = SizingContext {
            stats: &stats,
            score: Decimal::ZERO,
            consecutive_losses: state.guard_state.consecutive_losses,
            daily_pnl_pct: state.guard_state.daily_pnl_pct,
        };
        let results = pipeline.evaluate(&candidates, bell, sizer, &ctx);

        for result in results.iter().filter(|r| r.approved()) {
            if guard.can_enter(&state.guard_state, day, bell).is_err() {
                break;
            }
            self.try_open(result, &candidates, now, guard, state)?;
        }

        Ok(())
    }

    fn try_open(
        &self,
        result: &EnsembleResult,
        candidates: &[CandidateData],
        now: chrono::DateTime<chrono::Utc>,
        guard: &RiskGuard,
        state: &mut RunState,
    ) -> Result<(), BacktestError> {
        let Some(candidate) = candidates
            .iter()
            .find(|c| c.snapshot.symbol == result.symbol)
        else {
            return Ok(());
        };

        let fill = self.buy_fill(candidate.snapshot.price);
        match state.ledger.open(
            &result.symbol,
            &result.name,
            result.weight,
            fill,
            now,
            &self.params,
        ) {
            Ok(_) => {
                guard.record_entry(&mut state.guard_state);
                Ok(())
            }
            Err(LedgerError::ZeroQuantity { .. }) | Err(LedgerError::InsufficientFunds { .. }) => {
                Ok(())
            }
            Err(error) => Err(error.into()),
        }
    }

    /// 기간 종료 후 잔여 포지션 정리. 마지막 관측가로 청산하며 가드에는
    /// 반영하지 않습니다.
    fn liquidate_remaining(
        &self,
        last_day: NaiveDate,
        state: &mut RunState,
    ) -> Result<(), BacktestError> {
        let time = kst_datetime(last_day, NaiveTime::from_hms_opt(15, 30, 0).unwrap());
        for id in state.ledger.position_ids() {
            let Some(position) = state.ledger.position(id).cloned() else {
                continue;
            };
            let price = state
                .last_price
                .get(&position.symbol)
                .copied()
                .unwrap_or(position.entry_price);
            let record =
                state
                    .ledger
                    .close(id, self.sell_fill(price), ExitReason::EndOfReplay, time)?;
            state.history.append(record)?;
        }
        Ok(())
    }

    fn summarize(
        &self,
        trades: &[TradeRecord],
        equity_curve: &[EquityPoint],
        state: &RunState,
    ) -> SummaryMetrics {
        let final_equity = state.ledger.equity(&state.last_price);
        let total_return_pct = if self.config.initial_capital.is_zero() {
            Decimal::ZERO
        } else {
            (final_equity - self.config.initial_capital) / self.config.initial_capital * dec!(100)
        };

        let stats = state.history.statistics(usize::MAX);

        SummaryMetrics {
            initial_capital: self.config.initial_capital,
            final_equity,
            total_return_pct,
            trades: trades.len(),
            wins: stats.wins,
            losses: stats.losses,
            win_rate: stats.win_rate,
            avg_win_pct: stats.avg_win_pct,
            avg_loss_pct: stats.avg_loss_pct,
            max_drawdown_pct: max_drawdown_pct(equity_curve),
            sharpe_ratio: annualized_sharpe(equity_curve),
        }
    }
}

/// 벨 이전 분봉 누적으로 합성한 당일 봉 (최신 순 슬라이스 기준).
/// 고가/저가는 관측된 범위에 시가를 포함합니다.
fn session_bar(day: NaiveDate, open: Decimal, close: Decimal, bars: &[MinuteBar]) -> DailyBar {
    let mut high = open;
    let mut low = open;
    let mut volume = Decimal::ZERO;
    for bar in bars {
        if bar.high > high {
            high = bar.high;
        }
        if bar.low < low {
            low = bar.low;
        }
        volume += bar.volume;
    }
    DailyBar {
        date: day,
        open,
        high,
        low,
        close,
        volume,
    }
}

/// 자산 곡선의 최대 낙폭 (%).
fn max_drawdown_pct(curve: &[EquityPoint]) -> Decimal {
    let mut peak = Decimal::ZERO;
    let mut max_dd = Decimal::ZERO;
    for point in curve {
        if point.equity > peak {
            peak = point.equity;
        }
        if !peak.is_zero() {
            let dd = (peak - point.equity) / peak * dec!(100);
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// 일 수익률 기반 연율화 샤프 비율. 수익률 분산이 0이면 0.
fn annualized_sharpe(curve: &[EquityPoint]) -> f64 {
    if curve.len() < 2 {
        return 0.0;
    }
    let returns: Vec<f64> = curve
        .windows(2)
        .filter_map(|w| {
            let prev = w[0].equity.to_f64()?;
            let next = w[1].equity.to_f64()?;
            if prev == 0.0 {
                None
            } else {
                Some(next / prev - 1.0)
            }
        })
        .collect();
    if returns.len() < 2 {
        return 0.0;
    }

    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance =
        returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (returns.len() - 1) as f64;
    let std = variance.sqrt();
    if std == 0.0 {
        return 0.0;
    }
    // 연간 거래일 252일 기준
    mean / std * 252.0_f64.sqrt()
}
