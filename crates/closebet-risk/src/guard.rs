//! 진입 리스크 가드.
//!
//! 하루 최대 진입 횟수, 연속 손실 쿨다운, 일일 손실 한도를 강제합니다.
//! 차단은 오류가 아니라 판단 결과입니다. 상태가 오늘 날짜가 아니면
//! 무조건 차단합니다 (fail-closed). 날짜 전환은 호출자가
//! `GuardState::roll_over`로 명시적으로 수행합니다.

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, warn};

use closebet_core::{GuardState, StrategyParams, TradeRecord};

/// 진입 차단 사유.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GuardBlock {
    /// 가드 상태의 거래일이 오늘이 아님
    #[error("가드 상태 날짜 불일치 (상태: {state_day}, 오늘: {today})")]
    StaleState { state_day: NaiveDate, today: NaiveDate },
    /// 진입 윈도우 밖
    #[error("진입 윈도우 밖 ({now})")]
    OutsideWindow { now: NaiveTime },
    /// 일일 최대 진입 횟수 도달
    #[error("일일 최대 진입 횟수 도달 ({entries}회)")]
    MaxEntries { entries: u32 },
    /// 연속 손실 쿨다운
    #[error("연속 {losses}회 손실, 쿨다운 중")]
    LossStreak { losses: u32 },
    /// 일일 손실 한도 도달
    #[error("일일 손실 한도 도달 ({daily_pnl_pct}%)")]
    DailyLossFloor { daily_pnl_pct: Decimal },
}

/// 진입 가드.
#[derive(Debug, Clone)]
pub struct RiskGuard {
    entry_window_start: NaiveTime,
    entry_window_end: NaiveTime,
    max_entries_per_day: u32,
    loss_streak_cooldown: u32,
    daily_loss_floor_pct: Decimal,
}

impl RiskGuard {
    pub fn new(params: &StrategyParams) -> Self {
        Self {
            entry_window_start: params.entry_window_start,
            entry_window_end: params.entry_window_end,
            max_entries_per_day: params.max_entries_per_day,
            loss_streak_cooldown: params.loss_streak_cooldown,
            daily_loss_floor_pct: params.daily_loss_floor_pct,
        }
    }

    /// 진입 가능 여부 판정.
    ///
    /// 검사 순서: 상태 날짜 → 진입 윈도우 → 진입 횟수 → 연패 →
    /// 일일 손실. 첫 위반에서 멈춥니다.
    pub fn can_enter(
        &self,
        state: &GuardState,
        today: NaiveDate,
        now_kst: NaiveTime,
    ) -> Result<(), GuardBlock> {
        if state.trading_day != today {
            warn!(
                state_day = %state.trading_day,
                %today,
                "가드 상태 날짜 불일치, 진입 차단"
            );
            return Err(GuardBlock::StaleState {
                state_day: state.trading_day,
                today,
            });
        }

        if !closebet_core::clock::in_window(now_kst, self.entry_window_start, self.entry_window_end)
        {
            return Err(GuardBlock::OutsideWindow { now: now_kst });
        }

        if state.entries_today >= self.max_entries_per_day {
            return Err(GuardBlock::MaxEntries {
                entries: state.entries_today,
            });
        }

        if state.consecutive_losses >= self.loss_streak_cooldown {
            return Err(GuardBlock::LossStreak {
                losses: state.consecutive_losses,
            });
        }

        if state.daily_pnl_pct <= self.daily_loss_floor_pct {
            return Err(GuardBlock::DailyLossFloor {
                daily_pnl_pct: state.daily_pnl_pct,
            });
        }

        Ok(())
    }

    /// 진입 확정 기록. 주문이 실제로 집행된 뒤에만 호출합니다.
    pub fn record_entry(&self, state: &mut GuardState) {
        state.entries_today += 1;
        info!(entries = state.entries_today, "진입 기록");
    }

    /// 거래 종결 기록. 종결된 거래당 정확히 한 번, 종결 순서대로
    /// 호출합니다.
    pub fn record_trade_result(&self, state: &mut GuardState, record: &TradeRecord) {
        if record.is_win() {
            state.consecutive_losses = 0;
        } else if record.is_loss() {
            state.consecutive_losses += 1;
        }
        state.daily_pnl_pct += record.pnl_pct;

        info!(
            symbol = %record.symbol,
            pnl_pct = %record.pnl_pct,
            losses = state.consecutive_losses,
            daily_pnl_pct = %state.daily_pnl_pct,
            "거래 결과 반영"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use closebet_core::ExitReason;

    fn guard() -> RiskGuard {
        RiskGuard::new(&StrategyParams::default())
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()
    }

    fn in_window() -> NaiveTime {
        NaiveTime::from_hms_opt(14, 45, 0).unwrap()
    }

    fn record(pnl_pct: Decimal) -> TradeRecord {
        let entry_time = Utc.with_ymd_and_hms(2025, 6, 30, 6, 50, 0).unwrap();
        TradeRecord {
            id: Uuid::new_v4(),
            position_id: Uuid::new_v4(),
            symbol: "005930".to_string(),
            name: "삼성전자".to_string(),
            entry_price: dec!(10000),
            exit_price: dec!(10000) * (Decimal::ONE + pnl_pct / dec!(100)),
            quantity: dec!(10),
            entry_time,
            exit_time: entry_time + chrono::Duration::hours(18),
            pnl: dec!(1000) * pnl_pct,
            pnl_pct,
            holding_minutes: 1080,
            exit_reason: ExitReason::TimeFallback,
        }
    }

    #[test]
    fn fresh_state_in_window_allows_entry() {
        let state = GuardState::new(today());
        assert!(guard().can_enter(&state, today(), in_window()).is_ok());
    }

    #[test]
    fn stale_state_fails_closed() {
        let yesterday = today().pred_opt().unwrap();
        let state = GuardState::new(yesterday);

        let block = guard().can_enter(&state, today(), in_window()).unwrap_err();
        assert!(matches!(block, GuardBlock::StaleState { .. }));

        // 미래 날짜 상태도 동일하게 차단
        let tomorrow = today().succ_opt().unwrap();
        let state = GuardState::new(tomorrow);
        let block = guard().can_enter(&state, today(), in_window()).unwrap_err();
        assert!(matches!(block, GuardBlock::StaleState { .. }));
    }

    #[test]
    fn outside_entry_window_blocks() {
        let state = GuardState::new(today());
        let morning = NaiveTime::from_hms_opt(10, 0, 0).unwrap();

        let block = guard().can_enter(&state, today(), morning).unwrap_err();
        assert!(matches!(block, GuardBlock::OutsideWindow { .. }));
    }

    #[test]
    fn window_boundaries_are_inclusive() {
        let state = GuardState::new(today());
        let g = guard();

        let start = NaiveTime::from_hms_opt(14, 30, 0).unwrap();
        let end = NaiveTime::from_hms_opt(15, 20, 0).unwrap();
        assert!(g.can_enter(&state, today(), start).is_ok());
        assert!(g.can_enter(&state, today(), end).is_ok());
    }

    #[test]
    fn max_entries_blocks_fourth_attempt() {
        let g = guard();
        let mut state = GuardState::new(today());

        for _ in 0..3 {
            assert!(g.can_enter(&state, today(), in_window()).is_ok());
            g.record_entry(&mut state);
        }

        let block = g.can_enter(&state, today(), in_window()).unwrap_err();
        assert!(matches!(block, GuardBlock::MaxEntries { entries: 3 }));
    }

    #[test]
    fn three_consecutive_losses_trigger_cooldown() {
        let g = guard();
        let mut state = GuardState::new(today());

        for _ in 0..3 {
            g.record_trade_result(&mut state, &record(dec!(-1.0)));
        }

        let block = g.can_enter(&state, today(), in_window()).unwrap_err();
        assert!(matches!(block, GuardBlock::LossStreak { losses: 3 }));
    }

    #[test]
    fn win_resets_loss_streak() {
        let g = guard();
        let mut state = GuardState::new(today());

        g.record_trade_result(&mut state, &record(dec!(-1.0)));
        g.record_trade_result(&mut state, &record(dec!(-1.0)));
        g.record_trade_result(&mut state, &record(dec!(2.0)));

        assert_eq!(state.consecutive_losses, 0);
        assert!(g.can_enter(&state, today(), in_window()).is_ok());
    }

    #[test]
    fn daily_loss_floor_blocks_entry() {
        let g = guard();
        let mut state = GuardState::new(today());

        g.record_trade_result(&mut state, &record(dec!(-3.0)));
        g.record_trade_result(&mut state, &record(dec!(-2.5)));

        let block = g.can_enter(&state, today(), in_window()).unwrap_err();
        assert!(matches!(block, GuardBlock::DailyLossFloor { .. }));
    }

    #[test]
    fn streak_survives_roll_over_and_still_blocks() {
        let g = guard();
        let mut state = GuardState::new(today());

        for _ in 0..3 {
            g.record_trade_result(&mut state, &record(dec!(-1.0)));
        }

        let next_day = today().succ_opt().unwrap();
        state.roll_over(next_day);

        // 일일 카운터는 리셋되지만 연패 쿨다운은 유지
        let block = g.can_enter(&state, next_day, in_window()).unwrap_err();
        assert!(matches!(block, GuardBlock::LossStreak { losses: 3 }));
    }
}
