//! 일 단위 가드 상태.
//!
//! 프로세스 전역 싱글턴이 아니라 매 사이클 호출에 명시적으로 전달되는
//! 값입니다. 백테스트는 실행마다 독립된 GuardState를 소유하므로 병렬
//! 파라미터 탐색에서도 공유 상태가 없습니다.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 거래일 단위로 리셋되는 진입 가드 상태.
///
/// RiskGuard만이 명시적 record 호출을 통해 변경합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardState {
    /// 상태가 속한 거래일
    pub trading_day: NaiveDate,
    /// 당일 진입 횟수
    pub entries_today: u32,
    /// 연속 손실 횟수 (수익 발생 시 0으로 리셋)
    pub consecutive_losses: u32,
    /// 당일 누적 손익률 (%)
    pub daily_pnl_pct: Decimal,
}

impl GuardState {
    /// 해당 거래일의 초기 상태를 생성합니다.
    pub fn new(trading_day: NaiveDate) -> Self {
        Self {
            trading_day,
            entries_today: 0,
            consecutive_losses: 0,
            daily_pnl_pct: Decimal::ZERO,
        }
    }

    /// 거래일이 바뀌면 일 단위 카운터를 리셋합니다.
    ///
    /// 연속 손실 스트릭은 날짜가 바뀌어도 유지됩니다. 스트릭은 수익
    /// 거래로만 풀립니다.
    pub fn roll_over(&mut self, today: NaiveDate) {
        if today != self.trading_day {
            self.trading_day = today;
            self.entries_today = 0;
            self.daily_pnl_pct = Decimal::ZERO;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn roll_over_resets_daily_counters_but_keeps_streak() {
        let day1 = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        let day2 = NaiveDate::from_ymd_opt(2025, 3, 17).unwrap();

        let mut state = GuardState::new(day1);
        state.entries_today = 3;
        state.consecutive_losses = 2;
        state.daily_pnl_pct = dec!(-4.2);

        state.roll_over(day2);

        assert_eq!(state.trading_day, day2);
        assert_eq!(state.entries_today, 0);
        assert_eq!(state.daily_pnl_pct, Decimal::ZERO);
        assert_eq!(state.consecutive_losses, 2);
    }

    #[test]
    fn roll_over_same_day_is_noop() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        let mut state = GuardState::new(day);
        state.entries_today = 1;

        state.roll_over(day);
        assert_eq!(state.entries_today, 1);
    }
}
