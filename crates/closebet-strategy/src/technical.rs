//! 기술적 분석 스코어러.
//!
//! 신고가 돌파, 이동평균 정배열, 투자자 수급의 고정 가중치 합산입니다.
//! 조건별 부분 점수는 없습니다. 충족이면 만점, 아니면 0입니다.
//!
//! 일봉 슬라이스는 최신 봉이 앞에 오는 순서를 전제합니다.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use closebet_core::{
    DailyBar, InvestorFlow, PartialScore, PhaseSignals, ScorePhase, StrategyParams,
    TechnicalSignals,
};

use crate::error::ScoreError;

/// 점수 계산에 필요한 최소 일봉 수 (ma60 기준).
const MIN_DAILY_BARS: usize = 60;
/// ma200 추세 신호에 필요한 일봉 수 (lookback 제외).
const MA200_BARS: usize = 200;

/// 기술적 분석 스코어러.
#[derive(Debug, Clone)]
pub struct TechnicalScorer {
    new_high_days: usize,
    pass_score: Decimal,
    ma200_lookback_days: usize,
}

impl TechnicalScorer {
    pub fn new(params: &StrategyParams) -> Self {
        Self {
            new_high_days: params.new_high_days,
            pass_score: params.technical_pass_score,
            ma200_lookback_days: params.ma200_lookback_days,
        }
    }

    /// 기술 점수 계산.
    ///
    /// 신고가 +40, 정배열 +30, 외인+기관 동반 순매수 +30 (한쪽만 +15).
    /// 합계는 [0, 100]. 일봉이 60개 미만이면 부분 계산 없이 오류를
    /// 반환합니다.
    pub fn score(
        &self,
        symbol: &str,
        current_price: Decimal,
        daily_bars: &[DailyBar],
        flow: &InvestorFlow,
    ) -> Result<PartialScore, ScoreError> {
        if daily_bars.len() < MIN_DAILY_BARS {
            return Err(ScoreError::InsufficientHistory {
                symbol: symbol.to_string(),
                required: MIN_DAILY_BARS,
                available: daily_bars.len(),
            });
        }

        let is_new_high = self.is_new_high(current_price, daily_bars);
        let is_aligned = self.is_aligned(daily_bars);
        let ma200_uptrend = self.is_ma200_uptrend(daily_bars);

        let mut value = Decimal::ZERO;
        if is_new_high {
            value += dec!(40);
        }
        if is_aligned {
            value += dec!(30);
        }
        if flow.both_buying() {
            value += dec!(30);
        } else if flow.any_buying() {
            value += dec!(15);
        }

        debug!(
            symbol,
            score = %value,
            new_high = is_new_high,
            aligned = is_aligned,
            ma200_uptrend,
            "기술 점수 산출"
        );

        let signals = PhaseSignals::Technical(TechnicalSignals {
            is_new_high,
            is_aligned,
            ma200_uptrend,
            foreign_buying: flow.foreign_buying(),
            institution_buying: flow.institution_buying(),
        });
        Ok(PartialScore::new(ScorePhase::Technical, value, signals))
    }

    /// 통과 여부 (기본 70점 이상).
    pub fn passes(&self, partial: &PartialScore) -> bool {
        partial.value >= self.pass_score
    }

    /// N일 신고가 돌파 여부. 당일 봉(인덱스 0)은 비교 대상에서 제외.
    fn is_new_high(&self, current_price: Decimal, bars: &[DailyBar]) -> bool {
        let window = &bars[1..(self.new_high_days + 1).min(bars.len())];
        let past_high = window
            .iter()
            .map(|b| b.high)
            .max()
            .unwrap_or(Decimal::ZERO);
        current_price > past_high
    }

    /// 정배열 여부 (ma5 > ma20 > ma60, 전부 엄격 부등호).
    fn is_aligned(&self, bars: &[DailyBar]) -> bool {
        let ma5 = moving_average(bars, 0, 5);
        let ma20 = moving_average(bars, 0, 20);
        let ma60 = moving_average(bars, 0, 60);
        ma5 > ma20 && ma20 > ma60
    }

    /// 200일선 상승 추세. 일봉 부족 시 false (감사용 보조 신호라
    /// 점수에는 반영되지 않음).
    fn is_ma200_uptrend(&self, bars: &[DailyBar]) -> bool {
        if bars.len() < MA200_BARS + self.ma200_lookback_days {
            return false;
        }
        let current = moving_average(bars, 0, MA200_BARS);
        let past = moving_average(bars, self.ma200_lookback_days, MA200_BARS);
        current > past
    }
}

/// offset부터 len개 봉의 종가 단순 평균.
fn moving_average(bars: &[DailyBar], offset: usize, len: usize) -> Decimal {
    let window = &bars[offset..offset + len];
    let sum: Decimal = window.iter().map(|b| b.close).sum();
    sum / Decimal::from(len as u64)
}
