//! 장중 V자 반등 감지.
//!
//! 종가 베팅 구간(기본 15:00-15:20 KST)에서만 동작합니다. 윈도우
//! 밖이거나 마감까지 유효한 패턴이 형성되지 않으면 0점입니다.
//!
//! 분봉 슬라이스는 최신 봉이 앞에 오는 순서를 전제합니다.

use chrono::NaiveTime;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use closebet_core::clock::in_window;
use closebet_core::{IntradaySignals, MinuteBar, PartialScore, PhaseSignals, ScorePhase, StrategyParams};

/// V자 탐색에 필요한 최소 분봉 수.
const MIN_BARS: usize = 5;
/// 고점 탐색 범위 (최근 봉 수).
const HIGH_LOOKBACK: usize = 10;
/// 패턴 강도 가점 상한.
const PATTERN_STRENGTH_CAP: Decimal = dec!(30);

/// V자 반등 패턴 감지기.
#[derive(Debug, Clone)]
pub struct IntradayPatternDetector {
    min_drop_pct: Decimal,
    min_rebound_pct: Decimal,
    signal_threshold: Decimal,
    window_start: NaiveTime,
    window_end: NaiveTime,
}

/// 감지된 V자 패턴.
struct VPattern {
    drop_pct: Decimal,
    rebound_pct: Decimal,
    /// min(하락률, 반등률). 약한 쪽 기준.
    strength: Decimal,
}

impl IntradayPatternDetector {
    pub fn new(params: &StrategyParams) -> Self {
        Self {
            min_drop_pct: params.min_drop_pct,
            min_rebound_pct: params.min_rebound_pct,
            signal_threshold: params.v_signal_threshold,
            window_start: params.intraday_window_start,
            window_end: params.intraday_window_end,
        }
    }

    /// 신호 강도를 계산합니다.
    ///
    /// V자 감지 50 + 패턴 강도(상한 30) + 매수세 60% 이상 20 +
    /// 거래량 급증 10 + 저점 상승 10 + 양의 모멘텀 10, 상한 100.
    pub fn score(&self, symbol: &str, bars: &[MinuteBar], now_kst: NaiveTime) -> PartialScore {
        if !in_window(now_kst, self.window_start, self.window_end) {
            debug!(symbol, %now_kst, "장중 분석 윈도우 밖");
            return Self::zero_score();
        }
        if bars.len() < MIN_BARS {
            debug!(symbol, bars = bars.len(), "분봉 부족");
            return Self::zero_score();
        }

        let v_pattern = self.detect_v_reversal(bars);
        let momentum = volume_weighted_momentum(bars);
        let buying_pressure = bullish_ratio(&bars[..MIN_BARS]);
        let volume_surge = is_volume_surge(bars);
        let price_support = has_rising_lows(&bars[..MIN_BARS]);

        let mut strength = Decimal::ZERO;
        if let Some(v) = &v_pattern {
            strength += dec!(50);
            strength += v.strength.min(PATTERN_STRENGTH_CAP);
        }
        if buying_pressure >= dec!(60) {
            strength += dec!(20);
        }
        if volume_surge {
            strength += dec!(10);
        }
        if price_support {
            strength += dec!(10);
        }
        if momentum > dec!(20) {
            strength += dec!(10);
        }

        debug!(
            symbol,
            strength = %strength,
            v_detected = v_pattern.is_some(),
            %buying_pressure,
            volume_surge,
            price_support,
            %momentum,
            "장중 신호 강도"
        );

        let (drop_pct, rebound_pct) = v_pattern
            .as_ref()
            .map(|v| (v.drop_pct, v.rebound_pct))
            .unwrap_or((Decimal::ZERO, Decimal::ZERO));

        let signals = PhaseSignals::Intraday(IntradaySignals {
            v_detected: v_pattern.is_some(),
            drop_pct,
            rebound_pct,
            buying_pressure,
            volume_surge,
            price_support,
            momentum,
        });
        PartialScore::new(ScorePhase::Intraday, strength, signals)
    }

    /// 진입 신호 여부 (기본 70점 이상).
    pub fn is_signal(&self, partial: &PartialScore) -> bool {
        partial.value >= self.signal_threshold
    }

    /// V자 반등 패턴 탐지.
    ///
    /// 최근 고점에서 min_drop 이상 하락 후 저점에서 min_rebound 이상
    /// 반등. 저점이 최신 봉이면 반등이 시작되지 않은 것으로 봅니다.
    fn detect_v_reversal(&self, bars: &[MinuteBar]) -> Option<VPattern> {
        // 과거 → 현재 순으로 뒤집어 분석
        let candles: Vec<&MinuteBar> = bars.iter().rev().collect();
        let len = candles.len();

        let search_start = len.saturating_sub(HIGH_LOOKBACK);
        let (high_idx, high_bar) = candles[search_start..]
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.high.cmp(&b.high))
            .map(|(i, b)| (search_start + i, *b))?;

        // 고점이 너무 최근이면 패턴 미형성
        if high_idx >= len - 2 {
            return None;
        }

        let (low_offset, low_bar) = candles[high_idx + 1..]
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.low.cmp(&b.low))
            .map(|(i, b)| (i, *b))?;
        let low_idx = high_idx + 1 + low_offset;

        let current_price = candles[len - 1].close;
        if high_bar.high.is_zero() || low_bar.low.is_zero() {
            return None;
        }

        let drop_pct = (high_bar.high - low_bar.low) / high_bar.high * dec!(100);
        let rebound_pct = (current_price - low_bar.low) / low_bar.low * dec!(100);

        let is_v = drop_pct >= self.min_drop_pct
            && rebound_pct >= self.min_rebound_pct
            && low_idx < len - 1;
        if !is_v {
            return None;
        }

        Some(VPattern {
            drop_pct,
            rebound_pct,
            strength: drop_pct.min(rebound_pct),
        })
    }

    fn zero_score() -> PartialScore {
        let signals = PhaseSignals::Intraday(IntradaySignals {
            v_detected: false,
            drop_pct: Decimal::ZERO,
            rebound_pct: Decimal::ZERO,
            buying_pressure: Decimal::ZERO,
            volume_surge: false,
            price_support: false,
            momentum: Decimal::ZERO,
        });
        PartialScore::new(ScorePhase::Intraday, Decimal::ZERO, signals)
    }
}

/// 최근 5봉 거래량 가중 가격 변화율, ×10 후 [-100, 100] 클리핑.
fn volume_weighted_momentum(bars: &[MinuteBar]) -> Decimal {
    if bars.len() < 3 {
        return Decimal::ZERO;
    }
    let recent = &bars[..MIN_BARS.min(bars.len())];
    let total_volume: Decimal = recent.iter().map(|b| b.volume).sum();
    if total_volume.is_zero() {
        return Decimal::ZERO;
    }

    let mut weighted_change = Decimal::ZERO;
    for bar in recent {
        if bar.open.is_zero() {
            continue;
        }
        let change_pct = (bar.close - bar.open) / bar.open * dec!(100);
        weighted_change += change_pct * bar.volume / total_volume;
    }
    (weighted_change * dec!(10)).clamp(dec!(-100), dec!(100))
}

/// 양봉 비율 (%).
fn bullish_ratio(bars: &[MinuteBar]) -> Decimal {
    if bars.is_empty() {
        return Decimal::ZERO;
    }
    let bullish = bars.iter().filter(|b| b.is_bullish()).count();
    Decimal::from(bullish as u64) / Decimal::from(bars.len() as u64) * dec!(100)
}

/// 최근 5봉 평균 거래량이 직전 5봉 대비 1.5배 초과인지 여부.
fn is_volume_surge(bars: &[MinuteBar]) -> bool {
    let recent = &bars[..MIN_BARS.min(bars.len())];
    let previous = if bars.len() >= MIN_BARS * 2 {
        &bars[MIN_BARS..MIN_BARS * 2]
    } else {
        recent
    };

    let recent_avg: Decimal =
        recent.iter().map(|b| b.volume).sum::<Decimal>() / Decimal::from(recent.len() as u64);
    let previous_avg: Decimal =
        previous.iter().map(|b| b.volume).sum::<Decimal>() / Decimal::from(previous.len() as u64);
    recent_avg > previous_avg * dec!(1.5)
}

/// 저점이 시간 순으로 상승 중인지 여부 (최신 봉이 앞인 슬라이스 기준).
fn has_rising_lows(bars: &[MinuteBar]) -> bool {
    bars.windows(2).all(|w| w[0].low >= w[1].low)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bar(minutes_ago: i64, open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> MinuteBar {
        let base = Utc.with_ymd_and_hms(2025, 6, 30, 6, 10, 0).unwrap();
        MinuteBar {
            timestamp: base - chrono::Duration::minutes(minutes_ago),
            open,
            high,
            low,
            close,
            volume: dec!(10000),
        }
    }

    fn in_window_time() -> NaiveTime {
        NaiveTime::from_hms_opt(15, 10, 0).unwrap()
    }

    /// 고점 10300 → 저점 10100 (-1.94%) → 현재 10250 (+1.49%)의
    /// V자 형태 분봉 (최신 순).
    fn v_shaped_bars() -> Vec<MinuteBar> {
        vec![
            bar(0, dec!(10200), dec!(10260), dec!(10190), dec!(10250)),
            bar(1, dec!(10150), dec!(10210), dec!(10140), dec!(10200)),
            bar(2, dec!(10110), dec!(10160), dec!(10105), dec!(10150)),
            bar(3, dec!(10140), dec!(10150), dec!(10100), dec!(10110)),
            bar(4, dec!(10250), dec!(10260), dec!(10140), dec!(10150)),
            bar(5, dec!(10280), dec!(10300), dec!(10240), dec!(10250)),
            bar(6, dec!(10240), dec!(10280), dec!(10230), dec!(10280)),
        ]
    }

    #[test]
    fn outside_window_scores_zero() {
        let detector = IntradayPatternDetector::new(&StrategyParams::default());
        let late = NaiveTime::from_hms_opt(15, 25, 0).unwrap();

        let partial = detector.score("005930", &v_shaped_bars(), late);
        assert_eq!(partial.value, Decimal::ZERO);
    }

    #[test]
    fn v_pattern_detected_inside_window() {
        let detector = IntradayPatternDetector::new(&StrategyParams::default());
        let partial = detector.score("005930", &v_shaped_bars(), in_window_time());

        match &partial.signals {
            PhaseSignals::Intraday(s) => {
                assert!(s.v_detected);
                assert!(s.drop_pct >= dec!(1.0));
                assert!(s.rebound_pct >= dec!(0.5));
            }
            other => panic!("unexpected signals: {:?}", other),
        }
        // V자 50 + 패턴 강도 + 매수세/지지 가점
        assert!(partial.value >= dec!(50));
    }

    #[test]
    fn flat_bars_give_no_pattern() {
        let detector = IntradayPatternDetector::new(&StrategyParams::default());
        let bars: Vec<MinuteBar> = (0..10)
            .map(|i| bar(i, dec!(10000), dec!(10005), dec!(9995), dec!(10000)))
            .collect();

        let partial = detector.score("005930", &bars, in_window_time());
        match &partial.signals {
            PhaseSignals::Intraday(s) => assert!(!s.v_detected),
            _ => unreachable!(),
        }
        assert!(partial.value < dec!(50));
    }

    #[test]
    fn too_few_bars_score_zero() {
        let detector = IntradayPatternDetector::new(&StrategyParams::default());
        let bars = vec![bar(0, dec!(10000), dec!(10010), dec!(9990), dec!(10005))];

        let partial = detector.score("005930", &bars, in_window_time());
        assert_eq!(partial.value, Decimal::ZERO);
    }

    #[test]
    fn signal_threshold_gates_entry() {
        let detector = IntradayPatternDetector::new(
            &StrategyParams::default().with_v_signal_threshold(dec!(50)),
        );
        let partial = detector.score("005930", &v_shaped_bars(), in_window_time());
        assert!(detector.is_signal(&partial));
    }
}
