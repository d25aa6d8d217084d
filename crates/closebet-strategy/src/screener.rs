//! 거래대금 스크리닝.
//!
//! 거래대금 플로어(기본 2000억) 미만 종목은 무조건 제외하고, 통과
//! 종목을 거래대금 내림차순으로 정렬해 상위 N개만 후보로 남깁니다.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, info};

use closebet_core::{PartialScore, PhaseSignals, ScorePhase, ScreenSignals, Snapshot, StrategyParams};

/// 스크리닝을 통과한 후보.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenedCandidate {
    /// 원본 스냅샷
    pub snapshot: Snapshot,
    /// 스크리닝 단계 부분 점수
    pub partial: PartialScore,
}

/// 거래대금 스크리너.
#[derive(Debug, Clone)]
pub struct Screener {
    min_trading_value: Decimal,
    dominant_trading_value: Decimal,
    top_n: usize,
}

impl Screener {
    pub fn new(params: &StrategyParams) -> Self {
        Self {
            min_trading_value: params.min_trading_value,
            dominant_trading_value: params.dominant_trading_value,
            top_n: params.top_n,
        }
    }

    /// 스냅샷 목록에서 후보를 선별합니다.
    ///
    /// 플로어 미만 거래대금 종목은 점수와 무관하게 제외됩니다. 통과
    /// 종목의 스크리닝 점수는 거래대금 순위에 비례합니다 (1위 100점,
    /// 이후 등분 감소).
    pub fn screen(&self, snapshots: &[Snapshot]) -> Vec<ScreenedCandidate> {
        let mut admitted: Vec<&Snapshot> = snapshots
            .iter()
            .filter(|s| s.trading_value >= self.min_trading_value)
            .collect();

        debug!(
            total = snapshots.len(),
            admitted = admitted.len(),
            "거래대금 플로어 필터링"
        );

        admitted.sort_by(|a, b| b.trading_value.cmp(&a.trading_value));
        admitted.truncate(self.top_n);

        let top_n = Decimal::from(self.top_n as u64);
        let candidates: Vec<ScreenedCandidate> = admitted
            .into_iter()
            .enumerate()
            .map(|(idx, snapshot)| {
                let rank = idx + 1;
                let dominant = snapshot.trading_value >= self.dominant_trading_value;
                if dominant {
                    info!(
                        symbol = %snapshot.symbol,
                        name = %snapshot.name,
                        trading_value = %snapshot.trading_value,
                        "주도주 후보"
                    );
                }

                // 순위 비례 점수: 1위 100, 이후 등분 감소
                let value = dec!(100) * Decimal::from((self.top_n - idx) as u64) / top_n;
                let signals = PhaseSignals::Screen(ScreenSignals {
                    trading_value: snapshot.trading_value,
                    rank,
                    dominant,
                });

                ScreenedCandidate {
                    snapshot: snapshot.clone(),
                    partial: PartialScore::new(ScorePhase::Screen, value, signals),
                }
            })
            .collect();

        info!(candidates = candidates.len(), "스크리닝 완료");
        candidates
    }
}
