//! 앙상블 스코어러.
//!
//! 네 단계 부분 점수를 가중 합산해 진입 등급과 포지션 비중을
//! 결정합니다. VETO는 점수와 무관한 절대 거부이며, 누락된 단계는
//! 중립값으로 때우지 않고 VETO와 동일하게 처리합니다.

use rust_decimal::Decimal;
use tracing::info;

use closebet_core::{
    EnsembleResult, EntryTier, PartialScore, ScorePhase, StrategyParams,
};

use crate::sizing::{PositionSizer, SizingContext};

/// 앙상블 스코어러.
#[derive(Debug, Clone)]
pub struct EnsembleScorer {
    weight_screen: Decimal,
    weight_technical: Decimal,
    weight_sentiment: Decimal,
    weight_intraday: Decimal,
    tier_priority_score: Decimal,
    tier_standard_score: Decimal,
    tier_small_score: Decimal,
    max_weight_per_stock: Decimal,
}

impl EnsembleScorer {
    pub fn new(params: &StrategyParams) -> Self {
        Self {
            weight_screen: params.weight_screen,
            weight_technical: params.weight_technical,
            weight_sentiment: params.weight_sentiment,
            weight_intraday: params.weight_intraday,
            tier_priority_score: params.tier_priority_score,
            tier_standard_score: params.tier_standard_score,
            tier_small_score: params.tier_small_score,
            max_weight_per_stock: params.max_weight_per_stock,
        }
    }

    /// 부분 점수를 합산해 최종 결과를 만듭니다.
    ///
    /// `vetoed`가 true이거나 네 단계 중 하나라도 `None`이면 점수와
    /// 무관하게 SKIP, 비중 0입니다.
    #[allow(clippy::too_many_arguments)]
    pub fn combine(
        &self,
        symbol: &str,
        name: &str,
        screen: Option<PartialScore>,
        technical: Option<PartialScore>,
        sentiment: Option<PartialScore>,
        intraday: Option<PartialScore>,
        vetoed: bool,
        sizer: &dyn PositionSizer,
        ctx: &SizingContext<'_>,
    ) -> EnsembleResult {
        let missing_phase =
            screen.is_none() || technical.is_none() || sentiment.is_none() || intraday.is_none();
        let vetoed = vetoed || missing_phase;

        let partials: Vec<PartialScore> = [screen, technical, sentiment, intraday]
            .into_iter()
            .flatten()
            .collect();

        let score: Decimal = partials
            .iter()
            .map(|p| p.value * self.phase_weight(p.phase))
            .sum();

        let entry_tier = if vetoed {
            EntryTier::Skip
        } else {
            self.tier_for(score)
        };

        let weight = if entry_tier == EntryTier::Skip {
            Decimal::ZERO
        } else {
            let sizing_ctx = SizingContext { score, ..*ctx };
            (sizer.fraction(&sizing_ctx) * entry_tier.multiplier())
                .clamp(Decimal::ZERO, self.max_weight_per_stock)
        };

        info!(
            symbol,
            name,
            score = %score,
            vetoed,
            tier = %entry_tier,
            weight = %weight,
            "앙상블 판정"
        );

        EnsembleResult {
            symbol: symbol.to_string(),
            name: name.to_string(),
            score,
            vetoed,
            entry_tier,
            weight,
            partials,
        }
    }

    fn phase_weight(&self, phase: ScorePhase) -> Decimal {
        match phase {
            ScorePhase::Screen => self.weight_screen,
            ScorePhase::Technical => self.weight_technical,
            ScorePhase::Sentiment => self.weight_sentiment,
            ScorePhase::Intraday => self.weight_intraday,
        }
    }

    fn tier_for(&self, score: Decimal) -> EntryTier {
        if score >= self.tier_priority_score {
            EntryTier::Priority
        } else if score >= self.tier_standard_score {
            EntryTier::Standard
        } else if score >= self.tier_small_score {
            EntryTier::Small
        } else {
            EntryTier::Skip
        }
    }
}
