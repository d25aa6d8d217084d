//! 진입 판단 파이프라인.
//!
//! 스크리닝 → 기술 점수 게이트 → VETO/감성 → 장중 V자 → 앙상블을
//! 한 번에 돌리는 조합 계층입니다. 라이브 엔진과 백테스터가 같은
//! 파이프라인을 호출하므로 두 경로의 판단이 갈릴 수 없습니다.
//!
//! 데이터 조회는 호출자가 끝낸 상태로 들어옵니다. 파이프라인 자체는
//! 동기 순수 함수입니다.

use chrono::NaiveTime;
use tracing::info;

use closebet_core::{DailyBar, EnsembleResult, MinuteBar, NewsItem, Snapshot, StrategyParams};

use crate::ensemble::EnsembleScorer;
use crate::intraday::IntradayPatternDetector;
use crate::screener::Screener;
use crate::sizing::{PositionSizer, SizingContext};
use crate::technical::TechnicalScorer;
use crate::veto::VetoScanner;

/// 한 종목의 평가 입력 묶음.
#[derive(Debug, Clone)]
pub struct CandidateData {
    /// 현재 시세 스냅샷
    pub snapshot: Snapshot,
    /// 일봉 (최신 순)
    pub daily_bars: Vec<DailyBar>,
    /// 분봉 (최신 순)
    pub minute_bars: Vec<MinuteBar>,
    /// 최근 뉴스/토론방 항목
    pub headlines: Vec<NewsItem>,
}

/// 진입 판단 파이프라인.
pub struct EntryPipeline {
    screener: Screener,
    technical: TechnicalScorer,
    veto: VetoScanner,
    intraday: IntradayPatternDetector,
    ensemble: EnsembleScorer,
}

impl EntryPipeline {
    pub fn new(params: &StrategyParams) -> Self {
        Self {
            screener: Screener::new(params),
            technical: TechnicalScorer::new(params),
            veto: VetoScanner::new(),
            intraday: IntradayPatternDetector::new(params),
            ensemble: EnsembleScorer::new(params),
        }
    }

    /// 후보 전체를 평가해 점수 내림차순 결과를 반환합니다.
    ///
    /// 거래대금 플로어 미달과 기술 점수 게이트 미달 종목은 결과에서
    /// 제외됩니다. 히스토리 부족 종목과 V자 신호 기준 미달 종목은
    /// VETO 동급으로 결과에 남습니다 (감사 목적). 진입 대상은
    /// `EnsembleResult::approved`로 거릅니다.
    pub fn evaluate(
        &self,
        candidates: &[CandidateData],
        now_kst: NaiveTime,
        sizer: &dyn PositionSizer,
        ctx: &SizingContext<'_>,
    ) -> Vec<EnsembleResult> {
        let snapshots: Vec<Snapshot> = candidates.iter().map(|c| c.snapshot.clone()).collect();
        let screened = self.screener.screen(&snapshots);

        let mut results = Vec::with_capacity(screened.len());
        for candidate in screened {
            let symbol = candidate.snapshot.symbol.clone();
            let name = candidate.snapshot.name.clone();
            let Some(data) = candidates.iter().find(|c| c.snapshot.symbol == symbol) else {
                continue;
            };

            let technical = match self.technical.score(
                &symbol,
                data.snapshot.price,
                &data.daily_bars,
                &data.snapshot.flow,
            ) {
                Ok(partial) => partial,
                Err(error) => {
                    // 데이터 부족은 중립 점수가 아니라 거부
                    info!(%symbol, %error, "기술 점수 계산 불가, 후보 거부");
                    let verdict = self.veto.scan(&symbol, &name, &data.headlines);
                    let intraday = self.intraday.score(&symbol, &data.minute_bars, now_kst);
                    results.push(self.ensemble.combine(
                        &symbol,
                        &name,
                        Some(candidate.partial),
                        None,
                        Some(verdict.partial),
                        Some(intraday),
                        verdict.vetoed,
                        sizer,
                        ctx,
                    ));
                    continue;
                }
            };

            if !self.technical.passes(&technical) {
                info!(%symbol, score = %technical.value, "기술 점수 게이트 미달, 제외");
                continue;
            }

            let verdict = self.veto.scan(&symbol, &name, &data.headlines);
            let intraday = self.intraday.score(&symbol, &data.minute_bars, now_kst);

            // V자 신호 미달은 점수 합산과 무관한 절대 거부.
            // 분봉이 아예 없는 날도 여기서 걸립니다.
            let mut vetoed = verdict.vetoed;
            if !self.intraday.is_signal(&intraday) {
                info!(%symbol, strength = %intraday.value, "V자 신호 기준 미달, 진입 거부");
                vetoed = true;
            }

            results.push(self.ensemble.combine(
                &symbol,
                &name,
                Some(candidate.partial),
                Some(technical),
                Some(verdict.partial),
                Some(intraday),
                vetoed,
                sizer,
                ctx,
            ));
        }

        results.sort_by(|a, b| b.score.cmp(&a.score));
        info!(
            evaluated = results.len(),
            approved = results.iter().filter(|r| r.approved()).count(),
            "파이프라인 평가 완료"
        );
        results
    }
}
