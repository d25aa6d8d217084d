//! 스코어링 오류.

use thiserror::Error;

/// 스코어링 단계에서 발생하는 오류.
///
/// 데이터 부족은 부분 계산으로 때우지 않고 오류로 돌려줍니다.
/// 파이프라인은 이를 해당 종목 거부(VETO 동급)로 처리합니다.
#[derive(Debug, Clone, Error)]
pub enum ScoreError {
    /// 일봉/분봉 히스토리 부족
    #[error("{symbol}: 히스토리 부족 (필요 {required}, 보유 {available})")]
    InsufficientHistory {
        symbol: String,
        required: usize,
        available: usize,
    },
}
