//! 도메인 모델.
//!
//! - `snapshot` - 시세 스냅샷, 분봉/일봉, 뉴스 항목
//! - `score` - 단계별 부분 점수와 앙상블 결과
//! - `position` - 포지션, 분할 익절 티어, 거래 기록
//! - `guard` - 일 단위 가드 상태

pub mod guard;
pub mod position;
pub mod score;
pub mod snapshot;
