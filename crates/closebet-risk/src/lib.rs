//! closebet-risk: 진입 가드와 청산 상태머신.
//!
//! 진입 쪽은 RiskGuard가 하루 단위 한도(횟수/연패/손실)를 강제하고,
//! 청산 쪽은 우선순위가 고정된 규칙 집합을 첫 매칭에서 멈추며
//! 평가합니다. 둘 다 순수 함수라 라이브와 백테스트가 공유합니다.

pub mod exit;
pub mod guard;

pub use exit::{ExitContext, ExitDecision, ExitStateMachine};
pub use guard::{GuardBlock, RiskGuard};
