//! Q-learning 기반 사이징 정책.
//!
//! 이산화된 상태(점수/손실 스트릭/당일 손익 구간)에서 베팅 비율
//! 행동을 ε-greedy로 고르고, 청산 후 수익률을 보상으로 Q값을
//! 갱신합니다. Q-테이블은 JSON 파일로 저장/복원됩니다.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use super::{PositionSizer, SizingContext};

/// 선택 가능한 베팅 비율 행동.
const ACTIONS: &[Decimal] = &[dec!(0.05), dec!(0.10), dec!(0.15), dec!(0.20), dec!(0.25)];

/// Q-learning 사이징 정책.
pub struct QTablePolicy {
    learning_rate: f64,
    discount_factor: f64,
    epsilon: f64,
    q_table: Mutex<HashMap<String, Vec<f64>>>,
    rng: Mutex<StdRng>,
}

impl QTablePolicy {
    pub fn new(seed: u64) -> Self {
        Self {
            learning_rate: 0.1,
            discount_factor: 0.95,
            epsilon: 0.1,
            q_table: Mutex::new(HashMap::new()),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// 탐험 없는 결정적 정책 (백테스트 재현성용).
    pub fn greedy(seed: u64) -> Self {
        Self {
            epsilon: 0.0,
            ..Self::new(seed)
        }
    }

    /// 행동 수.
    pub fn n_actions() -> usize {
        ACTIONS.len()
    }

    /// 행동 인덱스 → 베팅 비율.
    pub fn action_fraction(action: usize) -> Decimal {
        ACTIONS[action.min(ACTIONS.len() - 1)]
    }

    /// ε-greedy 행동 선택.
    ///
    /// 다른 스레드가 패닉해 락이 오염돼도 Q값 자체는 유효하므로
    /// 그대로 복구해 계속 씁니다.
    pub fn act(&self, ctx: &SizingContext<'_>) -> usize {
        let explore = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            rng.gen::<f64>() < self.epsilon
        };
        if explore {
            let action = self.rng.lock().unwrap_or_else(|e| e.into_inner()).gen_range(0..ACTIONS.len());
            debug!(action, "탐험 행동 선택");
            return action;
        }

        let key = state_key(ctx);
        let table = self.q_table.lock().unwrap_or_else(|e| e.into_inner());
        let action = table
            .get(&key)
            .map(|q| argmax(q))
            .unwrap_or(1); // 미학습 상태는 보통 매수(0.10)
        debug!(state = %key, action, "활용 행동 선택");
        action
    }

    /// Q-learning 갱신.
    ///
    /// Q(s,a) ← Q(s,a) + α[r + γ·max Q(s',·) - Q(s,a)]
    pub fn update(
        &self,
        ctx: &SizingContext<'_>,
        action: usize,
        reward: f64,
        next_ctx: &SizingContext<'_>,
    ) {
        let key = state_key(ctx);
        let next_key = state_key(next_ctx);

        let mut table = self.q_table.lock().unwrap_or_else(|e| e.into_inner());
        let max_next_q = table
            .get(&next_key)
            .map(|q| q.iter().cloned().fold(f64::MIN, f64::max))
            .unwrap_or(0.0);

        let q_values = table
            .entry(key.clone())
            .or_insert_with(|| vec![0.0; ACTIONS.len()]);
        let current = q_values[action];
        let td_error = reward + self.discount_factor * max_next_q - current;
        q_values[action] = current + self.learning_rate * td_error;

        debug!(state = %key, action, reward, td_error, "Q값 갱신");
    }

    /// Q-테이블 JSON 저장.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let table = self.q_table.lock().unwrap_or_else(|e| e.into_inner());
        let json = serde_json::to_string_pretty(&*table)?;
        fs::write(path, json)
    }

    /// Q-테이블 JSON 로드. 파일이 없으면 빈 테이블로 시작.
    pub fn load(&self, path: &Path) -> io::Result<()> {
        if !path.exists() {
            return Ok(());
        }
        let json = fs::read_to_string(path)?;
        let table: HashMap<String, Vec<f64>> = serde_json::from_str(&json)?;
        *self.q_table.lock().unwrap_or_else(|e| e.into_inner()) = table;
        Ok(())
    }
}

impl PositionSizer for QTablePolicy {
    fn fraction(&self, ctx: &SizingContext<'_>) -> Decimal {
        Self::action_fraction(self.act(ctx))
    }
}

/// 연속 상태 → 이산 상태 키.
///
/// 점수는 20점 구간 5개, 손실 스트릭은 3에서 포화, 당일 손익은
/// 5개 구간으로 나눕니다.
fn state_key(ctx: &SizingContext<'_>) -> String {
    let score_bin = (ctx.score / dec!(20))
        .floor()
        .min(dec!(4))
        .max(Decimal::ZERO);
    let streak_bin = ctx.consecutive_losses.min(3);
    let pnl = ctx.daily_pnl_pct;
    let pnl_bin = if pnl <= dec!(-3) {
        0
    } else if pnl < Decimal::ZERO {
        1
    } else if pnl < dec!(1) {
        2
    } else if pnl < dec!(3) {
        3
    } else {
        4
    };
    format!("s{}_l{}_p{}", score_bin, streak_bin, pnl_bin)
}

fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}
