//! 파라미터 탐색.
//!
//! 파라미터 공간의 각 지점마다 독립된 BacktestEngine을 띄워 rayon으로
//! 병렬 실행합니다. 실행 간 공유 상태가 없으므로 결과는 순서와 무관하게
//! 결정적입니다. 랜덤 탐색은 시드 고정 StdRng를 사용해 같은 시드면
//! 같은 표본을 뽑습니다.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use closebet_core::StrategyParams;

use crate::backtest::{BacktestConfig, BacktestEngine, BacktestError, HistoricalData, SummaryMetrics};

/// 탐색할 파라미터 축. 비어 있는 축은 기준 파라미터 값을 그대로 씁니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterSpace {
    /// V자 신호 진입 기준 후보
    pub v_signal_thresholds: Vec<Decimal>,
    /// 고정 손절률 후보 (%, 음수)
    pub stop_loss_pcts: Vec<Decimal>,
    /// 기술 점수 통과 기준 후보
    pub technical_pass_scores: Vec<Decimal>,
    /// 일일 최대 진입 횟수 후보
    pub max_entries_per_day: Vec<u32>,
}

fn axis<T: Clone>(values: &[T], base: T) -> Vec<T> {
    if values.is_empty() {
        vec![base]
    } else {
        values.to_vec()
    }
}

impl ParameterSpace {
    /// 전체 격자 크기.
    pub fn grid_size(&self, base: &StrategyParams) -> usize {
        axis(&self.v_signal_thresholds, base.v_signal_threshold).len()
            * axis(&self.stop_loss_pcts, base.stop_loss_pct).len()
            * axis(&self.technical_pass_scores, base.technical_pass_score).len()
            * axis(&self.max_entries_per_day, base.max_entries_per_day).len()
    }

    /// 전체 격자 (카테시안 곱).
    pub fn grid(&self, base: &StrategyParams) -> Vec<StrategyParams> {
        let mut configs = Vec::with_capacity(self.grid_size(base));
        for &v in &axis(&self.v_signal_thresholds, base.v_signal_threshold) {
            for &stop in &axis(&self.stop_loss_pcts, base.stop_loss_pct) {
                for &pass in &axis(&self.technical_pass_scores, base.technical_pass_score) {
                    for &entries in &axis(&self.max_entries_per_day, base.max_entries_per_day) {
                        let mut params = base.clone();
                        params.v_signal_threshold = v;
                        params.stop_loss_pct = stop;
                        params.technical_pass_score = pass;
                        params.max_entries_per_day = entries;
                        configs.push(params);
                    }
                }
            }
        }
        configs
    }

    /// 시드 고정 균등 랜덤 표본.
    pub fn sample(&self, base: &StrategyParams, n: usize, seed: u64) -> Vec<StrategyParams> {
        let v_axis = axis(&self.v_signal_thresholds, base.v_signal_threshold);
        let stop_axis = axis(&self.stop_loss_pcts, base.stop_loss_pct);
        let pass_axis = axis(&self.technical_pass_scores, base.technical_pass_score);
        let entries_axis = axis(&self.max_entries_per_day, base.max_entries_per_day);

        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                let mut params = base.clone();
                params.v_signal_threshold = v_axis[rng.gen_range(0..v_axis.len())];
                params.stop_loss_pct = stop_axis[rng.gen_range(0..stop_axis.len())];
                params.technical_pass_score = pass_axis[rng.gen_range(0..pass_axis.len())];
                params.max_entries_per_day = entries_axis[rng.gen_range(0..entries_axis.len())];
                params
            })
            .collect()
    }
}

/// 탐색 방식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SearchMode {
    /// 전체 격자 탐색
    Grid,
    /// 시드 고정 랜덤 탐색
    Random { samples: usize, seed: u64 },
}

/// 순위 기준 지표.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankMetric {
    TotalReturn,
    Sharpe,
    WinRate,
}

impl RankMetric {
    /// 순위 비교용 스칼라 값.
    pub fn value(&self, metrics: &SummaryMetrics) -> f64 {
        match self {
            RankMetric::TotalReturn => metrics.total_return_pct.to_f64().unwrap_or(f64::MIN),
            RankMetric::Sharpe => metrics.sharpe_ratio,
            RankMetric::WinRate => metrics.win_rate.to_f64().unwrap_or(f64::MIN),
        }
    }
}

/// 리더보드 한 줄.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationEntry {
    pub params: StrategyParams,
    pub metrics: SummaryMetrics,
}

/// 최적화 결과 리포트. 순위 내림차순 리더보드.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub created_at: DateTime<Utc>,
    pub metric: RankMetric,
    pub mode: SearchMode,
    pub entries: Vec<OptimizationEntry>,
}

impl OptimizationReport {
    /// 지표 내림차순으로 정렬된 리포트 생성. NaN 지표는 맨 뒤로 밀립니다.
    pub fn new(metric: RankMetric, mode: SearchMode, mut entries: Vec<OptimizationEntry>) -> Self {
        entries.sort_by(|a, b| {
            let av = metric.value(&a.metrics);
            let bv = metric.value(&b.metrics);
            bv.partial_cmp(&av).unwrap_or_else(|| {
                av.is_nan().cmp(&bv.is_nan())
            })
        });
        Self {
            created_at: Utc::now(),
            metric,
            mode,
            entries,
        }
    }

    /// 최고 지점.
    pub fn best(&self) -> Option<&OptimizationEntry> {
        self.entries.first()
    }

    /// JSON 리포트 저장.
    pub fn save_json(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
    }
}

/// 파라미터 최적화기.
#[derive(Debug, Clone)]
pub struct ParameterOptimizer {
    base: StrategyParams,
    config: BacktestConfig,
    space: ParameterSpace,
    metric: RankMetric,
    mode: SearchMode,
}

impl ParameterOptimizer {
    pub fn new(
        base: StrategyParams,
        config: BacktestConfig,
        space: ParameterSpace,
        metric: RankMetric,
        mode: SearchMode,
    ) -> Self {
        Self {
            base,
            config,
            space,
            metric,
            mode,
        }
    }

    /// 탐색 실행. 각 지점은 독립 백테스트로 병렬 수행됩니다.
    pub fn run(&self, data: &HistoricalData) -> Result<OptimizationReport, BacktestError> {
        let configs = match self.mode {
            SearchMode::Grid => self.space.grid(&self.base),
            SearchMode::Random { samples, seed } => self.space.sample(&self.base, samples, seed),
        };
        info!(points = configs.len(), "파라미터 탐색 시작");

        let entries: Vec<OptimizationEntry> = configs
            .par_iter()
            .map(|params| {
                BacktestEngine::new(params.clone(), self.config.clone())
                    .run(data)
                    .map(|report| OptimizationEntry {
                        params: params.clone(),
                        metrics: report.metrics,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(OptimizationReport::new(self.metric, self.mode, entries))
    }
}
