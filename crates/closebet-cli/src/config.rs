//! 환경 변수 기반 설정.
//!
//! 설정 오류는 기동 시에만 치명적입니다. 사이클 루프에 들어간 뒤에는
//! 이미 검증된 값만 사용합니다.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use rust_decimal::Decimal;
use tracing::info;

use closebet_core::StrategyParams;
use closebet_notification::{ConsoleSender, DiscordSender, NotificationSender};
use closebet_strategy::{KellyCriterion, PositionSizer, QTablePolicy};

/// 포지션 사이저 선택.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizerKind {
    Kelly,
    /// 학습된 Q-테이블 정책 (JSON 파일)
    QTable { path: PathBuf },
}

/// 애플리케이션 설정.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// 운용 자본 (원)
    pub initial_capital: Decimal,
    /// 거래 이력 JSONL 경로
    pub history_path: PathBuf,
    /// 포지션 사이저
    pub sizer: SizerKind,
    /// 스케줄러 사이클 간격 (초)
    pub cycle_interval_secs: u64,
}

impl AppConfig {
    /// 환경 변수에서 설정을 읽습니다.
    ///
    /// - `CLOSEBET_INITIAL_CAPITAL` (기본 10,000,000)
    /// - `CLOSEBET_HISTORY_PATH` (기본 data/trades.jsonl)
    /// - `CLOSEBET_SIZER` = kelly | qtable (기본 kelly)
    /// - `CLOSEBET_QTABLE_PATH` (sizer=qtable일 때, 기본 data/qtable.json)
    /// - `CLOSEBET_CYCLE_INTERVAL_SECS` (기본 60)
    pub fn from_env() -> anyhow::Result<Self> {
        let initial_capital = match std::env::var("CLOSEBET_INITIAL_CAPITAL") {
            Ok(raw) => raw
                .parse::<Decimal>()
                .context("CLOSEBET_INITIAL_CAPITAL 파싱 실패")?,
            Err(_) => Decimal::from(10_000_000u64),
        };
        if initial_capital <= Decimal::ZERO {
            bail!("CLOSEBET_INITIAL_CAPITAL은 0보다 커야 합니다");
        }

        let history_path = std::env::var("CLOSEBET_HISTORY_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data/trades.jsonl"));

        let sizer = match std::env::var("CLOSEBET_SIZER").as_deref() {
            Ok("qtable") => SizerKind::QTable {
                path: std::env::var("CLOSEBET_QTABLE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("data/qtable.json")),
            },
            Ok("kelly") | Err(_) => SizerKind::Kelly,
            Ok(other) => bail!("지원하지 않는 CLOSEBET_SIZER: {other} (kelly | qtable)"),
        };

        let cycle_interval_secs = match std::env::var("CLOSEBET_CYCLE_INTERVAL_SECS") {
            Ok(raw) => raw
                .parse::<u64>()
                .context("CLOSEBET_CYCLE_INTERVAL_SECS 파싱 실패")?,
            Err(_) => 60,
        };

        Ok(Self {
            initial_capital,
            history_path,
            sizer,
            cycle_interval_secs,
        })
    }

    /// 전략 파라미터. 기본값을 쓰되 기동 시 정합성을 검증합니다.
    pub fn strategy_params(&self) -> anyhow::Result<StrategyParams> {
        let params = StrategyParams::default();
        params.validate().context("전략 파라미터 오류")?;
        Ok(params)
    }

    /// 사이저 구성. qtable은 파일이 있으면 로드하고, 없으면 빈 표로
    /// 시작합니다 (탐욕 모드, 운용 중 탐험 없음).
    pub fn build_sizer(&self) -> anyhow::Result<Arc<dyn PositionSizer>> {
        match &self.sizer {
            SizerKind::Kelly => {
                let params = self.strategy_params()?;
                Ok(Arc::new(KellyCriterion::new(&params)))
            }
            SizerKind::QTable { path } => {
                let policy = QTablePolicy::greedy(0);
                if path.exists() {
                    policy
                        .load(path)
                        .with_context(|| format!("Q-테이블 로드 실패: {}", path.display()))?;
                    info!(path = %path.display(), "Q-테이블 정책 로드");
                }
                Ok(Arc::new(policy))
            }
        }
    }

    /// 알림 전송기 구성. Discord 웹훅이 설정돼 있으면 Discord,
    /// 없으면 콘솔 로그로 내보냅니다.
    pub fn build_notifier(&self) -> Arc<dyn NotificationSender> {
        match DiscordSender::from_env() {
            Some(sender) => {
                info!("Discord 알림 활성화");
                Arc::new(sender)
            }
            None => Arc::new(ConsoleSender),
        }
    }
}
