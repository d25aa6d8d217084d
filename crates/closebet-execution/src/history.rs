//! 거래 이력.
//!
//! TradeRecord를 JSONL(한 줄 한 레코드)로 영속화합니다. 재시작 후에도
//! 켈리 통계와 성과 분석의 입력이 유지되도록 append-only로만 씁니다.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;

use closebet_core::TradeRecord;
use closebet_strategy::TradeStats;

use crate::error::HistoryError;

/// 거래 이력 저장소.
#[derive(Debug)]
pub struct TradeHistory {
    records: Vec<TradeRecord>,
    path: Option<PathBuf>,
}

impl TradeHistory {
    /// 파일 없이 메모리에만 유지합니다. 백테스트용.
    pub fn in_memory() -> Self {
        Self {
            records: Vec::new(),
            path: None,
        }
    }

    /// JSONL 파일을 열고 기존 레코드를 모두 읽어들입니다.
    /// 파일이 없으면 빈 이력으로 시작합니다.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, HistoryError> {
        let path = path.as_ref().to_path_buf();
        let mut records = Vec::new();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        if path.exists() {
            let file = File::open(&path)?;
            for line in BufReader::new(file).lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                records.push(serde_json::from_str(&line)?);
            }
        }

        info!(path = %path.display(), loaded = records.len(), "거래 이력 로드");
        Ok(Self {
            records,
            path: Some(path),
        })
    }

    /// 레코드 추가. 파일이 있으면 즉시 한 줄 append합니다.
    pub fn append(&mut self, record: TradeRecord) -> Result<(), HistoryError> {
        if let Some(path) = &self.path {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            let line = serde_json::to_string(&record)?;
            writeln!(file, "{}", line)?;
        }
        self.records.push(record);
        Ok(())
    }

    /// 누적 레코드 (기록 순).
    pub fn records(&self) -> &[TradeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 최근 `recent_n`건의 거래 통계. 켈리 사이저의 입력입니다.
    pub fn statistics(&self, recent_n: usize) -> TradeStats {
        let start = self.records.len().saturating_sub(recent_n);
        let recent = &self.records[start..];

        let total_trades = recent.len();
        if total_trades == 0 {
            return TradeStats::default();
        }

        let wins: Vec<&TradeRecord> = recent.iter().filter(|r| r.is_win()).collect();
        let losses: Vec<&TradeRecord> = recent.iter().filter(|r| r.is_loss()).collect();

        let avg = |rs: &[&TradeRecord]| -> Decimal {
            if rs.is_empty() {
                Decimal::ZERO
            } else {
                rs.iter().map(|r| r.pnl_pct).sum::<Decimal>() / Decimal::from(rs.len())
            }
        };

        TradeStats {
            total_trades,
            wins: wins.len(),
            losses: losses.len(),
            win_rate: Decimal::from(wins.len()) / Decimal::from(total_trades),
            avg_win_pct: avg(&wins),
            avg_loss_pct: avg(&losses),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use closebet_core::ExitReason;
    use uuid::Uuid;

    fn record(pnl_pct: Decimal) -> TradeRecord {
        let entry_price = dec!(10000);
        let quantity = dec!(100);
        let exit_price = entry_price * (Decimal::ONE + pnl_pct / dec!(100));
        TradeRecord {
            id: Uuid::new_v4(),
            position_id: Uuid::new_v4(),
            symbol: "005930".to_string(),
            name: "삼성전자".to_string(),
            entry_price,
            exit_price,
            quantity,
            entry_time: Utc.with_ymd_and_hms(2025, 6, 27, 6, 10, 0).unwrap(),
            exit_time: Utc.with_ymd_and_hms(2025, 6, 28, 0, 30, 0).unwrap(),
            pnl: (exit_price - entry_price) * quantity,
            pnl_pct,
            holding_minutes: 1100,
            exit_reason: ExitReason::TakeProfitTier(3),
        }
    }

    #[test]
    fn empty_history_yields_default_stats() {
        let history = TradeHistory::in_memory();
        assert_eq!(history.statistics(20), TradeStats::default());
    }

    #[test]
    fn statistics_split_wins_and_losses() {
        let mut history = TradeHistory::in_memory();
        history.append(record(dec!(2.0))).unwrap();
        history.append(record(dec!(4.0))).unwrap();
        history.append(record(dec!(-3.0))).unwrap();

        let stats = history.statistics(20);
        assert_eq!(stats.total_trades, 3);
        assert_eq!(stats.wins, 2);
        assert_eq!(stats.losses, 1);
        assert_eq!(stats.avg_win_pct, dec!(3.0));
        assert_eq!(stats.avg_loss_pct, dec!(-3.0));
    }

    #[test]
    fn statistics_respect_recent_window() {
        let mut history = TradeHistory::in_memory();
        // 오래된 손실 5건, 최근 수익 3건
        for _ in 0..5 {
            history.append(record(dec!(-2.0))).unwrap();
        }
        for _ in 0..3 {
            history.append(record(dec!(3.0))).unwrap();
        }

        let stats = history.statistics(3);
        assert_eq!(stats.total_trades, 3);
        assert_eq!(stats.wins, 3);
        assert_eq!(stats.losses, 0);
        assert_eq!(stats.win_rate, Decimal::ONE);
    }

    #[test]
    fn reload_roundtrips_jsonl() {
        let dir = std::env::temp_dir().join(format!("closebet-history-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("trades.jsonl");

        {
            let mut history = TradeHistory::open(&path).unwrap();
            history.append(record(dec!(2.0))).unwrap();
            history.append(record(dec!(-1.0))).unwrap();
        }

        let reloaded = TradeHistory::open(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.records()[0].pnl_pct, dec!(2.0));
        assert_eq!(reloaded.records()[1].pnl_pct, dec!(-1.0));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
