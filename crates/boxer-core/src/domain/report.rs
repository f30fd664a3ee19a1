//! Round / backend reports.
//!
//! ラウンドの結果をまとめた値。ログとテストの両方で使う。

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ids::{ClaimId, RoundNumber};

/// Outcome of one backend within one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BackendOutcome {
    /// admission（open / ping / probe）で弾かれた
    Skipped { reason: String },
    /// claim してコミットした（0 件も成功）
    Claimed { count: usize, transitions: usize },
    /// トランザクションの途中で失敗した
    Failed { reason: String },
    /// shutdown 要求により途中で止めた
    Cancelled,
    /// worker タスクが panic した
    Panicked,
}

impl BackendOutcome {
    pub fn claimed_count(&self) -> Option<usize> {
        match self {
            BackendOutcome::Claimed { count, .. } => Some(*count),
            _ => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, BackendOutcome::Skipped { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendReport {
    pub service: String,
    pub claim_id: ClaimId,
    #[serde(flatten)]
    pub outcome: BackendOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoundReport {
    pub round: RoundNumber,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub backends: Vec<BackendReport>,
}

impl RoundReport {
    pub fn backend(&self, service: &str) -> Option<&BackendReport> {
        self.backends.iter().find(|b| b.service == service)
    }

    /// claim まで到達したバックエンド数
    pub fn admitted(&self) -> usize {
        self.backends.iter().filter(|b| !b.outcome.is_skipped()).count()
    }

    pub fn total_claimed(&self) -> usize {
        self.backends
            .iter()
            .filter_map(|b| b.outcome.claimed_count())
            .sum()
    }
}
