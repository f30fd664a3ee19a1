//! Claim identifiers.
//!
//! worker の 1 回の実行（1 claim）ごとに ULID を振り、ログの相関に使う。
//!
//! ## ULID の特性
//! - **時刻でソート可能**: timestamp が先頭にあるため、生成順序でソートできる
//! - **分散生成可能**: 複数プロセスの poller が調整なしで生成できる

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Identifier of one claim attempt (one worker run against one backend).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClaimId(Ulid);

impl ClaimId {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl From<Ulid> for ClaimId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "claim-{}", self.0)
    }
}

/// Sequence number of an orchestrator round, starting at 1.
pub type RoundNumber = u64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_has_prefix() {
        let ulid = Ulid::new();
        let id = ClaimId::from_ulid(ulid);
        assert_eq!(id.as_ulid(), ulid);
        assert_eq!(id.to_string(), format!("claim-{ulid}"));
    }

    #[test]
    fn claim_ids_are_sortable() {
        let id1 = ClaimId::from(Ulid::new());
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = ClaimId::from(Ulid::new());
        assert!(id1 < id2);
    }

    #[test]
    fn claim_id_is_ulid_sized() {
        assert_eq!(std::mem::size_of::<ClaimId>(), std::mem::size_of::<Ulid>());
    }
}
