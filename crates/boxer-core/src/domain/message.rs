//! OutboxMessage - outbox テーブルの 1 行
//!
//! body / meta は opaque。コアは中身を解釈しない。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Primary key of an outbox row.
pub type MessageId = i64;

/// MessageStatus はメッセージのライフサイクル
///
/// # 状態遷移
/// - new: claim 対象
/// - done: 終端（配送済み）
/// - error: 終端（配送失敗）
///
/// ストレージ上はリテラル `new` / `done` / `error` で保存される。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    New,
    Done,
    Error,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::New => "new",
            MessageStatus::Done => "done",
            MessageStatus::Error => "error",
        }
    }

    /// Done / Error は二度と claim されない
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MessageStatus::New)
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown message status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for MessageStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(MessageStatus::New),
            "done" => Ok(MessageStatus::Done),
            "error" => Ok(MessageStatus::Error),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// One row of the outbox table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxMessage {
    pub id: MessageId,
    pub body: String,
    pub meta: String,
    pub status: MessageStatus,
    /// claim 試行回数（非終端の間は単調非減少）
    pub attempt_count: i16,
}

impl OutboxMessage {
    /// 新規（status = new, attempt_count = 0）のメッセージを作成
    pub fn new(id: MessageId, body: impl Into<String>, meta: impl Into<String>) -> Self {
        Self {
            id,
            body: body.into(),
            meta: meta.into(),
            status: MessageStatus::New,
            attempt_count: 0,
        }
    }

    pub fn with_status(mut self, status: MessageStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_claimable(&self) -> bool {
        self.status == MessageStatus::New
    }
}

/// StatusTransition は MessageSink が要求する状態遷移
///
/// claim トランザクション内で適用され、`attempt_count` を 1 増やす。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub id: MessageId,
    pub status: MessageStatus,
}

impl StatusTransition {
    pub fn new(id: MessageId, status: MessageStatus) -> Self {
        Self { id, status }
    }
}
