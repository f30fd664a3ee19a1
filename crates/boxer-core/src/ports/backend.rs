//! Backend ports - 1 バックエンドへの接続・検証・claim トランザクション
//!
//! # 構成
//! - **BackendConnector**: (driver, dsn) からプール接続を開く
//! - **OutboxBackend**: 開いた接続。ping / probe / begin / close
//! - **ClaimTransaction**: 1 回の claim に使うトランザクション
//!
//! admission（open → ping → probe）の順序と、トランザクションの後始末の保証は
//! app 層（`app::admission`, `app::worker`）が持つ。ここは各ステップだけを定義する。

use async_trait::async_trait;

use crate::domain::{AdmissionError, ClaimError, OutboxMessage, ServiceConfig, StatusTransition};

/// BackendConnector は ServiceConfig から接続を開く
#[async_trait]
pub trait BackendConnector: Send + Sync {
    /// プール接続を開く（admission の 1 段目）
    async fn open(
        &self,
        service: &str,
        config: &ServiceConfig,
    ) -> Result<Box<dyn OutboxBackend>, AdmissionError>;
}

/// OutboxBackend は 1 ラウンドの間だけ生きる接続ハンドル
///
/// worker が排他的に所有する。ラウンドの最後に必ず `close()` される。
#[async_trait]
pub trait OutboxBackend: Send + Sync {
    /// 生存確認（admission の 2 段目）
    async fn ping(&self) -> Result<(), AdmissionError>;

    /// outbox テーブルが読めることの確認（admission の 3 段目）
    async fn probe(&self) -> Result<(), AdmissionError>;

    /// read committed / read-write のトランザクションを開始
    async fn begin(&self) -> Result<Box<dyn ClaimTransaction>, ClaimError>;

    /// 接続を閉じる（失敗してもログのみ）
    async fn close(self: Box<Self>);
}

/// ClaimTransaction は locking select を含むトランザクション
///
/// `commit` / `rollback` は self を消費する。どちらも呼ばれずに drop された場合、
/// 実装はロールバック相当の後始末をしなければならない。
#[async_trait]
pub trait ClaimTransaction: Send {
    /// status = new の行を最大 `limit` 件、行ロック付きで取得（取得順を保持）
    async fn select_pending(&mut self, limit: usize) -> Result<Vec<OutboxMessage>, ClaimError>;

    /// MessageSink が返した状態遷移を適用（attempt_count を 1 増やす）
    async fn apply(&mut self, transitions: &[StatusTransition]) -> Result<(), ClaimError>;

    async fn commit(self: Box<Self>) -> Result<(), ClaimError>;

    async fn rollback(self: Box<Self>) -> Result<(), ClaimError>;
}
