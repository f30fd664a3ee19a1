//! InMemoryOutbox - 開発用・テスト用の outbox バックエンド
//!
//! # 学習ポイント
//! - std::sync::Mutex で行とロック表を守る（ロックを持ったまま await しない）
//! - Notify でロック解放を待つ（SELECT ... FOR UPDATE のブロッキング）
//! - drop 時の暗黙ロールバック
//!
//! # ロックの意味論
//! - select_pending は status = new の先頭 `limit` 行を見る
//! - その中に他トランザクションがロック中の行があれば、解放されるまで待つ（SKIP LOCKED ではない）
//! - 取った行は commit / rollback / drop まで自分のロック

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::domain::{
    AdmissionError, ClaimError, MessageId, MessageStatus, OutboxMessage, ServiceConfig,
    StatusTransition, TableName,
};
use crate::ports::{BackendConnector, ClaimTransaction, OutboxBackend};

/// Lifecycle counters, for assertions in tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutboxStats {
    pub opened: usize,
    pub closed: usize,
    pub begun: usize,
    pub committed: usize,
    pub rolled_back: usize,
}

struct State {
    rows: BTreeMap<MessageId, OutboxMessage>,
    /// message id -> 所有トランザクション
    locks: HashMap<MessageId, u64>,
    next_tx: u64,
    table_present: bool,
    reachable: bool,
    fail_commit: bool,
    ping_delay: Duration,
    begin_delay: Duration,
    claim_delay: Duration,
    stats: OutboxStats,
}

struct Shared {
    state: Mutex<State>,
    released: Notify,
}

/// Shared in-memory outbox table. Clones point to the same table.
#[derive(Clone)]
pub struct InMemoryOutbox {
    shared: Arc<Shared>,
}

impl InMemoryOutbox {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    rows: BTreeMap::new(),
                    locks: HashMap::new(),
                    next_tx: 1,
                    table_present: true,
                    reachable: true,
                    fail_commit: false,
                    ping_delay: Duration::ZERO,
                    begin_delay: Duration::ZERO,
                    claim_delay: Duration::ZERO,
                    stats: OutboxStats::default(),
                }),
                released: Notify::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, message: OutboxMessage) {
        self.state().rows.insert(message.id, message);
    }

    /// status = new のメッセージを `n` 件追加（id は既存の最大値の続き）
    pub fn insert_new(&self, n: usize) {
        let mut state = self.state();
        let start = state.rows.keys().next_back().copied().unwrap_or(0) + 1;
        for id in start..start + n as MessageId {
            state
                .rows
                .insert(id, OutboxMessage::new(id, format!("body-{id}"), "{}"));
        }
    }

    pub fn messages(&self) -> Vec<OutboxMessage> {
        self.state().rows.values().cloned().collect()
    }

    pub fn locked_count(&self) -> usize {
        self.state().locks.len()
    }

    pub fn stats(&self) -> OutboxStats {
        self.state().stats
    }

    pub fn set_table_present(&self, present: bool) {
        self.state().table_present = present;
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.state().reachable = reachable;
    }

    pub fn set_fail_commit(&self, fail: bool) {
        self.state().fail_commit = fail;
    }

    pub fn set_ping_delay(&self, delay: Duration) {
        self.state().ping_delay = delay;
    }

    /// トランザクションを開始してから begin が返るまでの遅延
    pub fn set_begin_delay(&self, delay: Duration) {
        self.state().begin_delay = delay;
    }

    /// 行をロックした後、select_pending が返るまでの遅延
    pub fn set_claim_delay(&self, delay: Duration) {
        self.state().claim_delay = delay;
    }

    fn release(&self, tx_id: u64) {
        self.state().locks.retain(|_, owner| *owner != tx_id);
        self.shared.released.notify_waiters();
    }

    /// ロック取得を試みる。他トランザクションと競合していれば None
    fn try_lock_pending(
        &self,
        tx_id: u64,
        limit: usize,
    ) -> Result<Option<Vec<OutboxMessage>>, ClaimError> {
        let mut state = self.state();
        if !state.table_present {
            return Err(ClaimError::Query(
                format!("no such table: {}", TableName::DEFAULT).into(),
            ));
        }
        let batch: Vec<OutboxMessage> = state
            .rows
            .values()
            .filter(|m| m.status == MessageStatus::New)
            .take(limit)
            .cloned()
            .collect();
        let contended = batch
            .iter()
            .any(|m| state.locks.get(&m.id).is_some_and(|owner| *owner != tx_id));
        if contended {
            return Ok(None);
        }
        for msg in &batch {
            state.locks.insert(msg.id, tx_id);
        }
        Ok(Some(batch))
    }
}

impl Default for InMemoryOutbox {
    fn default() -> Self {
        Self::new()
    }
}

/// InMemoryConnector は dsn ごとに InMemoryOutbox を引く
#[derive(Clone, Default)]
pub struct InMemoryConnector {
    outboxes: HashMap<String, InMemoryOutbox>,
}

impl InMemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outbox(mut self, dsn: impl Into<String>, outbox: InMemoryOutbox) -> Self {
        self.outboxes.insert(dsn.into(), outbox);
        self
    }
}

#[async_trait]
impl BackendConnector for InMemoryConnector {
    async fn open(
        &self,
        _service: &str,
        config: &ServiceConfig,
    ) -> Result<Box<dyn OutboxBackend>, AdmissionError> {
        let outbox = self
            .outboxes
            .get(&config.dsn)
            .cloned()
            .ok_or_else(|| AdmissionError::Open("unknown in-memory dsn".into()))?;
        outbox.state().stats.opened += 1;
        Ok(Box::new(InMemoryBackend { outbox }))
    }
}

struct InMemoryBackend {
    outbox: InMemoryOutbox,
}

#[async_trait]
impl OutboxBackend for InMemoryBackend {
    async fn ping(&self) -> Result<(), AdmissionError> {
        let (delay, reachable) = {
            let state = self.outbox.state();
            (state.ping_delay, state.reachable)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if !reachable {
            return Err(AdmissionError::Ping("connection refused".into()));
        }
        Ok(())
    }

    async fn probe(&self) -> Result<(), AdmissionError> {
        if !self.outbox.state().table_present {
            return Err(AdmissionError::Probe {
                table: TableName::DEFAULT.to_string(),
                source: "no such table".into(),
            });
        }
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn ClaimTransaction>, ClaimError> {
        let (tx_id, delay) = {
            let mut state = self.outbox.state();
            state.stats.begun += 1;
            let id = state.next_tx;
            state.next_tx += 1;
            (id, state.begin_delay)
        };
        let tx = InMemoryTransaction {
            outbox: self.outbox.clone(),
            tx_id,
            staged: Vec::new(),
            finished: false,
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(Box::new(tx))
    }

    async fn close(self: Box<Self>) {
        self.outbox.state().stats.closed += 1;
    }
}

struct InMemoryTransaction {
    outbox: InMemoryOutbox,
    tx_id: u64,
    /// commit 時に適用する遷移
    staged: Vec<StatusTransition>,
    finished: bool,
}

impl InMemoryTransaction {
    fn finish(&mut self, committed: bool) {
        self.finished = true;
        {
            let mut state = self.outbox.state();
            if committed {
                for t in self.staged.drain(..) {
                    if let Some(row) = state.rows.get_mut(&t.id) {
                        row.status = t.status;
                        row.attempt_count = row.attempt_count.saturating_add(1);
                    }
                }
                state.stats.committed += 1;
            } else {
                self.staged.clear();
                state.stats.rolled_back += 1;
            }
        }
        self.outbox.release(self.tx_id);
    }
}

#[async_trait]
impl ClaimTransaction for InMemoryTransaction {
    async fn select_pending(&mut self, limit: usize) -> Result<Vec<OutboxMessage>, ClaimError> {
        loop {
            // 登録してから確認しないと notify_waiters を取りこぼす
            let released = self.outbox.shared.released.notified();
            tokio::pin!(released);
            released.as_mut().enable();

            if let Some(batch) = self.outbox.try_lock_pending(self.tx_id, limit)? {
                let delay = self.outbox.state().claim_delay;
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                return Ok(batch);
            }
            released.await;
        }
    }

    async fn apply(&mut self, transitions: &[StatusTransition]) -> Result<(), ClaimError> {
        self.staged.extend_from_slice(transitions);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), ClaimError> {
        let mut this = self;
        if this.outbox.state().fail_commit {
            // drop で rollback される
            return Err(ClaimError::Commit("connection lost during commit".into()));
        }
        this.finish(true);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), ClaimError> {
        let mut this = self;
        this.finish(false);
        Ok(())
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        if !self.finished {
            self.finish(false);
        }
    }
}
