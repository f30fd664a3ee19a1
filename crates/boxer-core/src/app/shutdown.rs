//! Shutdown - orchestrator と worker に配る停止シグナル
//!
//! - `Shutdown::request()` で停止要求（Running -> Cancelled）
//! - `Shutdown` を drop しても停止要求とみなす
//! - 実行中のトランザクションを強制終了はしない。新しいラウンド / ステップに進まないだけ

use tokio::sync::watch;

/// Owning side of the shutdown signal.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn request(&self) {
        // send_replace は receiver がいなくても値を更新する
        self.tx.send_replace(true);
    }

    pub fn is_requested(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn listener(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Observing side, cloned into every worker.
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl ShutdownListener {
    pub fn is_requested(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// 停止要求が来るまで待つ
    pub async fn requested(&mut self) {
        loop {
            if self.is_requested() {
                return;
            }
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}
