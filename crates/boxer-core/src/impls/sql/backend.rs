//! SqlConnector - sqlx の Any ドライバによる outbox バックエンド
//!
//! # 接続
//! - open は `connect_lazy`（URL の検証のみ。実接続は ping で初めて張る）
//! - MySQL は after_connect で session の分離レベルを read committed にする
//! - プールはバックエンド 1 つにつき最大 2 接続（claim 1 本 + 予備）
//! - SQLite の claim は開始直後に書き込みロックを取る（[`Dialect::transaction_setup`]）
//!
//! # 行のデコード
//! MySQL / PostgreSQL は SELECT 側で列を文字列と BIGINT に揃えている。
//! SQLite は列の宣言に関係なく値の型が決まるので、
//! 整数は i64 → i32 → i16、文字列は String → bytes の順で試す。

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{Any, AnyPool, Connection, Executor, Row, Transaction};
use tracing::{debug, warn};

use super::dialect::Dialect;
use crate::domain::{
    AdmissionError, ClaimError, MessageStatus, OutboxMessage, ServiceConfig, StatusTransition,
    TableName,
};
use crate::ports::{BackendConnector, ClaimTransaction, OutboxBackend};

const MAX_CONNECTIONS: u32 = 2;

/// SqlConnector は driver から Dialect を選び、AnyPool を開く
#[derive(Debug, Clone)]
pub struct SqlConnector {
    table: TableName,
}

impl SqlConnector {
    pub fn new(table: TableName) -> Self {
        sqlx::any::install_default_drivers();
        Self { table }
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }
}

impl Default for SqlConnector {
    fn default() -> Self {
        Self::new(TableName::default())
    }
}

#[async_trait]
impl BackendConnector for SqlConnector {
    async fn open(
        &self,
        service: &str,
        config: &ServiceConfig,
    ) -> Result<Box<dyn OutboxBackend>, AdmissionError> {
        let dialect = Dialect::from_driver(&config.driver)?;
        let url = dialect.connection_url(&config.dsn);

        let mut options = AnyPoolOptions::new().max_connections(MAX_CONNECTIONS);
        if let Some(stmt) = dialect.session_setup() {
            options = options.after_connect(move |conn, _meta| {
                Box::pin(async move {
                    conn.execute(stmt).await?;
                    Ok(())
                })
            });
        }
        let pool = options
            .connect_lazy(&url)
            .map_err(|err| AdmissionError::Open(err.into()))?;
        debug!(service, driver = dialect.scheme(), "Opened connection pool");

        Ok(Box::new(SqlBackend {
            pool,
            statements: Arc::new(Statements::new(dialect, &self.table)),
        }))
    }
}

/// テーブル名を埋め込んだ SQL（接続ごとに 1 回組み立てる）
struct Statements {
    table: TableName,
    transaction_setup: Option<String>,
    probe: String,
    select_pending: String,
    transition: String,
}

impl Statements {
    fn new(dialect: Dialect, table: &TableName) -> Self {
        Self {
            table: table.clone(),
            transaction_setup: dialect.transaction_setup(table),
            probe: dialect.probe_sql(table),
            select_pending: dialect.select_pending_sql(table),
            transition: dialect.transition_sql(table),
        }
    }
}

struct SqlBackend {
    pool: AnyPool,
    statements: Arc<Statements>,
}

#[async_trait]
impl OutboxBackend for SqlBackend {
    async fn ping(&self) -> Result<(), AdmissionError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|err| AdmissionError::Ping(err.into()))?;
        conn.ping()
            .await
            .map_err(|err| AdmissionError::Ping(err.into()))
    }

    async fn probe(&self) -> Result<(), AdmissionError> {
        sqlx::query(&self.statements.probe)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| AdmissionError::Probe {
                table: self.statements.table.to_string(),
                source: err.into(),
            })?;
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn ClaimTransaction>, ClaimError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| ClaimError::Begin(err.into()))?;
        if let Some(stmt) = &self.statements.transaction_setup {
            // 失敗したら tx の drop でロールバックされる
            (&mut *tx)
                .execute(stmt.as_str())
                .await
                .map_err(|err| ClaimError::Begin(err.into()))?;
        }
        Ok(Box::new(SqlClaimTransaction {
            tx,
            statements: Arc::clone(&self.statements),
        }))
    }

    async fn close(self: Box<Self>) {
        self.pool.close().await;
    }
}

struct SqlClaimTransaction {
    tx: Transaction<'static, Any>,
    statements: Arc<Statements>,
}

#[async_trait]
impl ClaimTransaction for SqlClaimTransaction {
    async fn select_pending(&mut self, limit: usize) -> Result<Vec<OutboxMessage>, ClaimError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(&self.statements.select_pending)
            .bind(limit)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|err| ClaimError::Query(err.into()))?;
        rows.iter().map(decode_message).collect()
    }

    async fn apply(&mut self, transitions: &[StatusTransition]) -> Result<(), ClaimError> {
        for transition in transitions {
            let result = sqlx::query(&self.statements.transition)
                .bind(transition.status.as_str())
                .bind(transition.id)
                .execute(&mut *self.tx)
                .await
                .map_err(|err| ClaimError::Transition(err.into()))?;
            if result.rows_affected() == 0 {
                warn!(message_id = transition.id, "Status transition matched no row");
            }
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), ClaimError> {
        self.tx
            .commit()
            .await
            .map_err(|err| ClaimError::Commit(err.into()))
    }

    async fn rollback(self: Box<Self>) -> Result<(), ClaimError> {
        self.tx
            .rollback()
            .await
            .map_err(|err| ClaimError::Rollback(err.into()))
    }
}

fn decode_message(row: &AnyRow) -> Result<OutboxMessage, ClaimError> {
    let scan = |err: sqlx::Error| ClaimError::Scan(err.into());

    let id = int_column(row, "id").map_err(scan)?;
    let status = text_column(row, "status").map_err(scan)?;
    let status: MessageStatus = status
        .parse()
        .map_err(|err| ClaimError::Scan(Box::new(err)))?;
    let attempt_count = int_column(row, "attempt_count").map_err(scan)?;
    let attempt_count = i16::try_from(attempt_count).map_err(|err| ClaimError::Scan(Box::new(err)))?;

    Ok(OutboxMessage {
        id,
        body: text_column(row, "body").map_err(scan)?,
        meta: text_column(row, "meta").map_err(scan)?,
        status,
        attempt_count,
    })
}

fn int_column(row: &AnyRow, column: &str) -> Result<i64, sqlx::Error> {
    row.try_get::<i64, _>(column)
        .or_else(|_| row.try_get::<i32, _>(column).map(i64::from))
        .or_else(|_| row.try_get::<i16, _>(column).map(i64::from))
}

/// NULL は空文字列として扱う
fn text_column(row: &AnyRow, column: &str) -> Result<String, sqlx::Error> {
    match row.try_get::<Option<String>, _>(column) {
        Ok(text) => Ok(text.unwrap_or_default()),
        Err(_) => row
            .try_get::<Option<Vec<u8>>, _>(column)
            .map(|bytes| {
                bytes
                    .map(|b| String::from_utf8_lossy(&b).into_owned())
                    .unwrap_or_default()
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unsupported_driver_fails_at_open() {
        let connector = SqlConnector::default();
        let err = connector
            .open("svc", &ServiceConfig::new("oracle", "oracle://db"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AdmissionError::UnsupportedDriver(_)));
    }

    #[tokio::test]
    async fn unreachable_sqlite_file_fails_ping() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("outbox.db");
        let connector = SqlConnector::default();

        let backend = connector
            .open("svc", &ServiceConfig::new("sqlite", path.display().to_string()))
            .await
            .unwrap();
        let err = backend.ping().await.unwrap_err();
        assert!(matches!(err, AdmissionError::Ping(_)));
        backend.close().await;
    }
}
