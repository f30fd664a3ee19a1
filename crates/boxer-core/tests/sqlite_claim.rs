//! SqlConnector を実際の SQLite ファイルに対して動かす

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use boxer_core::app::admission::admit;
use boxer_core::app::{PollerBuilder, PollerSettings, Shutdown};
use boxer_core::domain::{
    AdmissionError, BackendOutcome, ClaimError, MessageStatus, ServiceConfig, ServiceSet,
    StatusTransition, TableName,
};
use boxer_core::impls::{SqlConnector, StaticServiceRegistry};
use boxer_core::ports::{BackendConnector, OutboxBackend};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tempfile::TempDir;

const TIMEOUT: Duration = Duration::from_secs(5);

async fn setup_pool(path: &Path) -> SqlitePool {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap()
}

/// outbox テーブル付きの DB を作り、(status, attempt_count) の行を入れる
async fn outbox_db(dir: &TempDir, name: &str, rows: &[(&str, i64)]) -> PathBuf {
    let path = dir.path().join(format!("{name}.db"));
    let pool = setup_pool(&path).await;
    sqlx::query(
        "CREATE TABLE message_outbox (
            id INTEGER PRIMARY KEY,
            body TEXT NOT NULL,
            meta TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'new',
            attempt_count INTEGER NOT NULL DEFAULT 0
        )",
    )
    .execute(&pool)
    .await
    .unwrap();
    for (i, (status, attempts)) in rows.iter().enumerate() {
        sqlx::query(
            "INSERT INTO message_outbox (id, body, meta, status, attempt_count) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(i as i64 + 1)
        .bind(format!("{{\"n\":{}}}", i + 1))
        .bind("{}")
        .bind(*status)
        .bind(*attempts)
        .execute(&pool)
        .await
        .unwrap();
    }
    pool.close().await;
    path
}

async fn empty_db(dir: &TempDir, name: &str) -> PathBuf {
    let path = dir.path().join(format!("{name}.db"));
    let pool = setup_pool(&path).await;
    pool.close().await;
    path
}

fn new_rows(n: usize) -> Vec<(&'static str, i64)> {
    vec![("new", 0); n]
}

fn sqlite(path: &Path) -> ServiceConfig {
    ServiceConfig::new("sqlite", path.display().to_string())
}

async fn admit_sqlite(
    connector: &SqlConnector,
    service: &str,
    path: &Path,
) -> Result<Box<dyn OutboxBackend>, AdmissionError> {
    let shutdown = Shutdown::new();
    admit(connector, service, &sqlite(path), TIMEOUT, &shutdown.listener()).await
}

async fn statuses(path: &Path) -> Vec<(i64, String, i64)> {
    let pool = setup_pool(path).await;
    let rows = sqlx::query("SELECT id, status, attempt_count FROM message_outbox ORDER BY id")
        .fetch_all(&pool)
        .await
        .unwrap();
    pool.close().await;
    rows.iter()
        .map(|r| (r.get("id"), r.get("status"), r.get("attempt_count")))
        .collect()
}

#[tokio::test]
async fn backend_without_outbox_table_is_not_admitted() {
    let dir = tempfile::tempdir().unwrap();
    let path = empty_db(&dir, "bare").await;
    let connector = SqlConnector::default();

    let err = admit_sqlite(&connector, "bare", &path)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, AdmissionError::Probe { ref table, .. } if table == "message_outbox"));
}

#[tokio::test]
async fn custom_table_name_is_probed() {
    let dir = tempfile::tempdir().unwrap();
    let path = outbox_db(&dir, "svc", &new_rows(1)).await;
    let connector = SqlConnector::new(TableName::new("other_outbox").unwrap());

    let err = admit_sqlite(&connector, "svc", &path)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, AdmissionError::Probe { .. }));
}

#[tokio::test]
async fn claim_returns_only_new_rows_in_id_order() {
    let dir = tempfile::tempdir().unwrap();
    let rows = [("done", 1), ("new", 0), ("error", 3), ("new", 2), ("done", 1)];
    let path = outbox_db(&dir, "svc", &rows).await;
    let connector = SqlConnector::default();
    let backend = admit_sqlite(&connector, "svc", &path).await.unwrap();

    let mut tx = backend.begin().await.unwrap();
    let batch = tx.select_pending(10).await.unwrap();
    tx.commit().await.unwrap();
    backend.close().await;

    assert_eq!(batch.iter().map(|m| m.id).collect::<Vec<_>>(), vec![2, 4]);
    assert!(batch.iter().all(|m| m.status == MessageStatus::New));
    assert_eq!(batch[1].attempt_count, 2);
    assert_eq!(batch[0].body, "{\"n\":2}");
    assert_eq!(batch[0].meta, "{}");
}

#[tokio::test]
async fn claim_is_bounded_by_batch_size() {
    let dir = tempfile::tempdir().unwrap();
    let path = outbox_db(&dir, "svc", &new_rows(25)).await;
    let connector = SqlConnector::default();
    let backend = admit_sqlite(&connector, "svc", &path).await.unwrap();

    let mut tx = backend.begin().await.unwrap();
    let batch = tx.select_pending(10).await.unwrap();
    tx.commit().await.unwrap();
    backend.close().await;

    assert_eq!(batch.len(), 10);
    assert_eq!(batch.first().map(|m| m.id), Some(1));
    assert_eq!(batch.last().map(|m| m.id), Some(10));
}

#[tokio::test]
async fn empty_outbox_yields_empty_batch_and_commits() {
    let dir = tempfile::tempdir().unwrap();
    let path = outbox_db(&dir, "svc", &[]).await;
    let connector = SqlConnector::default();
    let backend = admit_sqlite(&connector, "svc", &path).await.unwrap();

    let mut tx = backend.begin().await.unwrap();
    assert!(tx.select_pending(10).await.unwrap().is_empty());
    tx.commit().await.unwrap();
    backend.close().await;
}

#[tokio::test]
async fn committed_transitions_are_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let path = outbox_db(&dir, "svc", &new_rows(3)).await;
    let connector = SqlConnector::default();
    let backend = connector.open("svc", &sqlite(&path)).await.unwrap();

    let mut tx = backend.begin().await.unwrap();
    let batch = tx.select_pending(10).await.unwrap();
    tx.apply(&[
        StatusTransition::new(batch[0].id, MessageStatus::Done),
        StatusTransition::new(batch[2].id, MessageStatus::Error),
    ])
    .await
    .unwrap();
    tx.commit().await.unwrap();
    backend.close().await;

    assert_eq!(
        statuses(&path).await,
        vec![
            (1, "done".to_string(), 1),
            (2, "new".to_string(), 0),
            (3, "error".to_string(), 1),
        ]
    );
}

#[tokio::test]
async fn rolled_back_transitions_are_discarded() {
    let dir = tempfile::tempdir().unwrap();
    let path = outbox_db(&dir, "svc", &new_rows(2)).await;
    let connector = SqlConnector::default();
    let backend = connector.open("svc", &sqlite(&path)).await.unwrap();

    let mut tx = backend.begin().await.unwrap();
    tx.select_pending(10).await.unwrap();
    tx.apply(&[StatusTransition::new(1, MessageStatus::Done)])
        .await
        .unwrap();
    tx.rollback().await.unwrap();
    backend.close().await;

    assert!(statuses(&path).await.iter().all(|(_, s, n)| s == "new" && *n == 0));
}

#[tokio::test]
async fn round_skips_backend_missing_table_and_claims_the_other() {
    let dir = tempfile::tempdir().unwrap();
    let svc1 = empty_db(&dir, "svc1").await;
    let svc2 = outbox_db(&dir, "svc2", &new_rows(3)).await;

    let mut services = ServiceSet::new();
    services.insert("svc1".to_string(), sqlite(&svc1));
    services.insert("svc2".to_string(), sqlite(&svc2));
    let orchestrator = PollerBuilder::new(
        "integration",
        Arc::new(StaticServiceRegistry::new(services)),
        Arc::new(SqlConnector::default()),
    )
    .settings(PollerSettings {
        step_timeout: TIMEOUT,
        ..PollerSettings::default()
    })
    .build()
    .unwrap();
    let shutdown = Shutdown::new();

    let report = orchestrator.run_round(1, &shutdown.listener()).await.unwrap();

    assert!(report.backend("svc1").unwrap().outcome.is_skipped());
    assert_eq!(
        report.backend("svc2").unwrap().outcome,
        BackendOutcome::Claimed {
            count: 3,
            transitions: 0
        }
    );
    assert_eq!(report.admitted(), 1);
    // 既定の sink は何も書き換えない
    assert!(statuses(&svc2).await.iter().all(|(_, s, _)| s == "new"));
}

#[tokio::test]
async fn second_claim_waits_for_first_commit() {
    let dir = tempfile::tempdir().unwrap();
    let path = outbox_db(&dir, "svc", &new_rows(3)).await;
    let connector = SqlConnector::default();
    let first = admit_sqlite(&connector, "first", &path).await.unwrap();
    let second = admit_sqlite(&connector, "second", &path).await.unwrap();

    let mut holder = first.begin().await.unwrap();
    let held = holder.select_pending(10).await.unwrap();
    assert_eq!(held.len(), 3);

    let waiter = tokio::spawn(async move {
        let mut tx = second.begin().await?;
        let batch = tx.select_pending(10).await?;
        tx.commit().await?;
        Ok::<_, ClaimError>((second, batch))
    });

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(
        !waiter.is_finished(),
        "second claim started while the first transaction was open"
    );

    holder
        .apply(&[StatusTransition::new(held[0].id, MessageStatus::Done)])
        .await
        .unwrap();
    holder.commit().await.unwrap();

    let (second, batch) = waiter.await.unwrap().unwrap();
    // 1 件目は先の claim で done になったので見えない
    assert_eq!(batch.iter().map(|m| m.id).collect::<Vec<_>>(), vec![2, 3]);

    first.close().await;
    second.close().await;
}
