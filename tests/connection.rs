use std::sync::Arc;

use rusqlite::Connection;
use sqlite_compat::{SqliteConfig, SqliteService, Value};
use tokio::sync::Barrier;

fn handle_address(service: &SqliteService) -> usize {
    let conn = service.connection().unwrap();
    &*conn as *const Connection as usize
}

#[test]
fn connection_is_lazy_and_reused() {
    let service = SqliteService::new(SqliteConfig::in_memory());
    assert!(!service.is_open());

    let first = handle_address(&service);
    assert!(service.is_open());
    assert_eq!(handle_address(&service), first);
}

#[test]
fn open_failure_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"file").unwrap();

    let service = SqliteService::new(SqliteConfig::new(blocker.join("app.db")).without_schema());
    assert!(service.connection().is_err());
    assert!(!service.is_open());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_use_opens_one_handle() {
    let dir = tempfile::tempdir().unwrap();
    let service = Arc::new(SqliteService::new(
        SqliteConfig::new(dir.path().join("race.db")).without_schema(),
    ));
    let barrier = Arc::new(Barrier::new(8));

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let service = Arc::clone(&service);
        let barrier = Arc::clone(&barrier);
        tasks.push(tokio::spawn(async move {
            barrier.wait().await;
            tokio::task::spawn_blocking(move || handle_address(&service))
                .await
                .unwrap()
        }));
    }

    let mut addresses = Vec::new();
    for task in tasks {
        addresses.push(task.await.unwrap());
    }
    addresses.dedup();
    assert_eq!(addresses.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_inserts_get_their_own_rows() {
    let service = Arc::new(SqliteService::new(SqliteConfig::in_memory()));
    service
        .query("CREATE TABLE jobs (id INTEGER PRIMARY KEY, name TEXT NOT NULL)", &[])
        .unwrap();

    let mut tasks = Vec::new();
    for i in 0..16 {
        let service = Arc::clone(&service);
        tasks.push(tokio::task::spawn_blocking(move || {
            let name = format!("job-{i}");
            let result = service
                .query(
                    "INSERT INTO jobs (name) VALUES ($1) RETURNING *",
                    &[name.clone().into()],
                )
                .unwrap();
            (name, result)
        }));
    }

    let mut ids = Vec::new();
    for task in tasks {
        let (name, result) = task.await.unwrap();
        let row = &result.rows[0];
        assert_eq!(row["name"], Value::Text(name));
        ids.push(row["id"].as_i64().unwrap());
    }
    ids.sort_unstable();
    assert_eq!(ids, (1..=16).collect::<Vec<i64>>());
}
