use boardstore_core::db::migrations::latest_version;
use boardstore_core::db::{open_db, open_db_in_memory, open_db_with_busy_timeout, DbError};
use boardstore_core::{SqliteStore, Store, StoreConfig, StoreError};
use rusqlite::Connection;
use std::time::Duration;

const TABLES: &[&str] = &[
    "system_settings",
    "teams",
    "users",
    "sessions",
    "boards",
    "boards_history",
    "board_members",
    "blocks",
    "blocks_history",
    "sharing",
    "categories",
    "category_blocks",
    "subscriptions",
    "notification_hints",
];

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in TABLES {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("boards.db");

    let store = SqliteStore::open(&path).unwrap();
    store.set_system_setting("telemetry", "off").unwrap();
    store.shutdown().unwrap();

    let conn = open_db_with_busy_timeout(&path, Duration::from_millis(100)).unwrap();
    assert_eq!(schema_version(&conn), latest_version());
    let store = SqliteStore::new(conn).unwrap();
    assert_eq!(store.get_system_setting("telemetry").unwrap(), "off");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn store_rejects_connection_without_schema() {
    let conn = Connection::open_in_memory().unwrap();
    match SqliteStore::new(conn) {
        Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        }) => {
            assert_eq!(expected_version, latest_version());
            assert_eq!(actual_version, 0);
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("unmigrated connection must be rejected"),
    }
}

#[test]
fn store_opens_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("configured.db");
    let config = StoreConfig::from_json_str(&format!(
        r#"{{"database_path": {}, "busy_timeout_ms": 200}}"#,
        serde_json::to_string(path.to_str().unwrap()).unwrap()
    ))
    .unwrap();

    let store = SqliteStore::open_with_config(&config).unwrap();
    assert_eq!(store.get_team_count().unwrap(), 0);
    store.shutdown().unwrap();
    assert!(path.exists());

    let in_memory = SqliteStore::open_with_config(&StoreConfig::default()).unwrap();
    assert_eq!(in_memory.get_registered_user_count().unwrap(), 0);
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
