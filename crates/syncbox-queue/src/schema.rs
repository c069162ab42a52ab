//! Database schema management.
//!
//! The schema version lives in `PRAGMA user_version`. Each migration is an
//! additive, idempotent batch that runs once when the stored version is below
//! its own.

use rusqlite::Connection;
use tokio_rusqlite::Error;

/// Highest schema version this build understands.
pub const SCHEMA_VERSION: u32 = 1;

const MIGRATIONS: &[(u32, &str)] = &[(
    1,
    r#"
CREATE TABLE IF NOT EXISTS queue_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    payload TEXT NOT NULL,
    retry_count INTEGER NOT NULL DEFAULT 0
);
"#,
)];

/// Bring the schema up to [`SCHEMA_VERSION`].
///
/// Returns the version found before migrating. A database written by a newer
/// build is rejected without being modified.
pub fn init_schema(conn: &mut Connection) -> Result<u32, Error> {
    let current = schema_version(conn)?;

    if current > SCHEMA_VERSION {
        return Err(Error::Other(
            format!(
                "schema version {} is newer than supported version {}",
                current, SCHEMA_VERSION
            )
            .into(),
        ));
    }

    if current == SCHEMA_VERSION {
        return Ok(current);
    }

    let tx = conn.transaction()?;
    for (version, sql) in MIGRATIONS {
        if *version > current {
            tx.execute_batch(sql)?;
        }
    }
    tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    tx.commit()?;

    Ok(current)
}

/// Read the stored schema version.
pub fn schema_version(conn: &Connection) -> Result<u32, rusqlite::Error> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_count(conn: &Connection) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            ["queue_entries"],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_schema_creation() {
        let mut conn = Connection::open_in_memory().unwrap();
        let previous = init_schema(&mut conn).unwrap();

        assert_eq!(previous, 0);
        assert_eq!(schema_version(&conn).unwrap(), SCHEMA_VERSION);
        assert_eq!(table_count(&conn), 1);
    }

    #[test]
    fn test_init_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_schema(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO queue_entries (payload, retry_count) VALUES ('\"a\"', 0)",
            [],
        )
        .unwrap();

        let previous = init_schema(&mut conn).unwrap();
        assert_eq!(previous, SCHEMA_VERSION);
        assert_eq!(table_count(&conn), 1);

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM queue_entries", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_migration_keeps_existing_table() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(MIGRATIONS[0].1).unwrap();
        conn.execute(
            "INSERT INTO queue_entries (payload, retry_count) VALUES ('\"kept\"', 2)",
            [],
        )
        .unwrap();

        // Table exists but version was never recorded.
        init_schema(&mut conn).unwrap();

        let retry: u32 = conn
            .query_row("SELECT retry_count FROM queue_entries", [], |row| row.get(0))
            .unwrap();
        assert_eq!(retry, 2);
    }

    #[test]
    fn test_newer_version_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_schema(&mut conn).unwrap();
        conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1)
            .unwrap();

        let err = init_schema(&mut conn).unwrap_err();
        assert!(err.to_string().contains("newer than supported"));
        assert_eq!(table_count(&conn), 1);
    }
}
