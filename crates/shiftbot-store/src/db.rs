use rusqlite::{Connection, Result};

/// Open a connection to the shared database file with the pragmas every
/// subsystem expects.
pub fn open(path: &str) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
    Ok(conn)
}

/// Initialise all tables. Safe to call on every startup (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    create_reports_table(conn)?;
    create_subscribers_table(conn)?;
    create_dispatch_state_table(conn)?;
    Ok(())
}

/// `reported_at` keeps the local wall-clock reading with its offset for
/// display; `reported_ts` (unix seconds) gives a total order across offsets.
fn create_reports_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS reports (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            shift       TEXT    NOT NULL,
            body        TEXT    NOT NULL,
            reported_at TEXT    NOT NULL,
            reported_ts INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_reports_ts
            ON reports(reported_ts DESC, id DESC);",
    )
}

fn create_subscribers_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS subscribers (
            chat_id       INTEGER NOT NULL PRIMARY KEY,
            registered_at TEXT    NOT NULL
        );",
    )
}

/// Key/value rows owned by the dispatch scheduler (the fired watermark).
fn create_dispatch_state_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS dispatch_state (
            key        TEXT NOT NULL PRIMARY KEY,
            value      TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        init_db(&conn).unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master
                 WHERE type = 'table' AND name IN ('reports', 'subscribers', 'dispatch_state')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 3);
    }
}
