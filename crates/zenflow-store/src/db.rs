use rusqlite::{Connection, Result};

/// Initialise the key-value table. Safe to call on every startup (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS kv (
            key         TEXT NOT NULL PRIMARY KEY,
            value       TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );",
    )
}
