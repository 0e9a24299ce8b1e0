use rusqlite::Connection;

use crate::error::StoreError;

pub fn apply(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS records_nhis (
            id TEXT PRIMARY KEY NOT NULL,
            created_at INTEGER NOT NULL,
            opd_number TEXT NOT NULL,
            nhis_number TEXT NOT NULL,
            ccc TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS records_nhis_created_at
            ON records_nhis(created_at DESC);

        CREATE TABLE IF NOT EXISTS records_private (
            id TEXT PRIMARY KEY NOT NULL,
            created_at INTEGER NOT NULL,
            name TEXT NOT NULL,
            membership_number TEXT NOT NULL,
            company TEXT NOT NULL,
            opd_number TEXT NOT NULL,
            phone TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS records_private_created_at
            ON records_private(created_at DESC);
        "#,
    )?;
    Ok(())
}
