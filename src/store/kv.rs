//! `state` key/value table.

use rusqlite::{Connection, OptionalExtension, params};

use crate::core::{InfrastructureError, StoreResult};

pub fn get(conn: &Connection, key: &str) -> StoreResult<Option<String>> {
    conn.prepare_cached("SELECT value FROM state WHERE key = ?1")
        .and_then(|mut stmt| stmt.query_row([key], |row| row.get(0)).optional())
        .map_err(InfrastructureError::store("read state"))
}

pub fn set(conn: &Connection, key: &str, value: &str) -> StoreResult<()> {
    conn.prepare_cached(
        "INSERT INTO state (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .and_then(|mut stmt| stmt.execute(params![key, value]))
    .map(|_| ())
    .map_err(InfrastructureError::store("write state"))
}

pub fn compare_and_set(
    conn: &Connection,
    key: &str,
    expected: Option<&str>,
    new: &str,
) -> StoreResult<bool> {
    let changed = match expected {
        None => conn
            .prepare_cached("INSERT OR IGNORE INTO state (key, value) VALUES (?1, ?2)")
            .and_then(|mut stmt| stmt.execute(params![key, new])),
        Some(expected) => conn
            .prepare_cached("UPDATE state SET value = ?3 WHERE key = ?1 AND value = ?2")
            .and_then(|mut stmt| stmt.execute(params![key, expected, new])),
    }
    .map_err(InfrastructureError::store("compare-and-set state"))?;
    Ok(changed == 1)
}

/// Increment an integer counter, creating it at 1. Returns the new value.
pub fn increment(conn: &Connection, key: &str) -> StoreResult<i64> {
    conn.prepare_cached(
        "INSERT INTO state (key, value) VALUES (?1, '1')
         ON CONFLICT(key) DO UPDATE SET value = CAST(CAST(value AS INTEGER) + 1 AS TEXT)",
    )
    .and_then(|mut stmt| stmt.execute([key]))
    .map_err(InfrastructureError::store("increment counter"))?;

    let value = get(conn, key)?.unwrap_or_default();
    Ok(value.parse().unwrap_or(0))
}
