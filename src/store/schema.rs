//! Schema creation.

use rusqlite::{Connection, OptionalExtension, Transaction};

use crate::core::{InfrastructureError, StoreResult};

pub const SCHEMA_VERSION: i64 = 1;

/// Create tables and indexes if missing and record the schema version.
pub fn initialise(conn: &mut Connection) -> StoreResult<()> {
    let tx = conn
        .transaction()
        .map_err(InfrastructureError::store("begin schema transaction"))?;

    create_tables(&tx)?;
    create_indexes(&tx)?;
    ensure_schema_version(&tx)?;

    tx.commit()
        .map_err(InfrastructureError::store("commit schema transaction"))
}

fn create_tables(tx: &Transaction<'_>) -> StoreResult<()> {
    run_migration_step(
        tx,
        "create links",
        "CREATE TABLE IF NOT EXISTS links (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            type TEXT NOT NULL,
            source_id TEXT NOT NULL,
            loc TEXT NOT NULL CHECK (length(trim(loc)) > 0),
            priority REAL NOT NULL DEFAULT 0.5 CHECK (priority >= 0.0 AND priority <= 1.0),
            changefreq TEXT NOT NULL DEFAULT 'none',
            language TEXT NOT NULL DEFAULT 'und',
            lastmod INTEGER,
            visible INTEGER NOT NULL DEFAULT 1,
            customized INTEGER NOT NULL DEFAULT 0,
            extension TEXT NOT NULL DEFAULT '{\"kind\":\"none\"}',
            seen_run INTEGER NOT NULL DEFAULT 0,
            UNIQUE (type, source_id, language)
        )",
    )?;
    run_migration_step(
        tx,
        "create state",
        "CREATE TABLE IF NOT EXISTS state (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        ) WITHOUT ROWID",
    )?;
    run_migration_step(
        tx,
        "create sitemaps",
        "CREATE TABLE IF NOT EXISTS sitemaps (
            id TEXT PRIMARY KEY,
            context TEXT NOT NULL,
            chunks INTEGER NOT NULL,
            links INTEGER NOT NULL,
            max_links INTEGER NOT NULL,
            generated_at INTEGER NOT NULL,
            epoch INTEGER NOT NULL,
            status TEXT NOT NULL
        ) WITHOUT ROWID",
    )?;
    run_migration_step(
        tx,
        "create batch_jobs",
        "CREATE TABLE IF NOT EXISTS batch_jobs (
            slot INTEGER PRIMARY KEY CHECK (slot = 1),
            run_id INTEGER NOT NULL,
            payload TEXT NOT NULL,
            owner TEXT,
            lease_until INTEGER NOT NULL DEFAULT 0,
            cancel_requested INTEGER NOT NULL DEFAULT 0,
            updated_at INTEGER NOT NULL
        )",
    )?;
    run_migration_step(
        tx,
        "create batch_errors",
        "CREATE TABLE IF NOT EXISTS batch_errors (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id INTEGER NOT NULL,
            type TEXT NOT NULL,
            source_id TEXT NOT NULL,
            message TEXT NOT NULL,
            recorded_at INTEGER NOT NULL
        )",
    )
}

fn create_indexes(tx: &Transaction<'_>) -> StoreResult<()> {
    run_migration_step(
        tx,
        "index links by type",
        "CREATE INDEX IF NOT EXISTS idx_links_type_language ON links(type, language)",
    )?;
    run_migration_step(
        tx,
        "index links by output order",
        "CREATE INDEX IF NOT EXISTS idx_links_order ON links(priority DESC, loc, language)",
    )?;
    run_migration_step(
        tx,
        "index links by location",
        "CREATE INDEX IF NOT EXISTS idx_links_loc ON links(loc, language)",
    )?;
    run_migration_step(
        tx,
        "index batch errors by run",
        "CREATE INDEX IF NOT EXISTS idx_batch_errors_run ON batch_errors(run_id)",
    )
}

fn ensure_schema_version(tx: &Transaction<'_>) -> StoreResult<()> {
    run_migration_step(
        tx,
        "create schema version table",
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY CHECK (version > 0)
        ) WITHOUT ROWID",
    )?;

    let existing: Option<i64> = tx
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()
        .map_err(InfrastructureError::store("read schema version"))?;

    match existing {
        Some(_) => Ok(()),
        None => tx
            .execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [SCHEMA_VERSION],
            )
            .map(|_| ())
            .map_err(InfrastructureError::store("record schema version")),
    }
}

fn run_migration_step(tx: &Transaction<'_>, step: &'static str, sql: &str) -> StoreResult<()> {
    tx.execute(sql, [])
        .map(|_| ())
        .map_err(InfrastructureError::store(step))
}
