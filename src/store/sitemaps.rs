//! Generated sitemap records.

use rusqlite::types::{Type, Value};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use super::Store;
use crate::core::{InfrastructureError, SitemapRecord, SitemapStatus, StoreResult};

const RECORD_COLUMNS: &str = "id, context, chunks, links, max_links, generated_at, epoch, status";

impl Store {
    pub fn save_sitemap(&self, record: &SitemapRecord) -> StoreResult<()> {
        let context = serde_json::to_string(&record.context)
            .map_err(InfrastructureError::payload("sitemap context"))?;
        self.with_conn(|conn| {
            conn.prepare_cached(
                "INSERT OR REPLACE INTO sitemaps (id, context, chunks, links, max_links,
                                                  generated_at, epoch, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .and_then(|mut stmt| {
                stmt.execute(params![
                    record.id,
                    context,
                    record.chunks,
                    i64::try_from(record.links).unwrap_or(i64::MAX),
                    record.max_links,
                    record.generated_at,
                    record.epoch,
                    record.status.as_str(),
                ])
            })
            .map(|_| ())
            .map_err(InfrastructureError::store("save sitemap"))
        })
    }

    pub fn load_sitemap(&self, id: &str) -> StoreResult<Option<SitemapRecord>> {
        self.with_conn(|conn| {
            conn.prepare_cached(&format!("SELECT {RECORD_COLUMNS} FROM sitemaps WHERE id = ?1"))
                .and_then(|mut stmt| stmt.query_row([id], row_to_record).optional())
                .map_err(InfrastructureError::store("load sitemap"))
        })
    }

    pub fn list_sitemaps(&self) -> StoreResult<Vec<SitemapRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare_cached(&format!("SELECT {RECORD_COLUMNS} FROM sitemaps ORDER BY id"))
                .map_err(InfrastructureError::store("list sitemaps"))?;
            let rows = stmt
                .query_map([], row_to_record)
                .map_err(InfrastructureError::store("list sitemaps"))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(InfrastructureError::store("list sitemaps"))
        })
    }

    /// Drop records whose id is not in `keep`. Returns the removed ids.
    pub fn delete_sitemaps_except(&self, keep: &[String]) -> StoreResult<Vec<String>> {
        let stale: Vec<String> = self
            .list_sitemaps()?
            .into_iter()
            .map(|record| record.id)
            .filter(|id| !keep.contains(id))
            .collect();
        if stale.is_empty() {
            return Ok(stale);
        }
        self.transaction("delete sitemaps", |tx| {
            let mut stmt = tx
                .prepare_cached("DELETE FROM sitemaps WHERE id = ?1")
                .map_err(InfrastructureError::store("delete sitemap"))?;
            for id in &stale {
                stmt.execute([id])
                    .map_err(InfrastructureError::store("delete sitemap"))?;
            }
            Ok(())
        })?;
        Ok(stale)
    }
}

/// Count ready records among `ids` generated at `epoch`.
pub(crate) fn count_settled(conn: &Connection, ids: &[String], epoch: i64) -> StoreResult<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let sql = format!(
        "SELECT COUNT(*) FROM sitemaps WHERE status = 'ready' AND epoch = ? AND id IN ({})",
        vec!["?"; ids.len()].join(", ")
    );
    let values = std::iter::once(Value::Integer(epoch))
        .chain(ids.iter().cloned().map(Value::Text));
    conn.query_row(&sql, params_from_iter(values), |row| row.get::<_, i64>(0))
        .map(|n| usize::try_from(n).unwrap_or(0))
        .map_err(InfrastructureError::store("count settled sitemaps"))
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<SitemapRecord> {
    let context: String = row.get(1)?;
    let status: String = row.get(7)?;
    let links: i64 = row.get(3)?;

    Ok(SitemapRecord {
        id: row.get(0)?,
        context: serde_json::from_str(&context)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?,
        chunks: row.get(2)?,
        links: u64::try_from(links).unwrap_or(0),
        max_links: row.get(4)?,
        generated_at: row.get(5)?,
        epoch: row.get(6)?,
        status: SitemapStatus::parse(&status).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                7,
                Type::Text,
                format!("unknown sitemap status `{status}`").into(),
            )
        })?,
    })
}
