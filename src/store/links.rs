//! Link rows.

use rusqlite::types::{Type, Value};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use serde::{Deserialize, Serialize};

use super::Store;
use crate::core::{
    CUSTOM_TYPE, ChangeFreq, EnumerationError, InfrastructureError, LANGUAGE_NEUTRAL, Link,
    LinkExtension, Priority, StoreResult,
};

const LINK_COLUMNS: &str =
    "id, type, source_id, loc, priority, changefreq, language, lastmod, visible, customized, extension";

/// Which visible links a sitemap includes.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkFilter<'a> {
    /// `None` includes every language.
    pub language: Option<&'a str>,
    /// Empty includes every type.
    pub types: &'a [String],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CustomSort {
    #[default]
    Loc,
    Priority,
    Changefreq,
    Language,
}

impl CustomSort {
    const fn column(self) -> &'static str {
        match self {
            Self::Loc => "loc",
            Self::Priority => "priority",
            Self::Changefreq => "changefreq",
            Self::Language => "language",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    const fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// One page of custom links.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomPage {
    pub links: Vec<Link>,
    pub total: u64,
    /// 1-based.
    pub page: u64,
    pub pages: u64,
}

/// Operator override applied to enumerated links sharing a location.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OverrideChange {
    pub priority: Option<Priority>,
    pub changefreq: Option<ChangeFreq>,
    pub visible: Option<bool>,
}

impl Store {
    /// Insert or refresh enumerated links, stamping them with `run_id`.
    ///
    /// Rows are keyed by `(type, source_id, language)`. A customized row keeps
    /// its overridden priority, changefreq and visibility.
    #[cfg(test)]
    pub fn upsert_links(&self, links: &[Link], run_id: i64) -> StoreResult<usize> {
        if links.is_empty() {
            return Ok(0);
        }
        self.transaction("upsert links", |tx| upsert_in(tx, links, run_id))
    }

    /// Commit one enumerated page: upsert its links and log its failed
    /// records in a single transaction. Rows of failed sources are marked
    /// seen so the sweep keeps them.
    pub fn upsert_page(
        &self,
        links: &[Link],
        errors: &[EnumerationError],
        run_id: i64,
        now: i64,
    ) -> StoreResult<usize> {
        self.transaction("upsert page", |tx| {
            let upserted = upsert_in(tx, links, run_id)?;
            for error in errors {
                super::jobs::record_error_in(tx, run_id, error, now)?;
                touch_in(tx, &error.link_type, &error.source_id, run_id)?;
            }
            Ok(upserted)
        })
    }

    /// Delete rows of `link_type` not seen during `run_id`.
    pub fn sweep_unseen(&self, link_type: &str, run_id: i64) -> StoreResult<usize> {
        self.with_conn(|conn| {
            conn.prepare_cached("DELETE FROM links WHERE type = ?1 AND seen_run <> ?2")
                .and_then(|mut stmt| stmt.execute(params![link_type, run_id]))
                .map_err(InfrastructureError::store("sweep unseen links"))
        })
    }

    /// Drop operator overrides on links of `types`. The next upsert of each
    /// row takes the provider's values again.
    pub fn reset_overrides(&self, types: &[String]) -> StoreResult<usize> {
        if types.is_empty() {
            return Ok(0);
        }
        self.with_conn(|conn| {
            let sql = format!(
                "UPDATE links SET customized = 0 WHERE customized = 1 AND type IN ({})",
                placeholders(types.len())
            );
            conn.execute(&sql, params_from_iter(types))
                .map_err(InfrastructureError::store("reset overrides"))
        })
    }

    /// Customized links of `types`. Custom links are never part of a
    /// snapshot since rebuilds do not touch them.
    pub fn snapshot_overrides(&self, types: &[String]) -> StoreResult<Vec<Link>> {
        if types.is_empty() {
            return Ok(Vec::new());
        }
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {LINK_COLUMNS} FROM links
                 WHERE customized = 1 AND type IN ({}) ORDER BY id",
                placeholders(types.len())
            );
            let values = types.iter().cloned().map(Value::Text).collect();
            query_links(conn, &sql, values, "snapshot overrides")
        })
    }

    /// Re-apply a snapshot taken by [`Store::snapshot_overrides`].
    ///
    /// Overrides carry over by location and language to uncustomized rows
    /// other than the one they were taken from, e.g. when a source was
    /// re-keyed. The original row already kept its override through the
    /// upsert, or lost it to an operator edit that must stand. Returns the
    /// number of rows touched.
    pub fn restore_overrides(&self, snapshot: &[Link]) -> StoreResult<usize> {
        self.transaction("restore overrides", |tx| {
            let mut stmt = tx
                .prepare_cached(
                    "UPDATE links SET priority = ?3, changefreq = ?4, visible = ?5, customized = 1
                     WHERE loc = ?1 AND language = ?2 AND type <> ?6
                       AND customized = 0 AND id <> ?7",
                )
                .map_err(InfrastructureError::store("prepare restore override"))?;
            let mut restored = 0;
            for link in snapshot.iter().filter(|l| !l.is_custom()) {
                restored += stmt
                    .execute(params![
                        link.loc,
                        link.language,
                        link.priority.get(),
                        link.changefreq.as_str(),
                        link.visible,
                        CUSTOM_TYPE,
                        link.id.unwrap_or(-1),
                    ])
                    .map_err(InfrastructureError::store("restore override"))?;
            }
            Ok(restored)
        })
    }

    /// Apply an operator override to enumerated links at `loc`.
    ///
    /// `language = None` matches every language. Returns affected rows.
    pub fn set_override(
        &self,
        loc: &str,
        language: Option<&str>,
        change: OverrideChange,
    ) -> StoreResult<usize> {
        self.with_conn(|conn| {
            conn.prepare_cached(
                "UPDATE links SET
                    priority = COALESCE(?3, priority),
                    changefreq = COALESCE(?4, changefreq),
                    visible = COALESCE(?5, visible),
                    customized = 1
                 WHERE loc = ?1 AND (?2 IS NULL OR language = ?2) AND type <> ?6",
            )
            .and_then(|mut stmt| {
                stmt.execute(params![
                    loc,
                    language,
                    change.priority.map(Priority::get),
                    change.changefreq.map(ChangeFreq::as_str),
                    change.visible,
                    CUSTOM_TYPE,
                ])
            })
            .map_err(InfrastructureError::store("set override"))
        })
    }

    /// Drop the customized flag so the next rebuild takes provider values.
    pub fn clear_override(&self, loc: &str, language: Option<&str>) -> StoreResult<usize> {
        self.with_conn(|conn| {
            conn.prepare_cached(
                "UPDATE links SET customized = 0
                 WHERE loc = ?1 AND (?2 IS NULL OR language = ?2) AND type <> ?3",
            )
            .and_then(|mut stmt| stmt.execute(params![loc, language, CUSTOM_TYPE]))
            .map_err(InfrastructureError::store("clear override"))
        })
    }

    // ------------------------------------------------------------------------
    // single rows
    // ------------------------------------------------------------------------

    /// Insert a new link row and return its id.
    pub fn insert_link(&self, link: &Link) -> StoreResult<i64> {
        self.with_conn(|conn| insert_in(conn, link))
    }

    pub fn get_link(&self, id: i64) -> StoreResult<Option<Link>> {
        self.with_conn(|conn| {
            conn.prepare_cached(&format!("SELECT {LINK_COLUMNS} FROM links WHERE id = ?1"))
                .and_then(|mut stmt| stmt.query_row([id], row_to_link).optional())
                .map_err(InfrastructureError::store("load link"))
        })
    }

    pub fn find_link(
        &self,
        link_type: &str,
        source_id: &str,
        language: &str,
    ) -> StoreResult<Option<Link>> {
        self.with_conn(|conn| find_in(conn, link_type, source_id, language))
    }

    /// Update every column of the row identified by `link.id`.
    pub fn update_link(&self, link: &Link) -> StoreResult<bool> {
        let Some(id) = link.id else {
            return Ok(false);
        };
        let extension = encode_extension(&link.extension)?;
        self.with_conn(|conn| {
            conn.prepare_cached(
                "UPDATE links SET type = ?2, source_id = ?3, loc = ?4, priority = ?5,
                    changefreq = ?6, language = ?7, lastmod = ?8, visible = ?9,
                    customized = ?10, extension = ?11
                 WHERE id = ?1",
            )
            .and_then(|mut stmt| {
                stmt.execute(params![
                    id,
                    link.link_type,
                    link.source_id,
                    link.loc,
                    link.priority.get(),
                    link.changefreq.as_str(),
                    link.language,
                    link.lastmod,
                    link.visible,
                    link.customized,
                    extension,
                ])
            })
            .map(|changed| changed == 1)
            .map_err(InfrastructureError::store("update link"))
        })
    }

    pub fn delete_link(&self, id: i64) -> StoreResult<bool> {
        self.with_conn(|conn| {
            conn.prepare_cached("DELETE FROM links WHERE id = ?1")
                .and_then(|mut stmt| stmt.execute([id]))
                .map(|changed| changed == 1)
                .map_err(InfrastructureError::store("delete link"))
        })
    }

    // ------------------------------------------------------------------------
    // ordered reads
    // ------------------------------------------------------------------------

    /// Visible links in output order: priority desc, location asc, language asc.
    pub fn visible_links_page(
        &self,
        filter: LinkFilter<'_>,
        offset: u64,
        limit: usize,
    ) -> StoreResult<Vec<Link>> {
        let (clause, mut values) = filter_clause(filter);
        values.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
        values.push(Value::Integer(i64::try_from(offset).unwrap_or(i64::MAX)));
        let sql = format!(
            "SELECT {LINK_COLUMNS} FROM links WHERE {clause}
             ORDER BY priority DESC, loc ASC, language ASC, id ASC
             LIMIT ? OFFSET ?"
        );
        self.with_conn(|conn| query_links(conn, &sql, values, "read visible links"))
    }

    /// Every row ordered by key.
    #[cfg(test)]
    pub fn all_links(&self) -> StoreResult<Vec<Link>> {
        let sql = format!("SELECT {LINK_COLUMNS} FROM links ORDER BY type, source_id, language");
        self.with_conn(|conn| query_links(conn, &sql, Vec::new(), "read links"))
    }

    /// Row counts per link type.
    pub fn count_by_type(&self) -> StoreResult<Vec<(String, u64)>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare_cached("SELECT type, COUNT(*) FROM links GROUP BY type ORDER BY type")
                .map_err(InfrastructureError::store("count links"))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })
                .map_err(InfrastructureError::store("count links"))?;
            rows.map(|row| {
                row.map(|(t, n)| (t, u64::try_from(n).unwrap_or(0)))
                    .map_err(InfrastructureError::store("count links"))
            })
            .collect()
        })
    }

    // ------------------------------------------------------------------------
    // custom listing
    // ------------------------------------------------------------------------

    pub fn list_custom(
        &self,
        sort: CustomSort,
        order: SortOrder,
        page: u64,
        per_page: u64,
    ) -> StoreResult<CustomPage> {
        let per_page = per_page.max(1);
        let total = self.with_conn(|conn| {
            conn.prepare_cached("SELECT COUNT(*) FROM links WHERE type = ?1")
                .and_then(|mut stmt| stmt.query_row([CUSTOM_TYPE], |row| row.get::<_, i64>(0)))
                .map(|n| u64::try_from(n).unwrap_or(0))
                .map_err(InfrastructureError::store("count custom links"))
        })?;
        let pages = total.div_ceil(per_page).max(1);
        let page = page.clamp(1, pages);

        let sql = format!(
            "SELECT {LINK_COLUMNS} FROM links WHERE type = ?
             ORDER BY {} {}, loc ASC, id ASC
             LIMIT ? OFFSET ?",
            sort.column(),
            order.keyword()
        );
        let values = vec![
            Value::Text(CUSTOM_TYPE.to_string()),
            Value::Integer(i64::try_from(per_page).unwrap_or(i64::MAX)),
            Value::Integer(i64::try_from((page - 1) * per_page).unwrap_or(i64::MAX)),
        ];
        let links = self.with_conn(|conn| query_links(conn, &sql, values, "list custom links"))?;

        Ok(CustomPage {
            links,
            total,
            page,
            pages,
        })
    }
}

// ============================================================================
// helpers
// ============================================================================

fn upsert_in(conn: &Connection, links: &[Link], run_id: i64) -> StoreResult<usize> {
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO links (type, source_id, loc, priority, changefreq, language,
                                lastmod, visible, customized, extension, seen_run)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?10)
             ON CONFLICT(type, source_id, language) DO UPDATE SET
                loc = excluded.loc,
                priority = CASE WHEN links.customized
                           THEN links.priority ELSE excluded.priority END,
                changefreq = CASE WHEN links.customized
                             THEN links.changefreq ELSE excluded.changefreq END,
                lastmod = excluded.lastmod,
                visible = CASE WHEN links.customized
                          THEN links.visible ELSE excluded.visible END,
                extension = excluded.extension,
                seen_run = excluded.seen_run",
        )
        .map_err(InfrastructureError::store("prepare upsert link"))?;

    for link in links {
        let extension = encode_extension(&link.extension)?;
        stmt.execute(params![
            link.link_type,
            link.source_id,
            link.loc,
            link.priority.get(),
            link.changefreq.as_str(),
            link.language,
            link.lastmod,
            link.visible,
            extension,
            run_id,
        ])
        .map_err(InfrastructureError::store("upsert link"))?;
    }
    Ok(links.len())
}

fn touch_in(conn: &Connection, link_type: &str, source_id: &str, run_id: i64) -> StoreResult<usize> {
    conn.prepare_cached("UPDATE links SET seen_run = ?3 WHERE type = ?1 AND source_id = ?2")
        .and_then(|mut stmt| stmt.execute(params![link_type, source_id, run_id]))
        .map_err(InfrastructureError::store("touch source"))
}

fn insert_in(conn: &Connection, link: &Link) -> StoreResult<i64> {
    let extension = encode_extension(&link.extension)?;
    conn.prepare_cached(
        "INSERT INTO links (type, source_id, loc, priority, changefreq, language,
                            lastmod, visible, customized, extension)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )
    .and_then(|mut stmt| {
        stmt.execute(params![
            link.link_type,
            link.source_id,
            link.loc,
            link.priority.get(),
            link.changefreq.as_str(),
            link.language,
            link.lastmod,
            link.visible,
            link.customized,
            extension,
        ])
    })
    .map_err(InfrastructureError::store("insert link"))?;
    Ok(conn.last_insert_rowid())
}

fn find_in(
    conn: &Connection,
    link_type: &str,
    source_id: &str,
    language: &str,
) -> StoreResult<Option<Link>> {
    conn.prepare_cached(&format!(
        "SELECT {LINK_COLUMNS} FROM links WHERE type = ?1 AND source_id = ?2 AND language = ?3"
    ))
    .and_then(|mut stmt| {
        stmt.query_row(params![link_type, source_id, language], row_to_link)
            .optional()
    })
    .map_err(InfrastructureError::store("find link"))
}

fn query_links(
    conn: &Connection,
    sql: &str,
    values: Vec<Value>,
    operation: &'static str,
) -> StoreResult<Vec<Link>> {
    let mut stmt = conn
        .prepare_cached(sql)
        .map_err(InfrastructureError::store(operation))?;
    let rows = stmt
        .query_map(params_from_iter(values.iter()), row_to_link)
        .map_err(InfrastructureError::store(operation))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(InfrastructureError::store(operation))
}

fn filter_clause(filter: LinkFilter<'_>) -> (String, Vec<Value>) {
    let mut clause = String::from("visible = 1");
    let mut values = Vec::new();
    if let Some(language) = filter.language {
        clause.push_str(" AND (language = ? OR language = ?)");
        values.push(Value::Text(language.to_string()));
        values.push(Value::Text(LANGUAGE_NEUTRAL.to_string()));
    }
    if !filter.types.is_empty() {
        clause.push_str(&format!(" AND type IN ({})", placeholders(filter.types.len())));
        values.extend(filter.types.iter().cloned().map(Value::Text));
    }
    (clause, values)
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn encode_extension(extension: &LinkExtension) -> StoreResult<String> {
    serde_json::to_string(extension).map_err(InfrastructureError::payload("link extension"))
}

fn row_to_link(row: &Row<'_>) -> rusqlite::Result<Link> {
    let priority: f64 = row.get(4)?;
    let changefreq: String = row.get(5)?;
    let extension: String = row.get(10)?;

    Ok(Link {
        id: Some(row.get(0)?),
        link_type: row.get(1)?,
        source_id: row.get(2)?,
        loc: row.get(3)?,
        priority: Priority::new(priority)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Real, Box::new(e)))?,
        changefreq: changefreq
            .parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?,
        language: row.get(6)?,
        lastmod: row.get(7)?,
        visible: row.get(8)?,
        customized: row.get(9)?,
        extension: serde_json::from_str(&extension)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(10, Type::Text, Box::new(e)))?,
    })
}
