//! The persisted batch job and its per-record error log.
//!
//! At most one job exists (`slot = 1`). Workers take a time-limited lease
//! before advancing it, so two processes never step the same job at once.

use rusqlite::{Connection, OptionalExtension, params};

use super::Store;
use crate::core::{EnumerationError, InfrastructureError, StoreResult};

#[derive(Debug, Clone, PartialEq)]
pub struct JobRow {
    pub run_id: i64,
    /// Serialized job state.
    pub payload: String,
    pub owner: Option<String>,
    pub lease_until: i64,
    pub cancel_requested: bool,
}

impl Store {
    /// Insert the job unless one already exists. Returns whether it was inserted.
    pub fn job_insert(&self, run_id: i64, payload: &str, now: i64) -> StoreResult<bool> {
        self.with_conn(|conn| {
            conn.prepare_cached(
                "INSERT OR IGNORE INTO batch_jobs (slot, run_id, payload, updated_at)
                 VALUES (1, ?1, ?2, ?3)",
            )
            .and_then(|mut stmt| stmt.execute(params![run_id, payload, now]))
            .map(|inserted| inserted == 1)
            .map_err(InfrastructureError::store("insert batch job"))
        })
    }

    pub fn job_load(&self) -> StoreResult<Option<JobRow>> {
        self.with_conn(|conn| {
            conn.prepare_cached(
                "SELECT run_id, payload, owner, lease_until, cancel_requested
                 FROM batch_jobs WHERE slot = 1",
            )
            .and_then(|mut stmt| {
                stmt.query_row([], |row| {
                    Ok(JobRow {
                        run_id: row.get(0)?,
                        payload: row.get(1)?,
                        owner: row.get(2)?,
                        lease_until: row.get(3)?,
                        cancel_requested: row.get(4)?,
                    })
                })
                .optional()
            })
            .map_err(InfrastructureError::store("load batch job"))
        })
    }

    /// Persist progress. Only the lease holder of `run_id` may write.
    pub fn job_save_payload(
        &self,
        run_id: i64,
        owner: &str,
        payload: &str,
        now: i64,
    ) -> StoreResult<bool> {
        self.with_conn(|conn| {
            conn.prepare_cached(
                "UPDATE batch_jobs SET payload = ?3, updated_at = ?4
                 WHERE slot = 1 AND run_id = ?1 AND owner = ?2",
            )
            .and_then(|mut stmt| stmt.execute(params![run_id, owner, payload, now]))
            .map(|changed| changed == 1)
            .map_err(InfrastructureError::store("save batch job"))
        })
    }

    /// Take or extend the lease on `run_id`. Fails while another owner holds
    /// an unexpired lease.
    pub fn job_acquire_lease(
        &self,
        run_id: i64,
        owner: &str,
        now: i64,
        lease_secs: i64,
    ) -> StoreResult<bool> {
        self.with_conn(|conn| {
            conn.prepare_cached(
                "UPDATE batch_jobs SET owner = ?2, lease_until = ?3 + ?4
                 WHERE slot = 1 AND run_id = ?1
                   AND (owner IS NULL OR owner = ?2 OR lease_until < ?3)",
            )
            .and_then(|mut stmt| stmt.execute(params![run_id, owner, now, lease_secs]))
            .map(|changed| changed == 1)
            .map_err(InfrastructureError::store("acquire batch lease"))
        })
    }

    pub fn job_release_lease(&self, run_id: i64, owner: &str) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.prepare_cached(
                "UPDATE batch_jobs SET owner = NULL, lease_until = 0
                 WHERE slot = 1 AND run_id = ?1 AND owner = ?2",
            )
            .and_then(|mut stmt| stmt.execute(params![run_id, owner]))
            .map(|_| ())
            .map_err(InfrastructureError::store("release batch lease"))
        })
    }

    /// Flag the current job for cancellation. Returns whether a job exists.
    pub fn job_request_cancel(&self) -> StoreResult<bool> {
        self.with_conn(|conn| {
            conn.prepare_cached("UPDATE batch_jobs SET cancel_requested = 1 WHERE slot = 1")
                .and_then(|mut stmt| stmt.execute([]))
                .map(|changed| changed == 1)
                .map_err(InfrastructureError::store("cancel batch job"))
        })
    }

    pub fn job_delete(&self, run_id: i64) -> StoreResult<bool> {
        self.with_conn(|conn| {
            conn.prepare_cached("DELETE FROM batch_jobs WHERE slot = 1 AND run_id = ?1")
                .and_then(|mut stmt| stmt.execute([run_id]))
                .map(|changed| changed == 1)
                .map_err(InfrastructureError::store("delete batch job"))
        })
    }

    #[cfg(test)]
    pub fn record_batch_error(
        &self,
        run_id: i64,
        error: &EnumerationError,
        now: i64,
    ) -> StoreResult<()> {
        self.with_conn(|conn| record_error_in(conn, run_id, error, now))
    }

    /// Forget errors logged by runs before `run_id`.
    pub fn prune_batch_errors(&self, run_id: i64) -> StoreResult<usize> {
        self.with_conn(|conn| {
            conn.prepare_cached("DELETE FROM batch_errors WHERE run_id < ?1")
                .and_then(|mut stmt| stmt.execute([run_id]))
                .map_err(InfrastructureError::store("prune batch errors"))
        })
    }

    pub fn batch_errors(&self, run_id: i64) -> StoreResult<Vec<EnumerationError>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare_cached(
                    "SELECT type, source_id, message FROM batch_errors
                     WHERE run_id = ?1 ORDER BY id",
                )
                .map_err(InfrastructureError::store("read batch errors"))?;
            let rows = stmt
                .query_map([run_id], |row| {
                    Ok(EnumerationError {
                        link_type: row.get(0)?,
                        source_id: row.get(1)?,
                        message: row.get(2)?,
                    })
                })
                .map_err(InfrastructureError::store("read batch errors"))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(InfrastructureError::store("read batch errors"))
        })
    }

    /// Run id of the most recent run that logged errors.
    pub fn last_error_run(&self) -> StoreResult<Option<i64>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT MAX(run_id) FROM batch_errors", [], |row| row.get(0))
                .map_err(InfrastructureError::store("read batch errors"))
        })
    }
}

pub(super) fn record_error_in(
    conn: &Connection,
    run_id: i64,
    error: &EnumerationError,
    now: i64,
) -> StoreResult<()> {
    conn.prepare_cached(
        "INSERT INTO batch_errors (run_id, type, source_id, message, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .and_then(|mut stmt| {
        stmt.execute(params![
            run_id,
            error.link_type,
            error.source_id,
            error.message,
            now
        ])
    })
    .map(|_| ())
    .map_err(InfrastructureError::store("record batch error"))
}

#[cfg(test)]
mod tests {
    use crate::core::EnumerationError;
    use crate::store::test_support::memory_store;

    #[test]
    fn test_single_job_slot() {
        let store = memory_store();
        assert!(store.job_insert(1, "{}", 100).unwrap());
        assert!(!store.job_insert(2, "{}", 100).unwrap());
        assert_eq!(store.job_load().unwrap().unwrap().run_id, 1);
    }

    #[test]
    fn test_lease_exclusion_and_expiry() {
        let store = memory_store();
        store.job_insert(1, "{}", 100).unwrap();

        assert!(store.job_acquire_lease(1, "a", 100, 60).unwrap());
        assert!(!store.job_acquire_lease(1, "b", 120, 60).unwrap());
        // Holder may extend
        assert!(store.job_acquire_lease(1, "a", 120, 60).unwrap());
        // Expired lease can be taken over
        assert!(store.job_acquire_lease(1, "b", 200, 60).unwrap());

        assert!(!store.job_save_payload(1, "a", "{\"x\":1}", 201).unwrap());
        assert!(store.job_save_payload(1, "b", "{\"x\":1}", 201).unwrap());

        store.job_release_lease(1, "b").unwrap();
        let row = store.job_load().unwrap().unwrap();
        assert_eq!(row.owner, None);
        assert_eq!(row.payload, "{\"x\":1}");
    }

    #[test]
    fn test_lease_for_wrong_run_fails() {
        let store = memory_store();
        store.job_insert(1, "{}", 100).unwrap();
        assert!(!store.job_acquire_lease(2, "a", 100, 60).unwrap());
    }

    #[test]
    fn test_cancel_and_delete() {
        let store = memory_store();
        assert!(!store.job_request_cancel().unwrap());
        store.job_insert(4, "{}", 100).unwrap();
        assert!(store.job_request_cancel().unwrap());
        assert!(store.job_load().unwrap().unwrap().cancel_requested);
        assert!(store.job_delete(4).unwrap());
        assert!(store.job_load().unwrap().is_none());
    }

    #[test]
    fn test_batch_errors_by_run() {
        let store = memory_store();
        let err = EnumerationError::new("catalog", "line 2", "missing loc");
        store.record_batch_error(7, &err, 100).unwrap();
        store
            .record_batch_error(8, &EnumerationError::new("catalog", "line 9", "bad"), 100)
            .unwrap();

        assert_eq!(store.batch_errors(7).unwrap(), vec![err]);
        assert_eq!(store.last_error_run().unwrap(), Some(8));

        assert_eq!(store.prune_batch_errors(8).unwrap(), 1);
        assert!(store.batch_errors(7).unwrap().is_empty());
        assert_eq!(store.batch_errors(8).unwrap().len(), 1);
    }
}
