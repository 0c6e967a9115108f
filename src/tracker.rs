//! Persisted rebuild/regenerate state.
//!
//! Flags live in the store's `state` table so every process (CLI, server,
//! cron) sees the same values. Multi-key transitions run inside one
//! transaction; single-flag changes go through compare-and-set.
//!
//! `regenerate_epoch` is bumped whenever new regeneration work is requested.
//! The chunk writer stamps each sitemap record with the epoch it observed at
//! start, so `regenerate_needed` is only cleared once every context was
//! written against the latest epoch.

use serde::Serialize;
use std::sync::Arc;

use crate::core::StoreResult;
use crate::store::{Store, count_settled_in, kv_cas_in, kv_get_in, kv_increment_in, kv_set_in};

const ON: &str = "1";
const OFF: &str = "0";
const EPOCH_KEY: &str = "regenerate_epoch";
const SOURCES_KEY: &str = "sources_fingerprint";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    RebuildNeeded,
    RegenerateNeeded,
    DeveloperMode,
}

impl Flag {
    pub const fn key(self) -> &'static str {
        match self {
            Self::RebuildNeeded => "rebuild_needed",
            Self::RegenerateNeeded => "regenerate_needed",
            Self::DeveloperMode => "developer_mode",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RebuildState {
    pub rebuild_needed: bool,
    pub regenerate_needed: bool,
    pub developer_mode: bool,
    pub regenerate_epoch: i64,
}

#[derive(Clone)]
pub struct StateTracker {
    store: Arc<Store>,
}

impl StateTracker {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Seed the initial state on first use: a fresh install needs a rebuild.
    /// Returns whether seeding happened.
    pub fn install(&self) -> StoreResult<bool> {
        self.store.transaction("install state", |tx| {
            if !kv_cas_in(tx, Flag::RebuildNeeded.key(), None, ON)? {
                return Ok(false);
            }
            kv_set_in(tx, Flag::RegenerateNeeded.key(), ON)?;
            kv_cas_in(tx, Flag::DeveloperMode.key(), None, OFF)?;
            kv_increment_in(tx, EPOCH_KEY)?;
            Ok(true)
        })
    }

    pub fn snapshot(&self) -> StoreResult<RebuildState> {
        self.store.transaction("read state", |tx| {
            let flag = |f: Flag| kv_get_in(tx, f.key()).map(|v| v.as_deref() == Some(ON));
            Ok(RebuildState {
                rebuild_needed: flag(Flag::RebuildNeeded)?,
                regenerate_needed: flag(Flag::RegenerateNeeded)?,
                developer_mode: flag(Flag::DeveloperMode)?,
                regenerate_epoch: read_epoch(tx)?,
            })
        })
    }

    pub fn get(&self, flag: Flag) -> StoreResult<bool> {
        Ok(self.store.kv_get(flag.key())?.as_deref() == Some(ON))
    }

    /// Atomically switch `flag` from `expected` to `new`.
    pub fn compare_and_set(&self, flag: Flag, expected: bool, new: bool) -> StoreResult<bool> {
        let as_str = |b: bool| if b { ON } else { OFF };
        self.store.transaction("compare-and-set flag", |tx| {
            let current = kv_get_in(tx, flag.key())?;
            // Absent flags read as off
            let expected = match (expected, current.as_deref()) {
                (false, None) => None,
                (e, _) => Some(as_str(e)),
            };
            kv_cas_in(tx, flag.key(), expected, as_str(new))
        })
    }

    /// Structural change: links must be re-enumerated, then files rewritten.
    pub fn mark_rebuild(&self) -> StoreResult<()> {
        self.store.transaction("mark rebuild", |tx| {
            kv_set_in(tx, Flag::RebuildNeeded.key(), ON)?;
            kv_set_in(tx, Flag::RegenerateNeeded.key(), ON)?;
            kv_increment_in(tx, EPOCH_KEY).map(|_| ())
        })
    }

    /// Metadata change: files must be rewritten from the current links.
    pub fn mark_regenerate(&self) -> StoreResult<()> {
        self.store.transaction("mark regenerate", |tx| {
            kv_set_in(tx, Flag::RegenerateNeeded.key(), ON)?;
            kv_increment_in(tx, EPOCH_KEY).map(|_| ())
        })
    }

    /// Called once every batch step succeeded.
    pub fn clear_rebuild(&self) -> StoreResult<bool> {
        self.compare_and_set(Flag::RebuildNeeded, true, false)
    }

    /// Clear `regenerate_needed` if every sitemap in `ids` was written at the
    /// current epoch and no rebuild is pending. Returns whether the flag is
    /// now clear.
    pub fn settle_regenerate(&self, ids: &[String]) -> StoreResult<bool> {
        self.store.transaction("settle regenerate", |tx| {
            if kv_get_in(tx, Flag::RebuildNeeded.key())?.as_deref() == Some(ON) {
                return Ok(false);
            }
            let epoch = read_epoch(tx)?;
            if count_settled_in(tx, ids, epoch)? != ids.len() {
                return Ok(false);
            }
            kv_set_in(tx, Flag::RegenerateNeeded.key(), OFF)?;
            Ok(true)
        })
    }

    pub fn current_epoch(&self) -> StoreResult<i64> {
        self.store.transaction("read epoch", |tx| read_epoch(tx))
    }

    pub fn set_developer_mode(&self, on: bool) -> StoreResult<()> {
        self.store
            .kv_set(Flag::DeveloperMode.key(), if on { ON } else { OFF })
    }

    /// Record the fingerprint of the configured sources. A change from a
    /// previously stored value marks a rebuild. Returns whether it changed.
    pub fn check_sources_fingerprint(&self, fingerprint: &str) -> StoreResult<bool> {
        self.store.transaction("check sources fingerprint", |tx| {
            let previous = kv_get_in(tx, SOURCES_KEY)?;
            if previous.as_deref() == Some(fingerprint) {
                return Ok(false);
            }
            kv_set_in(tx, SOURCES_KEY, fingerprint)?;
            if previous.is_none() {
                return Ok(false);
            }
            kv_set_in(tx, Flag::RebuildNeeded.key(), ON)?;
            kv_set_in(tx, Flag::RegenerateNeeded.key(), ON)?;
            kv_increment_in(tx, EPOCH_KEY)?;
            Ok(true)
        })
    }
}

fn read_epoch(conn: &rusqlite::Connection) -> StoreResult<i64> {
    Ok(kv_get_in(conn, EPOCH_KEY)?
        .and_then(|v| v.parse().ok())
        .unwrap_or(0))
}
