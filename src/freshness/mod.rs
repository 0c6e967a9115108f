//! Content-hash freshness for generated files.
//!
//! Chunk files are only replaced when their bytes change, which keeps mtimes
//! stable for crawlers and avoids needless writes on large sites.

mod cache;
mod hash;

pub use cache::{clear_cache, invalidate};
pub use hash::persist_if_changed;
