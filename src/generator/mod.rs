//! Sitemap file generation.
//!
//! - **xml**: `urlset` and `sitemapindex` rendering
//! - **writer**: streams visible links out of the store into size-bounded
//!   chunk files, one directory per sitemap context

pub mod writer;
pub mod xml;

pub use writer::{ChunkWriter, WriterOptions};
