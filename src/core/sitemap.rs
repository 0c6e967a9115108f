//! Sitemap records and chunk addressing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use super::context::SitemapContext;

/// File name of the sitemap index inside a sitemap directory.
pub const INDEX_FILE: &str = "index.xml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SitemapStatus {
    Ready,
    /// First generation failed; no files to serve yet.
    Failed,
}

impl SitemapStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ready" => Some(Self::Ready),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Derived metadata for one generated sitemap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SitemapRecord {
    pub id: String,
    pub context: SitemapContext,
    pub chunks: u32,
    pub links: u64,
    pub max_links: u32,
    pub generated_at: i64,
    /// Regenerate epoch observed when generation started.
    pub epoch: i64,
    pub status: SitemapStatus,
}

impl SitemapRecord {
    /// Directory holding this sitemap's files under the output root.
    pub fn dir(&self, output: &Path) -> PathBuf {
        output.join(&self.id)
    }

    pub fn has_index(&self) -> bool {
        self.chunks > 1
    }
}

/// Which file of a sitemap a request refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkId {
    Index,
    /// 1-based chunk number.
    Page(u32),
}

impl ChunkId {
    pub fn file_name(self) -> String {
        match self {
            Self::Index => INDEX_FILE.to_string(),
            Self::Page(n) => chunk_file_name(n),
        }
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index => f.write_str("index"),
            Self::Page(n) => write!(f, "{n}"),
        }
    }
}

pub fn chunk_file_name(n: u32) -> String {
    format!("{n}.xml")
}

/// Parse `N.xml` back to its chunk number.
pub fn parse_chunk_file_name(name: &str) -> Option<u32> {
    name.strip_suffix(".xml")?.parse().ok().filter(|n| *n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_file_names() {
        assert_eq!(ChunkId::Index.file_name(), "index.xml");
        assert_eq!(ChunkId::Page(3).file_name(), "3.xml");
        assert_eq!(parse_chunk_file_name("12.xml"), Some(12));
        assert_eq!(parse_chunk_file_name("0.xml"), None);
        assert_eq!(parse_chunk_file_name("index.xml"), None);
        assert_eq!(parse_chunk_file_name("3.xml.tmp"), None);
    }

    #[test]
    fn test_status_round_trip_names() {
        for status in [SitemapStatus::Ready, SitemapStatus::Failed] {
            assert_eq!(SitemapStatus::parse(status.as_str()), Some(status));
        }
    }
}
