//! Error taxonomy for rebuilds and the sitemap read path.
//!
//! | Error                 | Raised when                                  | Outcome                     |
//! |-----------------------|----------------------------------------------|-----------------------------|
//! | `NotFound`            | no sitemap or chunk matches a request        | 404                         |
//! | `InvalidSelection`    | a requested type is not rebuildable          | rejected before any batch   |
//! | `EnumerationError`    | one source record cannot become a link       | recorded, batch continues   |
//! | `Infrastructure`      | store, filesystem or provider unavailable    | batch aborts, resumable     |
//! | `StaleFile`           | a record points at a missing chunk file      | 404 and a regenerate signal |

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SitemapError {
    #[error("no sitemap found for {0}")]
    NotFound(String),

    #[error("link type `{0}` is not registered as rebuildable")]
    InvalidSelection(String),

    #[error("sitemap {sitemap} references missing file `{}`", path.display())]
    StaleFile { sitemap: String, path: PathBuf },

    #[error(transparent)]
    Infrastructure(#[from] InfrastructureError),
}

impl SitemapError {
    /// Errors the read path answers with 404.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::StaleFile { .. })
    }
}

/// Failures of collaborators a batch cannot continue without.
#[derive(Debug, Error)]
pub enum InfrastructureError {
    #[error("store operation `{operation}` failed")]
    Store {
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("I/O error on `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("link provider `{link_type}` is unavailable: {message}")]
    Provider { link_type: String, message: String },

    #[error("persisted {what} is malformed")]
    Payload {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl InfrastructureError {
    /// Map a rusqlite error, for use with `map_err`.
    pub fn store(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| Self::Store { operation, source }
    }

    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }

    pub fn payload(what: &'static str) -> impl FnOnce(serde_json::Error) -> Self {
        move |source| Self::Payload { what, source }
    }
}

/// A single source record that could not be turned into a link.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{link_type}/{source_id}: {message}")]
pub struct EnumerationError {
    pub link_type: String,
    pub source_id: String,
    pub message: String,
}

impl EnumerationError {
    pub fn new(
        link_type: impl Into<String>,
        source_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            link_type: link_type.into(),
            source_id: source_id.into(),
            message: message.into(),
        }
    }
}

pub type StoreResult<T> = Result<T, InfrastructureError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_not_found_classification() {
        assert!(SitemapError::NotFound("/fr/".into()).is_not_found());
        assert!(
            SitemapError::StaleFile {
                sitemap: "abcd1234".into(),
                path: PathBuf::from("out/abcd1234/2.xml"),
            }
            .is_not_found()
        );
        assert!(!SitemapError::InvalidSelection("custom".into()).is_not_found());
    }

    #[test]
    fn test_infrastructure_display() {
        let err = InfrastructureError::io("out/1.xml")(Error::new(ErrorKind::Other, "disk full"));
        assert!(err.to_string().contains("out/1.xml"));

        let err = SitemapError::from(InfrastructureError::Provider {
            link_type: "posts".into(),
            message: "directory missing".into(),
        });
        assert!(err.to_string().contains("posts"));
    }

    #[test]
    fn test_enumeration_error_display() {
        let err = EnumerationError::new("catalog", "line 3", "expected `loc`");
        assert_eq!(err.to_string(), "catalog/line 3: expected `loc`");
    }
}
