//! MIME type constants for served resources.

use std::path::Path;

/// Common MIME type constants.
pub mod types {
    pub const HTML: &str = "text/html; charset=utf-8";
    pub const PLAIN: &str = "text/plain; charset=utf-8";
    pub const CSS: &str = "text/css; charset=utf-8";
    pub const JAVASCRIPT: &str = "text/javascript; charset=utf-8";
    pub const XML: &str = "application/xml; charset=utf-8";
}

/// Guess MIME type from a file or route path.
pub fn from_path(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("xml" | "xsl") => types::XML,
        Some("html" | "htm") => types::HTML,
        Some("css") => types::CSS,
        Some("js") => types::JAVASCRIPT,
        _ => types::PLAIN,
    }
}
