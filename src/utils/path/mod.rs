//! Path and URL utilities.
//!
//! Pure functions for path manipulation. No side effects.
//!
//! - [`fs`]: Filesystem path normalization (`normalize_path`, `resolve_under`, `to_slash`)
//! - [`route`]: URL path utilities (`normalize_base_path`, `decode_request_path`)

pub mod fs;
pub mod route;

pub use fs::{normalize_path, resolve_under, to_slash};
pub use route::{decode_request_path, normalize_base_path, query_param};
