//! Shared utilities.
//!
//! | Module | Purpose                                        |
//! |--------|------------------------------------------------|
//! | `date` | Unix time and W3C datetime conversion          |
//! | `hash` | FxHash fingerprints for ids and change checks  |
//! | `mime` | Content types for served resources             |
//! | `path` | Filesystem and URL path helpers                |

pub mod date;
pub mod hash;
pub mod mime;
pub mod path;
