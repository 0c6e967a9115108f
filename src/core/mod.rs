//! Core domain types shared by the store, rebuild and serving layers.

pub mod context;
pub mod error;
pub mod link;
pub mod sitemap;
mod state;

pub use context::{ContextSpec, SitemapContext};
pub use error::{EnumerationError, InfrastructureError, SitemapError, StoreResult};
pub use link::{
    CUSTOM_TYPE, ChangeFreq, FRONTPAGE_TYPE, LANGUAGE_NEUTRAL, Link, LinkExtension, Priority,
};
pub use sitemap::{ChunkId, SitemapRecord, SitemapStatus};
pub use state::{is_shutdown, register_server, setup_shutdown_handler};
