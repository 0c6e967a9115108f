//! Link providers.
//!
//! Each rebuildable link type is backed by one provider that can count its
//! source records and enumerate them a page at a time. Pages are addressed by
//! offset so a persisted batch cursor can resume anywhere.
//!
//! | Provider    | Link type      | Source                          |
//! |-------------|----------------|---------------------------------|
//! | `frontpage` | `frontpage`    | `[frontpage]`, one link         |
//! | `directory` | configured     | files below a directory         |
//! | `manifest`  | configured     | one JSON object per line        |
//! | `custom`    | `custom`       | operator links, not rebuildable |

mod custom;
mod directory;
mod frontpage;
mod manifest;

pub use custom::CustomProvider;
pub use directory::DirectoryProvider;
pub use frontpage::FrontpageProvider;
pub use manifest::ManifestProvider;

use std::sync::Arc;

use crate::config::{SiteConfig, SourceKind};
use crate::core::{EnumerationError, InfrastructureError, Link};
use crate::store::Store;

/// One enumerated source record.
pub type Enumerated = Result<Link, EnumerationError>;

pub trait LinkProvider: Send + Sync {
    fn link_type(&self) -> &str;

    /// Whether a batch may re-enumerate this type.
    fn rebuildable(&self) -> bool {
        true
    }

    /// Number of source records.
    fn count(&self) -> Result<u64, InfrastructureError>;

    /// Records `offset..offset + limit` in a stable order.
    fn enumerate(&self, offset: u64, limit: usize) -> Result<Vec<Enumerated>, InfrastructureError>;
}

/// Providers in registration order.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Box<dyn LinkProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Front page first, then `[[sources]]` in file order, then custom links.
    pub fn from_config(config: &SiteConfig, store: Arc<Store>) -> Self {
        let mut registry = Self::new();
        if config.frontpage.enable {
            registry.register(FrontpageProvider::from_config(&config.frontpage));
        }
        for source in &config.sources {
            match source.kind {
                SourceKind::Directory => registry.register(DirectoryProvider::from_config(source)),
                SourceKind::Manifest => registry.register(ManifestProvider::from_config(source)),
            }
        }
        registry.register(CustomProvider::new(store));
        registry
    }

    pub fn register(&mut self, provider: impl LinkProvider + 'static) {
        self.providers.push(Box::new(provider));
    }

    pub fn get(&self, link_type: &str) -> Option<&dyn LinkProvider> {
        self.providers
            .iter()
            .find(|p| p.link_type() == link_type)
            .map(AsRef::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn LinkProvider> {
        self.providers.iter().map(AsRef::as_ref)
    }

    pub fn is_rebuildable(&self, link_type: &str) -> bool {
        self.get(link_type).is_some_and(|p| p.rebuildable())
    }

    pub fn rebuildable_types(&self) -> Vec<String> {
        self.iter()
            .filter(|p| p.rebuildable())
            .map(|p| p.link_type().to_string())
            .collect()
    }
}
