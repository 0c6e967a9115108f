use std::sync::Arc;

use super::{Enumerated, LinkProvider};
use crate::core::{CUSTOM_TYPE, InfrastructureError};
use crate::store::{CustomSort, SortOrder, Store};

/// Operator-managed links. They have no source to re-enumerate, so a batch
/// never selects them; they are listed here for reporting.
pub struct CustomProvider {
    store: Arc<Store>,
}

impl CustomProvider {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

impl LinkProvider for CustomProvider {
    fn link_type(&self) -> &str {
        CUSTOM_TYPE
    }

    fn rebuildable(&self) -> bool {
        false
    }

    fn count(&self) -> Result<u64, InfrastructureError> {
        Ok(self
            .store
            .count_by_type()?
            .into_iter()
            .find_map(|(t, n)| (t == CUSTOM_TYPE).then_some(n))
            .unwrap_or(0))
    }

    /// Reads the stored links back, ordered by location.
    fn enumerate(&self, offset: u64, limit: usize) -> Result<Vec<Enumerated>, InfrastructureError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let per_page = limit as u64;
        // Offsets that are not page-aligned are rounded down to the page start
        let page = offset / per_page + 1;
        let listing = self
            .store
            .list_custom(CustomSort::Loc, SortOrder::Asc, page, per_page)?;
        if listing.page != page {
            return Ok(Vec::new());
        }
        Ok(listing.links.into_iter().map(Ok).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Link;
    use crate::store::test_support::memory_store;

    #[test]
    fn test_custom_links_counted_not_rebuildable() {
        let store = Arc::new(memory_store());
        store
            .insert_link(&Link::new(CUSTOM_TYPE, "/b/", "/b/"))
            .unwrap();
        store
            .insert_link(&Link::new(CUSTOM_TYPE, "/a/", "/a/"))
            .unwrap();

        let provider = CustomProvider::new(store);
        assert!(!provider.rebuildable());
        assert_eq!(provider.count().unwrap(), 2);

        let first = provider.enumerate(0, 1).unwrap();
        assert_eq!(first[0].as_ref().unwrap().loc, "/a/");
        assert!(provider.enumerate(5, 1).unwrap().is_empty());
    }
}
