//! Rebuild planning.
//!
//! A plan names the link types a batch re-enumerates, in registration order.
//! An empty plan skips enumeration and only rewrites the sitemap files.

use serde::{Deserialize, Serialize};

use super::provider::ProviderRegistry;
use crate::core::SitemapError;
use crate::tracker::RebuildState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPlan {
    pub types: Vec<String>,
    /// Snapshot custom and customized links before enumeration and restore
    /// them afterwards.
    pub preserve_custom: bool,
}

impl BatchPlan {
    pub fn regenerate_only() -> Self {
        Self {
            types: Vec::new(),
            preserve_custom: false,
        }
    }

    #[inline]
    pub fn is_regenerate_only(&self) -> bool {
        self.types.is_empty()
    }
}

/// Validate `selected` against the registry and order it for the batch.
///
/// Rejects the whole selection when any type is unknown or not rebuildable.
pub fn plan_rebuild(
    registry: &ProviderRegistry,
    selected: &[String],
    preserve_custom: bool,
) -> Result<BatchPlan, SitemapError> {
    if let Some(bad) = selected.iter().find(|t| !registry.is_rebuildable(t)) {
        return Err(SitemapError::InvalidSelection(bad.clone()));
    }

    let types: Vec<String> = registry
        .rebuildable_types()
        .into_iter()
        .filter(|t| selected.contains(t))
        .collect();

    if types.is_empty() {
        return Ok(BatchPlan::regenerate_only());
    }
    Ok(BatchPlan {
        types,
        preserve_custom,
    })
}

/// Every rebuildable type, as run by cron with `auto_rebuild`.
pub fn full_plan(registry: &ProviderRegistry, preserve_custom: bool) -> BatchPlan {
    let types = registry.rebuildable_types();
    if types.is_empty() {
        return BatchPlan::regenerate_only();
    }
    BatchPlan {
        types,
        preserve_custom,
    }
}

/// What an operator rebuild request should do given the current flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildAdvice {
    /// Nothing is pending.
    UpToDate,
    /// Only files are stale; a regenerate (cron) is enough.
    RegenerateOnly,
    Proceed,
}

pub fn advise(state: &RebuildState) -> RebuildAdvice {
    match (state.rebuild_needed, state.regenerate_needed) {
        (true, _) => RebuildAdvice::Proceed,
        (false, true) => RebuildAdvice::RegenerateOnly,
        (false, false) => RebuildAdvice::UpToDate,
    }
}

/// Types an operator request rebuilds: every rebuildable type, unless
/// developer mode is on and an explicit subset was asked for.
pub fn operator_selection(
    registry: &ProviderRegistry,
    requested: &[String],
    developer_mode: bool,
) -> Vec<String> {
    if developer_mode && !requested.is_empty() {
        requested.to_vec()
    } else {
        registry.rebuildable_types()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CUSTOM_TYPE, ChangeFreq, FRONTPAGE_TYPE, Priority};
    use crate::rebuild::provider::test_support::StaticProvider;
    use crate::rebuild::provider::{CustomProvider, FrontpageProvider};
    use crate::store::test_support::memory_store;
    use std::sync::Arc;

    fn registry() -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        registry.register(FrontpageProvider::new(Priority::DEFAULT, ChangeFreq::Daily));
        registry.register(StaticProvider::numbered("posts", 1));
        registry.register(StaticProvider::numbered("catalog", 1));
        registry.register(CustomProvider::new(Arc::new(memory_store())));
        registry
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_plan_uses_registration_order() {
        let plan = plan_rebuild(&registry(), &strings(&["catalog", FRONTPAGE_TYPE]), true).unwrap();
        assert_eq!(plan.types, strings(&[FRONTPAGE_TYPE, "catalog"]));
        assert!(plan.preserve_custom);
    }

    #[test]
    fn test_empty_selection_regenerates_only() {
        let plan = plan_rebuild(&registry(), &[], true).unwrap();
        assert!(plan.is_regenerate_only());
        assert_eq!(plan, BatchPlan::regenerate_only());
    }

    #[test]
    fn test_invalid_selection_rejected() {
        let err = plan_rebuild(&registry(), &strings(&["posts", CUSTOM_TYPE]), true).unwrap_err();
        assert!(matches!(err, SitemapError::InvalidSelection(t) if t == CUSTOM_TYPE));

        let err = plan_rebuild(&registry(), &strings(&["nope"]), true).unwrap_err();
        assert!(matches!(err, SitemapError::InvalidSelection(t) if t == "nope"));
    }

    #[test]
    fn test_full_plan_covers_rebuildable_types() {
        let plan = full_plan(&registry(), true);
        assert_eq!(plan.types, strings(&[FRONTPAGE_TYPE, "posts", "catalog"]));
        assert!(full_plan(&ProviderRegistry::new(), true).is_regenerate_only());
    }

    #[test]
    fn test_advice_from_flags() {
        let mut state = RebuildState::default();
        assert_eq!(advise(&state), RebuildAdvice::UpToDate);
        state.regenerate_needed = true;
        assert_eq!(advise(&state), RebuildAdvice::RegenerateOnly);
        state.rebuild_needed = true;
        assert_eq!(advise(&state), RebuildAdvice::Proceed);
    }

    #[test]
    fn test_subset_requires_developer_mode() {
        let registry = registry();
        let subset = strings(&["posts"]);
        assert_eq!(
            operator_selection(&registry, &subset, false),
            strings(&[FRONTPAGE_TYPE, "posts", "catalog"])
        );
        assert_eq!(operator_selection(&registry, &subset, true), subset);
        assert_eq!(
            operator_selection(&registry, &[], true),
            strings(&[FRONTPAGE_TYPE, "posts", "catalog"])
        );
    }
}
