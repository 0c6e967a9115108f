//! `sitemill override`: operator settings on enumerated links.
//!
//! Overrides survive rebuilds run with preserve-custom, which restore them
//! onto the fresh rows by location and language.

use anyhow::{Result, bail};

use super::common::App;
use super::custom::normalize_loc;
use crate::log;
use crate::store::OverrideChange;

pub fn apply(
    app: &App,
    loc: &str,
    language: Option<&str>,
    change: OverrideChange,
    clear: bool,
) -> Result<usize> {
    let loc = normalize_loc(app.config.site.base_url(), loc)?;

    if clear {
        let cleared = app.store.clear_override(&loc, language)?;
        if cleared == 0 {
            bail!("no enumerated link at {loc}");
        }
        log!("override"; "cleared {} link(s) at {}, provider values return on the next rebuild", cleared, loc);
        return Ok(cleared);
    }

    if change == OverrideChange::default() {
        bail!("nothing to override, pass --priority, --changefreq or --visible");
    }
    let changed = app.store.set_override(&loc, language, change)?;
    if changed == 0 {
        bail!("no enumerated link at {loc}");
    }
    app.tracker.mark_regenerate()?;
    log!("override"; "updated {} link(s) at {}", changed, loc);
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::common::test_support::app_in;
    use crate::core::Priority;
    use crate::store::test_support::link;
    use tempfile::TempDir;

    #[test]
    fn test_override_and_clear() {
        let dir = TempDir::new().unwrap();
        let app = app_in(&dir, "");
        app.store.insert_link(&link("posts", "1", "/p/1/", 0.5)).unwrap();

        let change = OverrideChange {
            priority: Some(Priority::new(0.9).unwrap()),
            visible: Some(false),
            ..Default::default()
        };
        assert_eq!(apply(&app, "/p/1/", None, change, false).unwrap(), 1);
        let stored = app.store.all_links().unwrap();
        assert!(stored[0].customized);
        assert!(!stored[0].visible);

        assert_eq!(apply(&app, "/p/1/", None, OverrideChange::default(), true).unwrap(), 1);
        assert!(!app.store.all_links().unwrap()[0].customized);
    }

    #[test]
    fn test_unknown_location_rejected() {
        let dir = TempDir::new().unwrap();
        let app = app_in(&dir, "");
        let change = OverrideChange {
            visible: Some(false),
            ..Default::default()
        };
        assert!(apply(&app, "/nope/", None, change, false).is_err());
        assert!(apply(&app, "/nope/", None, OverrideChange::default(), false).is_err());
    }
}
