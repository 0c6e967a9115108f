//! `sitemill custom`: operator-managed links.
//!
//! Custom links are never re-enumerated; a rebuild with preserve-custom keeps
//! them. Every change marks the sitemaps for regeneration.

use anyhow::{Result, bail};

use super::args::CustomFields;
use super::common::App;
use crate::core::{CUSTOM_TYPE, LANGUAGE_NEUTRAL, Link, SitemapError};
use crate::log;
use crate::store::{CustomPage, CustomSort, SortOrder};

/// Rows per listing page.
pub const PER_PAGE: u64 = 50;

/// Normalize an operator-supplied location to a site-relative path.
///
/// Absolute URLs must point at the configured site.
pub fn normalize_loc(base_url: &str, loc: &str) -> Result<String> {
    let loc = loc.trim();
    if loc.is_empty() {
        bail!("link location must not be empty");
    }
    if loc.contains("://") {
        let Some(path) = loc.strip_prefix(base_url) else {
            bail!("`{loc}` is not on this site ({base_url})");
        };
        return Ok(if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        });
    }
    Ok(if loc.starts_with('/') {
        loc.to_string()
    } else {
        format!("/{loc}")
    })
}

pub fn list(app: &App, sort: CustomSort, order: SortOrder, page: u64) -> Result<CustomPage> {
    let listing = app.store.list_custom(sort, order, page, PER_PAGE)?;
    print!("{}", render(&listing));
    Ok(listing)
}

fn render(listing: &CustomPage) -> String {
    if listing.links.is_empty() {
        return "No custom links available.\n".to_string();
    }
    let mut out = format!(
        "{:>6}  {:<40} {:>8}  {:<10} {}\n",
        "ID", "Location", "Priority", "Changefreq", "Language"
    );
    for link in &listing.links {
        out.push_str(&format!(
            "{:>6}  {:<40} {:>8}  {:<10} {}\n",
            link.id.unwrap_or_default(),
            link.loc,
            link.priority.to_string(),
            link.changefreq.label(),
            link.language,
        ));
    }
    out.push_str(&format!(
        "page {} of {} ({} links)\n",
        listing.page, listing.pages, listing.total
    ));
    out
}

pub fn add(app: &App, loc: &str, fields: &CustomFields) -> Result<Link> {
    let loc = normalize_loc(app.config.site.base_url(), loc)?;
    let language = fields.language.as_deref().unwrap_or(LANGUAGE_NEUTRAL);
    ensure_unused(app, &loc, language, None)?;

    let mut link = Link::new(CUSTOM_TYPE, loc.clone(), loc).with_language(language);
    apply_fields(&mut link, fields);
    link.id = Some(app.store.insert_link(&link)?);

    app.tracker.mark_regenerate()?;
    log!("custom"; "added {} [{}]", link.loc, link.language);
    Ok(link)
}

pub fn edit(app: &App, id: i64, loc: Option<&str>, fields: &CustomFields) -> Result<Link> {
    let mut link = load_custom(app, id)?;
    if let Some(loc) = loc {
        link.loc = normalize_loc(app.config.site.base_url(), loc)?;
        link.source_id = link.loc.clone();
    }
    apply_fields(&mut link, fields);
    ensure_unused(app, &link.loc, &link.language, Some(id))?;

    app.store.update_link(&link)?;
    app.tracker.mark_regenerate()?;
    log!("custom"; "updated {} [{}]", link.loc, link.language);
    Ok(link)
}

pub fn remove(app: &App, id: i64) -> Result<Link> {
    let link = load_custom(app, id)?;
    app.store.delete_link(id)?;
    app.tracker.mark_regenerate()?;
    log!("custom"; "removed {}", link.loc);
    Ok(link)
}

fn load_custom(app: &App, id: i64) -> Result<Link> {
    match app.store.get_link(id)? {
        Some(link) if link.link_type == CUSTOM_TYPE => Ok(link),
        _ => Err(SitemapError::NotFound(format!("custom link {id}")).into()),
    }
}

fn ensure_unused(app: &App, loc: &str, language: &str, except: Option<i64>) -> Result<()> {
    if let Some(existing) = app.store.find_link(CUSTOM_TYPE, loc, language)?
        && existing.id != except
    {
        bail!("the custom link {loc} [{language}] is already used");
    }
    Ok(())
}

fn apply_fields(link: &mut Link, fields: &CustomFields) {
    if let Some(priority) = fields.priority {
        link.priority = priority;
    }
    if let Some(changefreq) = fields.changefreq {
        link.changefreq = changefreq;
    }
    if let Some(language) = &fields.language {
        link.language = language.clone();
    }
    if let Some(visible) = fields.visible {
        link.visible = visible;
    }
}
