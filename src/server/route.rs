//! Request routing.
//!
//! Every context serves four resources under its base path:
//!
//! | Route                      | Resource                         |
//! |----------------------------|----------------------------------|
//! | `<base>sitemap.xml`        | index, or chunk `?page=N`        |
//! | `<base>sitemap.xsl`        | browser stylesheet               |
//! | `<base>sitemap.xsl.css`    | stylesheet CSS                   |
//! | `<base>sitemap.xsl.js`     | table sorting script             |
//!
//! A request belongs to the context with the longest matching base path.

use crate::core::ContextSpec;
use crate::utils::path::{decode_request_path, query_param};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Sitemap,
    Stylesheet,
    StylesheetCss,
    StylesheetJs,
}

impl Resource {
    fn from_file_name(name: &str) -> Option<Self> {
        match name {
            "sitemap.xml" => Some(Self::Sitemap),
            "sitemap.xsl" => Some(Self::Stylesheet),
            "sitemap.xsl.css" => Some(Self::StylesheetCss),
            "sitemap.xsl.js" => Some(Self::StylesheetJs),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route<'a> {
    pub spec: &'a ContextSpec,
    pub resource: Resource,
    /// Raw `page` query parameter.
    pub page: Option<String>,
}

/// The context whose base path is the longest prefix of `path`.
pub fn match_context<'a>(contexts: &'a [ContextSpec], path: &str) -> Option<&'a ContextSpec> {
    contexts
        .iter()
        .filter(|spec| path.starts_with(spec.context.base_path.as_str()))
        .max_by_key(|spec| spec.context.base_path.len())
}

/// Route a raw request URL. `None` for anything that is not a sitemap resource.
pub fn route<'a>(contexts: &'a [ContextSpec], url: &str) -> Option<Route<'a>> {
    let (path, query) = decode_request_path(url)?;
    let spec = match_context(contexts, &path)?;
    // Resources sit directly under the base path
    let name = path.strip_prefix(spec.context.base_path.as_str())?;
    let resource = Resource::from_file_name(name)?;

    Some(Route {
        spec,
        resource,
        page: query_param(query, "page").map(str::to_string),
    })
}
