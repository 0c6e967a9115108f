//! Configuration section definitions.
//!
//! Each module corresponds to a section in `sitemill.toml`:
//!
//! | Module    | TOML Section                 | Purpose                           |
//! |-----------|------------------------------|-----------------------------------|
//! | `site`    | `[site]`                     | Public base URL                   |
//! | `context` | `[[contexts]]`               | Sitemaps to generate and serve    |
//! | `sitemap` | `[sitemap]`                  | Output directory and chunk limits |
//! | `store`   | `[store]`                    | Link database location            |
//! | `batch`   | `[batch]`                    | Rebuild paging, time limit, lease |
//! | `serve`   | `[serve]`                    | HTTP server and cron interval     |
//! | `source`  | `[frontpage]`, `[[sources]]` | Link providers                    |
//! | `xsl`     | `[xsl]`                      | Stylesheet strings                |

mod batch;
mod context;
mod serve;
mod site;
mod sitemap;
mod source;
mod store;
mod xsl;

pub use batch::BatchConfig;
pub use context::ContextConfig;
pub use serve::ServeConfig;
pub use site::SiteSectionConfig;
pub use sitemap::SitemapSectionConfig;
pub use source::{FrontpageConfig, SourceConfig, SourceKind};
pub use store::StoreConfig;
pub use xsl::{XSL_STRINGS, XslConfig};
