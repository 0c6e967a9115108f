//! Sitemap XML rendering.
//!
//! # Format
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <?xml-stylesheet type="text/xsl" href="/sitemap.xsl"?>
//! <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
//!   <url>
//!     <loc>https://example.com/</loc>
//!     <lastmod>2025-01-01T00:00:00Z</lastmod>
//!     <changefreq>daily</changefreq>
//!     <priority>1.0</priority>
//!   </url>
//! </urlset>
//! ```
//!
//! Entries are rendered one at a time so the writer can measure each one
//! against the chunk byte budget before committing it.

use quick_xml::escape::escape;

use crate::core::Link;
use crate::utils::date::DateTimeUtc;

pub const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// Whitespace and stylesheet settings shared by every file of a sitemap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlStyle {
    pub minify: bool,
    /// Href of the XSL stylesheet, if one is linked.
    pub stylesheet: Option<String>,
}

impl XmlStyle {
    #[inline]
    fn newline(&self) -> &'static str {
        if self.minify { "" } else { "\n" }
    }

    #[inline]
    fn indent(&self, depth: usize) -> &'static str {
        match (self.minify, depth) {
            (true, _) => "",
            (false, 1) => "  ",
            (false, _) => "    ",
        }
    }

    fn prolog(&self, xml: &mut String) {
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
        xml.push_str(self.newline());
        if let Some(href) = &self.stylesheet {
            xml.push_str("<?xml-stylesheet type=\"text/xsl\" href=\"");
            xml.push_str(&escape(href.as_str()));
            xml.push_str("\"?>");
            xml.push_str(self.newline());
        }
    }

    fn element(&self, xml: &mut String, depth: usize, name: &str, text: &str) {
        xml.push_str(self.indent(depth));
        xml.push('<');
        xml.push_str(name);
        xml.push('>');
        xml.push_str(&escape(text));
        xml.push_str("</");
        xml.push_str(name);
        xml.push('>');
        xml.push_str(self.newline());
    }
}

pub fn urlset_open(style: &XmlStyle) -> String {
    let mut xml = String::with_capacity(256);
    style.prolog(&mut xml);
    xml.push_str("<urlset xmlns=\"");
    xml.push_str(SITEMAP_NS);
    xml.push_str("\">");
    xml.push_str(style.newline());
    xml
}

pub fn urlset_close(style: &XmlStyle) -> String {
    format!("</urlset>{}", style.newline())
}

/// One `<url>` element. `loc` must already be absolute.
pub fn url_entry(style: &XmlStyle, loc: &str, link: &Link) -> String {
    let mut xml = String::with_capacity(160 + loc.len());
    xml.push_str(style.indent(1));
    xml.push_str("<url>");
    xml.push_str(style.newline());

    style.element(&mut xml, 2, "loc", loc);
    if let Some(lastmod) = link.lastmod {
        style.element(&mut xml, 2, "lastmod", &DateTimeUtc::from_unix(lastmod).to_rfc3339());
    }
    if !link.changefreq.is_none() {
        style.element(&mut xml, 2, "changefreq", link.changefreq.as_str());
    }
    style.element(&mut xml, 2, "priority", &link.priority.to_string());

    xml.push_str(style.indent(1));
    xml.push_str("</url>");
    xml.push_str(style.newline());
    xml
}

/// A `sitemapindex` listing chunk URLs with their newest `lastmod`.
pub fn sitemap_index(style: &XmlStyle, entries: &[(String, Option<i64>)]) -> String {
    let mut xml = String::with_capacity(256 + entries.len() * 128);
    style.prolog(&mut xml);
    xml.push_str("<sitemapindex xmlns=\"");
    xml.push_str(SITEMAP_NS);
    xml.push_str("\">");
    xml.push_str(style.newline());

    for (loc, lastmod) in entries {
        xml.push_str(style.indent(1));
        xml.push_str("<sitemap>");
        xml.push_str(style.newline());
        style.element(&mut xml, 2, "loc", loc);
        if let Some(lastmod) = lastmod {
            style.element(&mut xml, 2, "lastmod", &DateTimeUtc::from_unix(*lastmod).to_rfc3339());
        }
        xml.push_str(style.indent(1));
        xml.push_str("</sitemap>");
        xml.push_str(style.newline());
    }

    xml.push_str("</sitemapindex>");
    xml.push_str(style.newline());
    xml
}
