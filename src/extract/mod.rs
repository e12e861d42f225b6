//! Link/CSS/sitemap discovery: the three ways the crawler finds new URLs.

pub mod css;
pub mod html;
pub mod sitemap;
pub mod xml;

pub use css::extract_css_urls;
pub use html::extract_links;
pub use sitemap::{default_sitemap_url, fetch_sitemap_urls, sitemap_directives};
pub use xml::extract_xml_text;
