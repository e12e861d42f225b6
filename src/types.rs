//! Shared data types: link records, page/resource results, redirect hops.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What the crawler should do with a newly discovered URL, decided once by
/// `OnURLDiscovered` and memoized for the lifetime of the crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UrlAction {
    /// Fetch the URL and record the result.
    Crawl,
    /// Record the URL as a discovered link but never fetch it.
    RecordOnly,
    /// Ignore the URL entirely.
    Skip,
}

/// The kind of resource a link points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkType {
    Anchor,
    Image,
    Script,
    Stylesheet,
    Canonical,
    Iframe,
    Video,
    Audio,
    Font,
    Other,
}

/// A heuristic guess at where on the page a link sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Position {
    Content,
    Navigation,
    Header,
    Footer,
    Sidebar,
    Breadcrumbs,
    Pagination,
    Unknown,
}

/// Post-crawl metadata attached to a link once its target has been fetched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkMetadata {
    pub status: Option<u16>,
    pub title: Option<String>,
    pub content_type: Option<String>,
}

/// A single extracted link, before or after its target has been visited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkRecord {
    pub url: String,
    pub link_type: LinkType,
    /// Anchor text for `<a>`, `alt` text for `<img>`, empty otherwise.
    pub text: String,
    /// A short excerpt of text surrounding the link in the DOM.
    pub context: String,
    pub internal: bool,
    pub nofollow: bool,
    pub action: Option<UrlAction>,
    pub position: Position,
    /// Ancestor tag chain, outermost first, truncated to a bounded depth.
    pub dom_path: Vec<String>,
    pub metadata: Option<LinkMetadata>,
}

/// One hop of a redirect chain: the URL that responded with a 3xx and its status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectHop {
    pub url: String,
    pub status: u16,
}

/// Result emitted for every HTML fetch, including redirect hops and errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    pub url: String,
    pub status: u16,
    pub title: String,
    pub meta_description: String,
    /// `"Yes"`, `"No"`, or `"-"` when indexability could not be determined.
    pub indexable: String,
    pub content_type: String,
    pub error: Option<String>,
    pub internal_links: Vec<LinkRecord>,
    pub external_links: Vec<LinkRecord>,
    pub content_hash: Option<u64>,
    pub duplicate_content: bool,
    pub redirect_chain: Vec<RedirectHop>,
}

impl PageResult {
    pub(crate) fn redirect_hop(url: String, status: u16) -> Self {
        Self {
            url,
            status,
            title: String::new(),
            meta_description: String::new(),
            indexable: "-".to_string(),
            content_type: String::new(),
            error: None,
            internal_links: Vec::new(),
            external_links: Vec::new(),
            content_hash: None,
            duplicate_content: false,
            redirect_chain: Vec::new(),
        }
    }

    pub(crate) fn error_result(url: String, err: &str) -> Self {
        Self {
            url,
            status: 0,
            title: String::new(),
            meta_description: String::new(),
            indexable: "-".to_string(),
            content_type: String::new(),
            error: Some(err.to_string()),
            internal_links: Vec::new(),
            external_links: Vec::new(),
            content_hash: None,
            duplicate_content: false,
            redirect_chain: Vec::new(),
        }
    }
}

/// Result emitted for every non-HTML fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceResult {
    pub url: String,
    pub status: u16,
    pub content_type: String,
    pub error: Option<String>,
}

/// Request headers supplied by the caller for a single fetch, merged over
/// the collector's configured defaults (caller wins on conflict).
pub type HeaderMap = HashMap<String, String>;

/// One emission from `Collector::fetch_url`: a redirect hop, the terminal
/// page, a terminal non-HTML resource, or the asset URLs found inside a
/// fetched stylesheet. A single call can produce several (one per redirect
/// hop, plus the terminal event, plus at most one `CssAssets`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PageEvent {
    Page(PageResult),
    Resource(ResourceResult),
    /// Absolute URLs found via `url(...)` in a fetched `text/css` resource.
    /// Kept separate from `ResourceResult`, which carries no links — these
    /// feed back into discovery the same way a page's links do.
    CssAssets(Vec<String>),
}
