//! Link extraction from a parsed HTML document, per the selector/attribute
//! table in spec §4.4.

use crate::policy::is_nofollow_rel;
use crate::types::{LinkRecord, LinkType, Position};
use scraper::{ElementRef, Html, Selector};
use url::Url;

struct SelectorSpec {
    selector: &'static str,
    attr: &'static str,
    link_type: Option<LinkType>,
}

// `link_type: None` marks the `rel=preload`/`rel=prefetch` rows, whose type
// is derived from the `as` attribute instead of being fixed.
const SPECS: &[SelectorSpec] = &[
    SelectorSpec { selector: "a[href]", attr: "href", link_type: Some(LinkType::Anchor) },
    SelectorSpec { selector: "img[src]", attr: "src", link_type: Some(LinkType::Image) },
    SelectorSpec { selector: "script[src]", attr: "src", link_type: Some(LinkType::Script) },
    SelectorSpec { selector: "link[rel=stylesheet][href]", attr: "href", link_type: Some(LinkType::Stylesheet) },
    SelectorSpec { selector: "link[rel=canonical][href]", attr: "href", link_type: Some(LinkType::Canonical) },
    SelectorSpec { selector: "link[rel=preload][href]", attr: "href", link_type: None },
    SelectorSpec { selector: "link[rel=modulepreload][href]", attr: "href", link_type: Some(LinkType::Script) },
    SelectorSpec { selector: "link[rel=prefetch][href]", attr: "href", link_type: None },
    SelectorSpec { selector: "iframe[src]", attr: "src", link_type: Some(LinkType::Iframe) },
    SelectorSpec { selector: "video[src]", attr: "src", link_type: Some(LinkType::Video) },
    SelectorSpec { selector: "video source[src]", attr: "src", link_type: Some(LinkType::Video) },
    SelectorSpec { selector: "audio[src]", attr: "src", link_type: Some(LinkType::Audio) },
    SelectorSpec { selector: "audio source[src]", attr: "src", link_type: Some(LinkType::Audio) },
];

fn link_type_from_as(as_value: &str) -> LinkType {
    match as_value {
        "script" => LinkType::Script,
        "style" => LinkType::Stylesheet,
        "image" => LinkType::Image,
        "font" => LinkType::Font,
        "video" => LinkType::Video,
        "audio" => LinkType::Audio,
        _ => LinkType::Other,
    }
}

/// Effective base URL: `<base href>` when present and resolvable, otherwise
/// the page's own URL.
fn effective_base(doc: &Html, page_url: &Url) -> Url {
    let Ok(base_selector) = Selector::parse("base[href]") else {
        return page_url.clone();
    };
    doc.select(&base_selector)
        .next()
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| page_url.join(href).ok())
        .unwrap_or_else(|| page_url.clone())
}

fn dom_path(el: ElementRef, max_depth: usize) -> Vec<String> {
    let mut path: Vec<String> = el
        .ancestors()
        .filter_map(|n| n.value().as_element().map(|e| e.name().to_string()))
        .collect();
    path.reverse();
    if path.len() > max_depth {
        let start = path.len() - max_depth;
        path = path[start..].to_vec();
    }
    path
}

fn position_from_path(path: &[String], el: ElementRef) -> Position {
    let has = |tag: &str| path.iter().any(|p| p == tag);
    if has("nav") {
        return Position::Navigation;
    }
    if has("header") {
        return Position::Header;
    }
    if has("footer") {
        return Position::Footer;
    }
    if has("aside") {
        return Position::Sidebar;
    }

    let class_and_id: String = el
        .ancestors()
        .filter_map(|n| n.value().as_element())
        .flat_map(|e| [e.attr("class"), e.attr("id")])
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase();
    if class_and_id.contains("breadcrumb") {
        return Position::Breadcrumbs;
    }
    if class_and_id.contains("pagination") || class_and_id.contains("pager") {
        return Position::Pagination;
    }

    if has("main") || has("article") {
        return Position::Content;
    }
    if has("body") {
        return Position::Content;
    }
    Position::Unknown
}

fn context_text(el: ElementRef) -> String {
    let Some(parent) = el.parent().and_then(ElementRef::wrap) else {
        return String::new();
    };
    let text: String = parent.text().collect::<Vec<_>>().join(" ");
    let trimmed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    trimmed.chars().take(160).collect()
}

/// Hostnames are mutually internal when equal, or when one is a suffix of
/// the other preceded by `.` (so `example.com` and `blog.example.com` match).
/// Non-default ports participate in the comparison.
pub fn is_internal(link: &Url, base: &Url) -> bool {
    let (Some(lh), Some(bh)) = (link.host_str(), base.host_str()) else {
        return false;
    };
    if link.port_or_known_default() != base.port_or_known_default() {
        return false;
    }
    if lh == bh {
        return true;
    }
    lh.strip_suffix(bh)
        .map(|rest| rest.ends_with('.'))
        .unwrap_or(false)
        || bh
            .strip_suffix(lh)
            .map(|rest| rest.ends_with('.'))
            .unwrap_or(false)
}

const MAX_DOM_PATH_DEPTH: usize = 8;

/// Extract every link matching the spec §4.4 table from `body`, resolved
/// against `page_url` (honoring `<base href>`).
pub fn extract_links(body: &str, page_url: &Url) -> Vec<LinkRecord> {
    let doc = Html::parse_document(body);
    let base = effective_base(&doc, page_url);
    let mut out = Vec::new();

    for spec in SPECS {
        let Ok(selector) = Selector::parse(spec.selector) else {
            continue;
        };
        for el in doc.select(&selector) {
            let Some(raw_href) = el.value().attr(spec.attr) else {
                continue;
            };
            // Fragment-only references carry no crawlable target.
            if raw_href.starts_with('#') {
                continue;
            }
            let Ok(resolved) = base.join(raw_href) else {
                continue;
            };

            let link_type = spec.link_type.unwrap_or_else(|| {
                el.value()
                    .attr("as")
                    .map(link_type_from_as)
                    .unwrap_or(LinkType::Other)
            });

            let text = match link_type {
                LinkType::Anchor => el.text().collect::<Vec<_>>().join(" ").trim().to_string(),
                LinkType::Image => el.value().attr("alt").unwrap_or("").to_string(),
                _ => String::new(),
            };

            let rel = el.value().attr("rel").unwrap_or("");
            let nofollow = is_nofollow_rel(rel);

            let path = dom_path(el, MAX_DOM_PATH_DEPTH);
            let position = position_from_path(&path, el);

            out.push(LinkRecord {
                internal: is_internal(&resolved, page_url),
                url: resolved.to_string(),
                link_type,
                text,
                context: context_text(el),
                nofollow,
                action: None,
                position,
                dom_path: path,
                metadata: None,
            });
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn extracts_anchor_with_text() {
        let html = r#"<html><body><a href="/page1">Page One</a></body></html>"#;
        let links = extract_links(html, &url("https://example.com/"));
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "https://example.com/page1");
        assert_eq!(links[0].text, "Page One");
        assert_eq!(links[0].link_type, LinkType::Anchor);
        assert!(links[0].internal);
    }

    #[test]
    fn fragment_only_href_is_dropped() {
        let html = r#"<a href="#section">Jump</a>"#;
        let links = extract_links(html, &url("https://example.com/"));
        assert!(links.is_empty());
    }

    #[test]
    fn external_link_classified_correctly() {
        let html = r#"<a href="https://other.com/page">Other</a>"#;
        let links = extract_links(html, &url("https://example.com/"));
        assert!(!links[0].internal);
    }

    #[test]
    fn subdomain_is_internal() {
        let html = r#"<a href="https://blog.example.com/post">Post</a>"#;
        let links = extract_links(html, &url("https://example.com/"));
        assert!(links[0].internal);
    }

    #[test]
    fn base_href_changes_resolution() {
        let html = r#"<head><base href="https://cdn.example.com/assets/"></head>
            <body><img src="logo.png" alt="Logo"></body>"#;
        let links = extract_links(html, &url("https://example.com/page"));
        assert_eq!(links[0].url, "https://cdn.example.com/assets/logo.png");
    }

    #[test]
    fn nofollow_anchor_flagged() {
        let html = r#"<a href="/target" rel="nofollow">Target</a>"#;
        let links = extract_links(html, &url("https://example.com/"));
        assert!(links[0].nofollow);
    }

    #[test]
    fn preload_type_comes_from_as_attribute() {
        let html = r#"<link rel="preload" href="/font.woff2" as="font">"#;
        let links = extract_links(html, &url("https://example.com/"));
        assert_eq!(links[0].link_type, LinkType::Font);
    }

    #[test]
    fn nav_link_tagged_navigation_position() {
        let html = r#"<nav><a href="/about">About</a></nav>"#;
        let links = extract_links(html, &url("https://example.com/"));
        assert_eq!(links[0].position, Position::Navigation);
    }
}
