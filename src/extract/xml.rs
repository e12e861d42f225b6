//! Minimal absolute-path XML element lookup backing `OnXML`.
//!
//! This is not a general XPath engine — it supports the common case the
//! spec's wire-format section calls for (§6.2: "XML parsed with XPath"):
//! an absolute, purely-child-axis path such as `/rss/channel/item/title`.
//! Predicates, attribute axes, and relative paths are out of scope.

use quick_xml::events::Event;
use quick_xml::reader::Reader;

/// Collects the text content of every element matching `xpath` (an absolute
/// slash-separated tag path) in document order.
pub fn extract_xml_text(body: &str, xpath: &str) -> Vec<String> {
    let target: Vec<&str> = xpath.trim_start_matches('/').split('/').collect();
    if target.is_empty() || xpath.is_empty() {
        return Vec::new();
    }

    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut out = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = local_name(&e.name().as_ref());
                stack.push(name);
            }
            Ok(Event::Empty(e)) => {
                let name = local_name(&e.name().as_ref());
                stack.push(name);
                if stack == target {
                    out.push(String::new());
                }
                stack.pop();
            }
            Ok(Event::Text(e)) => {
                if stack == target {
                    if let Ok(text) = e.unescape() {
                        out.push(text.into_owned());
                    }
                }
            }
            Ok(Event::End(_)) => {
                stack.pop();
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    out
}

fn local_name(qname: &[u8]) -> String {
    let s = String::from_utf8_lossy(qname);
    s.rsplit(':').next().unwrap_or(&s).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_matching_leaf_text() {
        let xml = r#"<rss><channel><item><title>Hello</title></item><item><title>World</title></item></channel></rss>"#;
        let titles = extract_xml_text(xml, "/rss/channel/item/title");
        assert_eq!(titles, vec!["Hello".to_string(), "World".to_string()]);
    }

    #[test]
    fn non_matching_path_returns_empty() {
        let xml = r#"<rss><channel><item><title>Hello</title></item></channel></rss>"#;
        assert!(extract_xml_text(xml, "/feed/entry/title").is_empty());
    }
}
