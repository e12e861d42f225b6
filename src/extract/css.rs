//! CSS `url(...)` reference extraction, per spec §4.5.

use url::Url;

/// Strip `/* ... */` comments from a CSS body.
fn strip_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut chars = css.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '/' && chars.peek() == Some(&'*') {
            chars.next();
            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    break;
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}

/// Extract the raw (unresolved) string inside each `url(...)` token,
/// handling single-quoted, double-quoted, and unquoted forms.
fn extract_url_tokens(css: &str) -> Vec<String> {
    let mut out = Vec::new();
    let bytes = css.as_bytes();
    let mut i = 0;
    while let Some(pos) = css[i..].find("url(") {
        let start = i + pos + 4;
        let mut j = start;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        let quote = bytes.get(j).copied().filter(|&b| b == b'\'' || b == b'"');
        let value_start = if quote.is_some() { j + 1 } else { j };
        let end = if let Some(q) = quote {
            css[value_start..].find(q as char).map(|p| value_start + p)
        } else {
            css[value_start..].find(')').map(|p| value_start + p)
        };
        let Some(end) = end else { break };
        let value = css[value_start..end].trim().to_string();
        if !value.is_empty() {
            out.push(value);
        }
        let Some(close) = css[end..].find(')') else { break };
        i = end + close + 1;
    }
    out
}

/// Given a CSS body and the URL it was fetched from, return the deduplicated
/// list of absolute URLs referenced via `url(...)`, excluding `data:` URIs.
pub fn extract_css_urls(css: &str, base: &Url) -> Vec<Url> {
    let stripped = strip_comments(css);
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for raw in extract_url_tokens(&stripped) {
        if raw.starts_with("data:") {
            continue;
        }
        let Ok(resolved) = base.join(&raw) else {
            continue;
        };
        if seen.insert(resolved.clone()) {
            out.push(resolved);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/styles/main.css").unwrap()
    }

    #[test]
    fn extracts_quoted_and_unquoted_urls() {
        let css = r#"
            .a { background: url(image.png); }
            .b { background: url('other.png'); }
            .c { background: url("third.png"); }
        "#;
        let urls = extract_css_urls(css, &base());
        assert_eq!(urls.len(), 3);
        assert!(urls.iter().any(|u| u.as_str().ends_with("image.png")));
        assert!(urls.iter().any(|u| u.as_str().ends_with("other.png")));
        assert!(urls.iter().any(|u| u.as_str().ends_with("third.png")));
    }

    #[test]
    fn strips_comments_before_scanning() {
        let css = "/* url(ignored.png) */ .a { background: url(real.png); }";
        let urls = extract_css_urls(css, &base());
        assert_eq!(urls.len(), 1);
        assert!(urls[0].as_str().ends_with("real.png"));
    }

    #[test]
    fn excludes_data_uris() {
        let css = ".a { background: url(data:image/png;base64,AAAA); }";
        let urls = extract_css_urls(css, &base());
        assert!(urls.is_empty());
    }

    #[test]
    fn deduplicates_repeated_references() {
        let css = ".a { background: url(shared.png); } .b { background: url(shared.png); }";
        let urls = extract_css_urls(css, &base());
        assert_eq!(urls.len(), 1);
    }

    #[test]
    fn resolves_relative_to_css_file_url() {
        let css = ".a { background: url(../img/logo.png); }";
        let urls = extract_css_urls(css, &base());
        assert_eq!(urls[0].as_str(), "https://example.com/img/logo.png");
    }
}
