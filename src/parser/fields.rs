use std::sync::LazyLock;

use regex::Regex;
use scraper::ElementRef;
use url::{Position, Url};

static CATEGORY_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/category/([^/]+)/").expect("valid id pattern"));
static SCHEME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").expect("valid scheme pattern"));

/// What to read from a source element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Text,
    Attribute(&'static str),
}

/// Pull one trimmed value out of an element that may not exist.
///
/// A missing element or a missing attribute both yield `None`.
pub fn extract(source: Option<ElementRef<'_>>, mode: Mode) -> Option<String> {
    let el = source?;
    match mode {
        Mode::Text => Some(el.text().collect::<String>().trim().to_string()),
        Mode::Attribute(name) => el.value().attr(name).map(|v| v.trim().to_string()),
    }
}

/// Resolve `href` against `base` and drop the query string and fragment.
///
/// The result keeps the text of `href` as written: host case, trailing
/// slashes and non-ASCII characters are not normalised. Only `base` is parsed,
/// to find where its origin and directory end.
pub fn canonical_url(href: &str, base: &str) -> Option<String> {
    let href = strip_query_and_fragment(href);
    if SCHEME_RE.is_match(href) {
        return Some(href.to_string());
    }

    let base = Url::parse(base).ok()?;
    let resolved = if let Some(authority) = href.strip_prefix("//") {
        format!("{}://{}", base.scheme(), authority)
    } else if href.starts_with('/') {
        format!("{}{}", &base[..Position::BeforePath], remove_dot_segments(href))
    } else if href.is_empty() {
        base[..Position::AfterPath].to_string()
    } else {
        let path = base.path();
        let dir = &path[..path.rfind('/').map_or(0, |i| i + 1)];
        format!(
            "{}{}",
            &base[..Position::BeforePath],
            remove_dot_segments(&format!("{}{}", dir, href))
        )
    };
    Some(resolved)
}

fn strip_query_and_fragment(href: &str) -> &str {
    href.find(['?', '#']).map_or(href, |end| &href[..end])
}

/// Collapse `.` and `..` segments of an absolute path.
fn remove_dot_segments(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    let last = segments.len() - 1;
    let mut out: Vec<&str> = Vec::with_capacity(segments.len());
    for (i, segment) in segments.into_iter().enumerate() {
        match segment {
            "." | ".." => {
                if segment == ".." && out.len() > 1 {
                    out.pop();
                }
                if i == last {
                    out.push("");
                }
            }
            s => out.push(s),
        }
    }
    out.join("/")
}

/// The path segment after `/category/` in an image reference.
pub fn derive_id(image_url: Option<&str>) -> Option<String> {
    let caps = CATEGORY_ID_RE.captures(image_url?)?;
    Some(caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn first<'a>(doc: &'a Html, css: &str) -> Option<ElementRef<'a>> {
        let sel = Selector::parse(css).unwrap();
        doc.select(&sel).next()
    }

    #[test]
    fn text_is_trimmed_and_flattened() {
        let doc = Html::parse_fragment(r#"<div class="n">  Ford <b>Transit</b>  </div>"#);
        let got = extract(first(&doc, ".n"), Mode::Text);
        assert_eq!(got.as_deref(), Some("Ford Transit"));
    }

    #[test]
    fn attribute_is_trimmed() {
        let doc = Html::parse_fragment(r#"<img src="  /a.jpg ">"#);
        let got = extract(first(&doc, "img"), Mode::Attribute("src"));
        assert_eq!(got.as_deref(), Some("/a.jpg"));
    }

    #[test]
    fn missing_attribute_is_none() {
        let doc = Html::parse_fragment(r#"<img alt="x">"#);
        assert_eq!(extract(first(&doc, "img"), Mode::Attribute("src")), None);
    }

    #[test]
    fn missing_source_is_none() {
        assert_eq!(extract(None, Mode::Text), None);
        assert_eq!(extract(None, Mode::Attribute("href")), None);
    }

    #[test]
    fn url_strips_query_and_fragment() {
        assert_eq!(
            canonical_url("/v/123?foo=bar#frag", "https://diks.net/").as_deref(),
            Some("https://diks.net/v/123")
        );
    }

    #[test]
    fn absolute_href_keeps_its_host() {
        assert_eq!(
            canonical_url("https://other.example/x/y?z=1", "https://diks.net/").as_deref(),
            Some("https://other.example/x/y")
        );
    }

    #[test]
    fn relative_href_without_slash() {
        assert_eq!(
            canonical_url("voertuig/42", "https://diks.net/").as_deref(),
            Some("https://diks.net/voertuig/42")
        );
    }

    #[test]
    fn host_case_is_kept() {
        assert_eq!(
            canonical_url("https://Other.Example", "https://diks.net/").as_deref(),
            Some("https://Other.Example")
        );
        assert_eq!(
            canonical_url("HTTPS://Diks.NET/Voertuig?x=1", "https://diks.net/").as_deref(),
            Some("HTTPS://Diks.NET/Voertuig")
        );
    }

    #[test]
    fn non_ascii_path_is_not_encoded() {
        assert_eq!(
            canonical_url("/voertuig/citroën c3", "https://diks.net/").as_deref(),
            Some("https://diks.net/voertuig/citroën c3")
        );
    }

    #[test]
    fn bare_scheme_is_kept() {
        assert_eq!(
            canonical_url("http://", "https://diks.net/").as_deref(),
            Some("http://")
        );
    }

    #[test]
    fn protocol_relative_href_takes_base_scheme() {
        assert_eq!(
            canonical_url("//cdn.diks.net/a.jpg#x", "https://diks.net/").as_deref(),
            Some("https://cdn.diks.net/a.jpg")
        );
    }

    #[test]
    fn dot_segments_resolve_against_base_directory() {
        let base = "https://diks.net/huren/bestelwagen";
        assert_eq!(
            canonical_url("crafter", base).as_deref(),
            Some("https://diks.net/huren/crafter")
        );
        assert_eq!(
            canonical_url("../voertuig/42", base).as_deref(),
            Some("https://diks.net/voertuig/42")
        );
        assert_eq!(
            canonical_url("./", base).as_deref(),
            Some("https://diks.net/huren/")
        );
    }

    #[test]
    fn id_from_category_segment() {
        assert_eq!(
            derive_id(Some("https://cdn.example/category/ABC123/photo.jpg")).as_deref(),
            Some("ABC123")
        );
    }

    #[test]
    fn id_absent_without_category_segment() {
        assert_eq!(derive_id(Some("https://cdn.example/images/photo.jpg")), None);
        // segment must be closed by a slash
        assert_eq!(derive_id(Some("https://cdn.example/category/ABC123")), None);
        assert_eq!(derive_id(None), None);
    }
}
