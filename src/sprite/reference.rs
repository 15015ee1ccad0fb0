//! Recognising image references inside declaration values.
//!
//! A reference is tagged for spriting when its query starts with the
//! `__` marker: `url(img/a.png?__icons)` joins group `icons`. A query
//! without the marker is left alone.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

/// Quoted bodies may hold any character but their own quote; bare bodies
/// stop at whitespace.
static URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*(?:'([^']*)'|"([^"]*)"|([^'"\s)]+))\s*\)"#)
        .expect("url pattern is valid")
});

static COLOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#\w{3,6}|rgba?\(.+?\)").expect("color pattern is valid"));

static RESET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^background-(size|image|position)").expect("reset pattern is valid")
});

/// Marker that opens a sprite tag in a url query.
pub const TAG_MARKER: &str = "__";

/// One `url(...)` found in a declaration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Path part of the url, without quotes or query.
    pub url: String,
    /// Sprite group, present only when the query carries the marker.
    pub tag: Option<String>,
    /// Byte range of the whole `url(...)` within the value.
    pub span: Range<usize>,
}

impl Reference {
    pub fn is_tagged(&self) -> bool {
        self.tag.is_some()
    }
}

/// Find the first url reference in a declaration value.
pub fn parse_reference(value: &str) -> Option<Reference> {
    let caps = URL.captures(value)?;
    let whole = caps.get(0)?;
    let body = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3))?.as_str();

    let (url, query) = match body.split_once('?') {
        Some((url, query)) => (url, Some(query)),
        None => (body, None),
    };
    if url.is_empty() {
        return None;
    }
    let tag = query
        .and_then(|q| q.strip_prefix(TAG_MARKER))
        .filter(|tag| !tag.is_empty())
        .map(str::to_string);
    let url = url.to_string();

    Some(Reference {
        url,
        tag,
        span: whole.range(),
    })
}

/// Leading colour of a background value (`#fff`, `rgba(...)`), if any.
pub fn leading_color(value: &str) -> Option<&str> {
    COLOR.find(value).map(|m| m.as_str())
}

/// Whether a property is one of the background longhands cleared after a rewrite.
pub fn is_reset_property(property: &str) -> bool {
    RESET.is_match(property)
}

/// Whether a declaration may carry a sprite reference.
pub fn is_background_property(property: &str) -> bool {
    property.contains("background")
}
