//! Stylesheet parsing and serialization.
//!
//! Stylesheets are represented as `serde_json::Value` trees so the generic
//! [`crate::tree::TreeWalker`] can visit and edit them.
//!
//! # Usage
//!
//! ```ignore
//! use cssprite::css::{parse_stylesheet, stringify};
//!
//! let tree = parse_stylesheet(".a { background: url(a.png?__set) }")?;
//! assert_eq!(tree["stylesheet"]["rules"][0]["type"], "rule");
//! println!("{}", stringify(&tree));
//! ```

mod parse;
pub mod span;
mod stringify;

pub use parse::parse_stylesheet;
pub use span::{Location, Span};
pub use stringify::stringify;

use serde_json::{json, Value};

/// Build a declaration node.
pub fn declaration(property: &str, value: &str) -> Value {
    json!({ "type": "declaration", "property": property, "value": value })
}
