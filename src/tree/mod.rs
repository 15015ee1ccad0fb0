//! Tree traversal over parsed stylesheets.
//!
//! Trees are plain `serde_json::Value` graphs: objects and arrays are
//! containers, everything else is a leaf. Nothing here knows about CSS.

mod path;
mod walker;

pub use path::{NodePath, Segment};
pub use walker::{Control, OnEnter, TreeWalker, Visitor, Walk, DEFAULT_EXCLUDE};
