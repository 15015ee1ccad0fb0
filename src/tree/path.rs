//! Addressing nodes inside a parsed tree.

use std::fmt;

use serde_json::Value;

/// One step from a container to a child.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Key inside an object.
    Key(String),
    /// Position inside an array.
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // JSON pointer escaping
            Segment::Key(key) => write!(f, "{}", key.replace('~', "~0").replace('/', "~1")),
            Segment::Index(index) => write!(f, "{}", index),
        }
    }
}

/// Location of a node relative to a traversal root.
///
/// The empty path is the root itself. The parent of a node is the path
/// with the last segment removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodePath {
    segments: Vec<Segment>,
}

impl NodePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// The segment addressing this node inside its parent.
    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    /// Index of this node inside its parent, when the parent is an array.
    pub fn index(&self) -> Option<usize> {
        match self.segments.last() {
            Some(Segment::Index(index)) => Some(*index),
            _ => None,
        }
    }

    /// Path of the containing node, `None` for the root.
    pub fn parent(&self) -> Option<NodePath> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// A new path one level deeper.
    pub fn child(&self, segment: Segment) -> NodePath {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }

    /// Replace the final index, e.g. after siblings shifted.
    pub fn with_index(&self, index: usize) -> NodePath {
        let mut path = self.clone();
        if let Some(last) = path.segments.last_mut() {
            *last = Segment::Index(index);
        }
        path
    }

    pub(crate) fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    pub(crate) fn pop(&mut self) {
        self.segments.pop();
    }

    /// Follow this path from `root`.
    pub fn resolve<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(root, |node, segment| match (node, segment) {
                (Value::Object(map), Segment::Key(key)) => map.get(key),
                (Value::Array(items), Segment::Index(index)) => items.get(*index),
                _ => None,
            })
    }

    /// Follow this path from `root`, mutably.
    pub fn resolve_mut<'a>(&self, root: &'a mut Value) -> Option<&'a mut Value> {
        let mut node = root;
        for segment in &self.segments {
            node = match (node, segment) {
                (Value::Object(map), Segment::Key(key)) => map.get_mut(key)?,
                (Value::Array(items), Segment::Index(index)) => items.get_mut(*index)?,
                _ => return None,
            };
        }
        Some(node)
    }
}

impl fmt::Display for NodePath {
    /// Renders as a JSON pointer (`/stylesheet/rules/0`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}
