//! Generic mutable traversal over parsed trees.
//!
//! The walker visits every container node (object or array) in pre-order.
//! Visitors steer the walk through the [`Control`] value returned from
//! `enter`:
//!
//! - `Continue` descends into the node's children, then calls `leave`
//! - `Skip` does not descend, but still calls `leave`
//! - `Remove` detaches the node from its parent and never calls `leave`
//! - `Stop` ends the whole traversal immediately
//!
//! Children are enumerated by position at every step rather than from a
//! snapshot, so a sibling removed earlier in the same container is already
//! gone when the walker reaches the next one.

use regex::Regex;
use serde_json::Value;

use super::path::{NodePath, Segment};

/// Keys never descended into by default. Parsers attach source positions
/// under this name; they are not part of the tree proper.
pub const DEFAULT_EXCLUDE: &str = "position";

/// Signal returned from [`Visitor::enter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Control {
    #[default]
    Continue,
    Stop,
    Skip,
    Remove,
}

/// How a traversal ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Walk {
    Completed,
    Stopped,
}

/// Callbacks invoked by [`TreeWalker::traverse`].
///
/// `path` is relative to the traversal root; the parent of `node` is
/// `path.parent()`. Visitors may only change the tree through the returned
/// [`Control`] and by editing `node` itself.
pub trait Visitor {
    fn enter(&mut self, _node: &mut Value, _path: &NodePath) -> Control {
        Control::Continue
    }

    fn leave(&mut self, _node: &mut Value, _path: &NodePath) {}
}

/// Adapts a closure into an enter-only [`Visitor`].
pub struct OnEnter<F>(pub F);

impl<F> Visitor for OnEnter<F>
where
    F: FnMut(&mut Value, &NodePath) -> Control,
{
    fn enter(&mut self, node: &mut Value, path: &NodePath) -> Control {
        (self.0)(node, path)
    }
}

/// Recursive visitor driver.
#[derive(Debug, Clone)]
pub struct TreeWalker {
    exclude: Option<Regex>,
}

impl Default for TreeWalker {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeWalker {
    /// Walker that skips keys matching [`DEFAULT_EXCLUDE`].
    pub fn new() -> Self {
        Self {
            exclude: Regex::new(DEFAULT_EXCLUDE).ok(),
        }
    }

    /// Walker that descends into every key.
    pub fn unfiltered() -> Self {
        Self { exclude: None }
    }

    /// Walker that skips object keys matching `pattern`.
    pub fn excluding(pattern: Regex) -> Self {
        Self {
            exclude: Some(pattern),
        }
    }

    /// Walk `root` in pre-order, driving `visitor`.
    ///
    /// Scalars are never visited. `Remove` returned for the root itself
    /// cannot detach it; the traversal ends without calling `leave` and the
    /// root is left untouched.
    pub fn traverse<V: Visitor + ?Sized>(&self, root: &mut Value, visitor: &mut V) -> Walk {
        if !is_container(root) {
            return Walk::Completed;
        }

        let mut path = NodePath::root();
        match visitor.enter(root, &path) {
            Control::Stop => return Walk::Stopped,
            Control::Remove => {
                log::debug!("ignoring remove requested for traversal root");
                return Walk::Completed;
            }
            Control::Skip => {}
            Control::Continue => {
                if self.descend(root, &mut path, visitor) == Walk::Stopped {
                    return Walk::Stopped;
                }
            }
        }
        visitor.leave(root, &path);
        Walk::Completed
    }

    fn descend<V: Visitor + ?Sized>(
        &self,
        node: &mut Value,
        path: &mut NodePath,
        visitor: &mut V,
    ) -> Walk {
        let mut position = 0;

        loop {
            let segment = match &*node {
                Value::Object(map) => match map.keys().nth(position) {
                    Some(key) => Segment::Key(key.clone()),
                    None => break,
                },
                Value::Array(items) if position < items.len() => Segment::Index(position),
                _ => break,
            };

            if let Segment::Key(key) = &segment {
                if self.is_excluded(key) {
                    position += 1;
                    continue;
                }
            }

            let child = match (&mut *node, &segment) {
                (Value::Object(map), Segment::Key(key)) => map.get_mut(key),
                (Value::Array(items), Segment::Index(index)) => items.get_mut(*index),
                _ => None,
            };
            let Some(child) = child else { break };

            if !is_container(child) {
                position += 1;
                continue;
            }

            path.push(segment.clone());
            let control = visitor.enter(child, path);
            match control {
                Control::Stop => {
                    path.pop();
                    return Walk::Stopped;
                }
                Control::Remove => {
                    log::trace!("removing {}", path);
                    path.pop();
                    detach(node, &segment);
                    // the next sibling now occupies `position`
                    continue;
                }
                Control::Skip => visitor.leave(child, path),
                Control::Continue => {
                    if self.descend(child, path, visitor) == Walk::Stopped {
                        path.pop();
                        return Walk::Stopped;
                    }
                    visitor.leave(child, path);
                }
            }
            path.pop();
            position += 1;
        }

        Walk::Completed
    }

    fn is_excluded(&self, key: &str) -> bool {
        self.exclude.as_ref().is_some_and(|re| re.is_match(key))
    }
}

fn is_container(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

fn detach(parent: &mut Value, segment: &Segment) {
    match (parent, segment) {
        (Value::Array(items), Segment::Index(index)) => {
            items.remove(*index);
        }
        (Value::Object(map), Segment::Key(key)) => {
            map.shift_remove(key);
        }
        _ => {}
    }
}
