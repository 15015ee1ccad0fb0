//! Pointing declarations at their packed sheet.
//!
//! A rewritten declaration keeps any leading colour and becomes
//! `<color> url(<img_path><sheet>) -<x>px -<y>px no-repeat`. Competing
//! background longhands in the same declaration list are removed and a
//! `background-size` for the whole sheet is appended.

use serde_json::{json, Value};

use crate::css::declaration;
use crate::discovery::SpriteOptions;
use crate::error::{Result, SpriteError};
use crate::pack::raster::density_name;
use crate::pack::PackedGeometry;
use crate::tree::{Control, NodePath, TreeWalker, Visitor};

use super::group::ExtractionRecord;
use super::reference::{is_reset_property, leading_color};

/// The sheet a group was packed into.
#[derive(Debug, Clone, Copy)]
pub struct SheetRef<'a> {
    pub tag: &'a str,
    pub geometry: &'a PackedGeometry,
    /// Pixel density of the packed images (2 for retina sources).
    pub density: u32,
}

/// High-density counterpart of one rewritten declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityRule {
    /// Record position within its file, for stable output order.
    pub ordinal: usize,
    pub selectors: Vec<String>,
    /// Background value pointing at the high-density sheet.
    pub background: String,
    /// The `background-size` declaration appended during the rewrite.
    pub size: Value,
}

/// Result of rewriting one record.
#[derive(Debug, Clone, PartialEq)]
pub enum Rewrite {
    Applied { density: Option<DensityRule> },
    /// The declaration was no longer in its list.
    Vanished,
}

/// Rewrites extracted declarations once their sheet geometry is known.
#[derive(Debug, Clone)]
pub struct RuleRewriter<'a> {
    options: &'a SpriteOptions,
    walker: TreeWalker,
}

impl<'a> RuleRewriter<'a> {
    pub fn new(options: &'a SpriteOptions) -> Self {
        Self {
            options,
            walker: TreeWalker::new(),
        }
    }

    /// Rewrite `record`'s declaration in `tree`, the tree of its file.
    pub fn rewrite(
        &self,
        tree: &mut Value,
        record: &ExtractionRecord,
        sheet: &SheetRef<'_>,
    ) -> Result<Rewrite> {
        let placement = sheet
            .geometry
            .placement(&record.image)
            .ok_or_else(|| SpriteError::Packing {
                tag: sheet.tag.to_string(),
                message: format!("no placement for {}", record.image.display()),
            })?;

        let Some(parent) = record.parent.resolve_mut(tree) else {
            return Ok(Rewrite::Vanished);
        };
        let Some(index) = locate(parent, record) else {
            log::warn!("{} moved or removed before rewrite", record.node);
            return Ok(Rewrite::Vanished);
        };

        let density = sheet.density.max(1);
        let color = leading_color(&record.original_value)
            .map(|c| format!("{} ", c))
            .unwrap_or_default();
        let sheet_name = self.options.sheet_name(sheet.tag);
        let offsets = format!(
            "{}px {}px no-repeat",
            offset(placement.x, density),
            offset(placement.y, density)
        );
        let value = format!("{}url({}{}) {}", color, self.options.img_path, sheet_name, offsets);

        if let Some(node) = parent.get_mut(index) {
            node["value"] = Value::String(value);
        }
        self.strip_competing(parent, index);

        let size = declaration(
            "background-size",
            &format!(
                "{}px {}px",
                sheet.geometry.width.div_ceil(density),
                sheet.geometry.height.div_ceil(density)
            ),
        );
        if let Some(list) = parent.as_array_mut() {
            list.push(size.clone());
        }

        let density = (self.options.retina && !record.selectors.is_empty()).then(|| DensityRule {
            ordinal: record.ordinal,
            selectors: record.selectors.clone(),
            background: format!(
                "{}url({}{}) {}",
                color,
                self.options.img_path,
                density_name(&sheet_name, self.options.density()),
                offsets
            ),
            size,
        });
        Ok(Rewrite::Applied { density })
    }

    /// Remove background longhands from `parent` except the one at `target`.
    fn strip_competing(&self, parent: &mut Value, target: usize) {
        self.walker.traverse(parent, &mut StripCompeting { target });
    }
}

/// Append the high-density media block to a stylesheet tree.
///
/// Rules come out in extraction order. Nothing is appended when `rules`
/// is empty.
pub fn append_density_block(tree: &mut Value, media: &str, mut rules: Vec<DensityRule>) -> bool {
    if rules.is_empty() {
        return false;
    }
    rules.sort_by_key(|r| r.ordinal);

    let block = json!({
        "type": "media",
        "media": media,
        "rules": rules
            .into_iter()
            .map(|rule| json!({
                "type": "rule",
                "selectors": rule.selectors,
                "declarations": [declaration("background", &rule.background), rule.size],
            }))
            .collect::<Vec<_>>(),
    });

    match tree.pointer_mut("/stylesheet/rules").and_then(Value::as_array_mut) {
        Some(list) => {
            list.push(block);
            true
        }
        None => false,
    }
}

/// CSS offset for a sheet coordinate: negated, scaled down, rounded up.
fn offset(coordinate: u32, density: u32) -> i64 {
    -i64::from(coordinate.div_ceil(density))
}

/// Find the record's declaration in its list, by index first and then by
/// content in case earlier removals shifted it.
fn locate(parent: &Value, record: &ExtractionRecord) -> Option<usize> {
    let items = parent.as_array()?;
    let matches = |node: &Value| {
        node.get("property").and_then(Value::as_str) == Some(record.property.as_str())
            && node.get("value").and_then(Value::as_str) == Some(record.original_value.as_str())
    };

    if let Some(index) = record.node.index() {
        if items.get(index).is_some_and(matches) {
            return Some(index);
        }
    }
    items.iter().position(matches)
}

struct StripCompeting {
    target: usize,
}

impl Visitor for StripCompeting {
    fn enter(&mut self, node: &mut Value, path: &NodePath) -> Control {
        if path.is_root() {
            return Control::Continue;
        }
        match path.index() {
            Some(index) if index != self.target => {
                let competing = node
                    .get("property")
                    .and_then(Value::as_str)
                    .is_some_and(is_reset_property);
                if competing {
                    if index < self.target {
                        self.target -= 1;
                    }
                    Control::Remove
                } else {
                    Control::Skip
                }
            }
            _ => Control::Skip,
        }
    }
}
