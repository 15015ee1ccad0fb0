//! Finding tagged background declarations in a stylesheet tree.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::discovery::{absolute, normalize, MissingAssetPolicy, SpriteOptions};
use crate::error::{Result, SpriteError};
use crate::tree::{Control, NodePath, Segment, TreeWalker, Visitor, Walk};

use super::group::{ExtractionRecord, FileId};
use super::inline::{inline_image, Inlined, INLINE_TAG};
use super::reference::{is_background_property, parse_reference};

/// What extraction found in one stylesheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileExtraction {
    pub file: FileId,
    /// Tagged declarations, in document order.
    pub records: Vec<ExtractionRecord>,
    /// Tagged images that did not exist.
    pub dropped: Vec<PathBuf>,
    /// Declarations rewritten to data URIs.
    pub inlined: usize,
    /// Recoverable problems to show the user.
    pub warnings: Vec<String>,
}

/// Scans a parsed stylesheet for background declarations tagged for spriting.
#[derive(Debug, Clone)]
pub struct DeclarationExtractor<'a> {
    options: &'a SpriteOptions,
    walker: TreeWalker,
}

impl<'a> DeclarationExtractor<'a> {
    pub fn new(options: &'a SpriteOptions) -> Self {
        Self {
            options,
            walker: TreeWalker::new(),
        }
    }

    /// Extract records from `tree`, parsed from the file at `source`.
    ///
    /// Image urls resolve against the directory of `source`. The tree is
    /// only modified for `inline` references.
    pub fn extract(&self, file: FileId, source: &Path, tree: &mut Value) -> Result<FileExtraction> {
        let base_dir = absolute(source)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let mut collector = Collector {
            options: self.options,
            source,
            base_dir,
            selectors: HashMap::new(),
            found: FileExtraction {
                file,
                ..Default::default()
            },
            error: None,
        };

        if self.walker.traverse(tree, &mut collector) == Walk::Stopped {
            if let Some(err) = collector.error {
                return Err(err);
            }
        }

        log::debug!(
            "{}: {} tagged declaration(s)",
            source.display(),
            collector.found.records.len()
        );
        Ok(collector.found)
    }
}

/// Resolve an image url relative to a stylesheet directory.
///
/// A leading `/` is treated as relative, not as a file system root.
pub fn resolve_asset(base_dir: &Path, url: &str) -> PathBuf {
    normalize(&base_dir.join(url.trim_start_matches('/')))
}

struct Collector<'a> {
    options: &'a SpriteOptions,
    source: &'a Path,
    base_dir: PathBuf,
    /// Selectors of each rule, keyed by the path of its declaration list.
    selectors: HashMap<NodePath, Vec<String>>,
    found: FileExtraction,
    error: Option<SpriteError>,
}

impl Visitor for Collector<'_> {
    fn enter(&mut self, node: &mut Value, path: &NodePath) -> Control {
        if let Some(selectors) = node.get("selectors").and_then(Value::as_array) {
            if node.get("declarations").is_some() {
                let selectors = selectors
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect();
                self.selectors
                    .insert(path.child(Segment::Key("declarations".to_string())), selectors);
            }
            return Control::Continue;
        }

        let (Some(property), Some(value)) = (
            node.get("property").and_then(Value::as_str),
            node.get("value").and_then(Value::as_str),
        ) else {
            return Control::Continue;
        };
        if !is_background_property(property) {
            return Control::Skip;
        }

        let (property, value) = (property.to_string(), value.to_string());
        match self.declaration(node, path, property, value) {
            Ok(()) => Control::Skip,
            Err(err) => {
                self.error = Some(err);
                Control::Stop
            }
        }
    }
}

impl Collector<'_> {
    fn declaration(
        &mut self,
        node: &mut Value,
        path: &NodePath,
        property: String,
        value: String,
    ) -> Result<()> {
        let Some(reference) = parse_reference(&value) else {
            return Ok(());
        };
        let Some(tag) = reference.tag.clone() else {
            return Ok(());
        };

        let image = resolve_asset(&self.base_dir, &reference.url);
        if !image.is_file() {
            return self.missing(image);
        }

        if tag == INLINE_TAG && self.options.size_limit > 0 {
            let url = match inline_image(&image, self.options.size_limit) {
                Inlined::Embedded(uri) => {
                    self.found.inlined += 1;
                    uri
                }
                Inlined::TooLarge { size } => {
                    self.found.warnings.push(format!(
                        "{} is {} bytes, over the inline limit of {}; kept as a plain url",
                        image.display(),
                        size,
                        self.options.size_limit
                    ));
                    reference.url.clone()
                }
                Inlined::Unreadable(message) => {
                    self.found
                        .warnings
                        .push(format!("cannot inline {}: {}", image.display(), message));
                    reference.url.clone()
                }
            };
            let mut rewritten = value;
            rewritten.replace_range(reference.span.clone(), &format!("url({})", url));
            node["value"] = Value::String(rewritten);
            return Ok(());
        }

        let parent = path.parent().unwrap_or_default();
        let selectors = self.selectors.get(&parent).cloned().unwrap_or_default();
        let ordinal = self.found.records.len();
        self.found.records.push(ExtractionRecord {
            file: self.found.file,
            ordinal,
            node: path.clone(),
            parent,
            selectors,
            property,
            original_value: value,
            tag,
            image,
        });
        Ok(())
    }

    fn missing(&mut self, image: PathBuf) -> Result<()> {
        match self.options.missing_assets {
            MissingAssetPolicy::Fail => {
                return Err(SpriteError::MissingAsset {
                    path: image,
                    source_file: self.source.to_path_buf(),
                })
            }
            MissingAssetPolicy::Warn => self.found.warnings.push(format!(
                "{} references missing image {}",
                self.source.display(),
                image.display()
            )),
            MissingAssetPolicy::Ignore => {}
        }
        log::debug!("dropping reference to {}", image.display());
        self.found.dropped.push(image);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::css::parse_stylesheet;
    use image::{ImageBuffer, Rgba, RgbaImage};
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        css: PathBuf,
        images: PathBuf,
    }

    fn fixture(images: &[&str]) -> Fixture {
        let temp = TempDir::new().unwrap();
        let css_dir = temp.path().join("css");
        let img_dir = temp.path().join("img");
        fs::create_dir_all(&css_dir).unwrap();
        fs::create_dir_all(&img_dir).unwrap();
        for name in images {
            let img: RgbaImage = ImageBuffer::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
            img.save(img_dir.join(name)).unwrap();
        }
        Fixture {
            css: css_dir.join("site.css"),
            images: absolute(&img_dir),
            _temp: temp,
        }
    }

    fn extract(
        options: &SpriteOptions,
        fx: &Fixture,
        source: &str,
    ) -> (Result<FileExtraction>, Value) {
        let mut tree = parse_stylesheet(source).unwrap();
        let result = DeclarationExtractor::new(options).extract(3, &fx.css, &mut tree);
        (result, tree)
    }

    #[test]
    fn test_records_tagged_backgrounds_only() {
        let fx = fixture(&["a.png", "b.png"]);
        let source = r#"
.a { color: red; background: #fff url(../img/a.png?__set) }
.b, .c { background-image: url("../img/b.png?__icons"); }
.d { background: url(../img/a.png) }
.e { background: url(../img/a.png?v=1) }
.f { border-image: url(../img/a.png?__set) }
"#;
        let (result, _) = extract(&SpriteOptions::default(), &fx, source);
        let found = result.unwrap();

        assert_eq!(found.file, 3);
        assert_eq!(found.records.len(), 2);

        let a = &found.records[0];
        assert_eq!(a.tag, "set");
        assert_eq!(a.selectors, vec![".a"]);
        assert_eq!(a.property, "background");
        assert_eq!(a.original_value, "#fff url(../img/a.png?__set)");
        assert_eq!(a.image, fx.images.join("a.png"));
        assert_eq!(a.node.to_string(), "/stylesheet/rules/0/declarations/1");
        assert_eq!(a.parent.to_string(), "/stylesheet/rules/0/declarations");

        let b = &found.records[1];
        assert_eq!((b.tag.as_str(), b.ordinal), ("icons", 1));
        assert_eq!(b.selectors, vec![".b", ".c"]);
    }

    #[test]
    fn test_quoted_path_with_spaces_joins_group() {
        let fx = fixture(&["a b.png"]);
        let source = ".a { background: url('../img/a b.png?__icons') no-repeat }";
        let (result, _) = extract(&SpriteOptions::default(), &fx, source);
        let found = result.unwrap();

        assert_eq!(found.records.len(), 1);
        assert_eq!(found.records[0].tag, "icons");
        assert_eq!(found.records[0].image, fx.images.join("a b.png"));
    }

    #[test]
    fn test_nested_rules_keep_their_selectors() {
        let fx = fixture(&["a.png"]);
        let source = "@media print { .p { background: url(../img/a.png?__set) } }";
        let (result, _) = extract(&SpriteOptions::default(), &fx, source);
        let found = result.unwrap();

        assert_eq!(found.records.len(), 1);
        assert_eq!(found.records[0].selectors, vec![".p"]);
        assert_eq!(
            found.records[0].parent.to_string(),
            "/stylesheet/rules/0/rules/0/declarations"
        );
    }

    #[test]
    fn test_missing_image_policies() {
        let fx = fixture(&[]);
        let source = ".a { background: url(../img/none.png?__set) }";

        let (result, tree) = extract(&SpriteOptions::default(), &fx, source);
        let found = result.unwrap();
        assert!(found.records.is_empty());
        assert_eq!(found.dropped, vec![fx.images.join("none.png")]);
        assert_eq!(found.warnings.len(), 1);
        // the declaration itself is untouched
        assert_eq!(
            tree["stylesheet"]["rules"][0]["declarations"][0]["value"],
            "url(../img/none.png?__set)"
        );

        let ignore = SpriteOptions {
            missing_assets: MissingAssetPolicy::Ignore,
            ..Default::default()
        };
        let found = extract(&ignore, &fx, source).0.unwrap();
        assert!(found.warnings.is_empty());
        assert_eq!(found.dropped.len(), 1);

        let fail = SpriteOptions {
            missing_assets: MissingAssetPolicy::Fail,
            ..Default::default()
        };
        let err = extract(&fail, &fx, source).0.unwrap_err();
        assert!(matches!(err, SpriteError::MissingAsset { .. }));
    }

    #[test]
    fn test_inline_tag_embeds_small_images() {
        let fx = fixture(&["dot.png"]);
        let source = ".a { background: #000 url(../img/dot.png?__inline) no-repeat }";

        let (result, tree) = extract(&SpriteOptions::default(), &fx, source);
        let found = result.unwrap();

        assert!(found.records.is_empty());
        assert_eq!(found.inlined, 1);
        let value = tree["stylesheet"]["rules"][0]["declarations"][0]["value"]
            .as_str()
            .unwrap();
        assert!(value.starts_with("#000 url(data:image/png;base64,"));
        assert!(value.ends_with(") no-repeat"));
    }

    #[test]
    fn test_inline_over_limit_strips_marker() {
        let fx = fixture(&["dot.png"]);
        let options = SpriteOptions {
            size_limit: 1,
            ..Default::default()
        };
        let source = ".a { background: url(../img/dot.png?__inline) }";
        let (result, tree) = extract(&options, &fx, source);
        let found = result.unwrap();

        assert_eq!(found.inlined, 0);
        assert_eq!(found.warnings.len(), 1);
        assert_eq!(
            tree["stylesheet"]["rules"][0]["declarations"][0]["value"],
            "url(../img/dot.png)"
        );
    }

    #[test]
    fn test_inline_disabled_packs_as_group() {
        let fx = fixture(&["dot.png"]);
        let options = SpriteOptions {
            size_limit: 0,
            ..Default::default()
        };
        let found = extract(&options, &fx, ".a { background: url(../img/dot.png?__inline) }")
            .0
            .unwrap();
        assert_eq!(found.records.len(), 1);
        assert_eq!(found.records[0].tag, "inline");
    }

    #[test]
    fn test_resolve_asset() {
        let base = Path::new("/site/css");
        assert_eq!(resolve_asset(base, "../img/a.png"), PathBuf::from("/site/img/a.png"));
        assert_eq!(resolve_asset(base, "/img/a.png"), PathBuf::from("/site/css/img/a.png"));
        assert_eq!(resolve_asset(base, "./a.png"), PathBuf::from("/site/css/a.png"));
    }
}
