//! Sprite semantics on top of the stylesheet tree.
//!
//! Extraction finds `url(<image>?__<tag>)` references in background
//! declarations and records where they live. Records are grouped by tag
//! across every stylesheet of a run; once a group's sheet is packed, the
//! rewriter points each declaration at the sheet with the image's offset.

mod extract;
mod group;
mod inline;
mod reference;
mod rewrite;

pub use extract::{resolve_asset, DeclarationExtractor, FileExtraction};
pub use group::{group_records, ExtractionRecord, FileId, SpriteGroup};
pub use inline::{data_uri, inline_image, Inlined, INLINE_TAG};
pub use reference::{
    is_background_property, is_reset_property, leading_color, parse_reference, Reference,
    TAG_MARKER,
};
pub use rewrite::{append_density_block, DensityRule, Rewrite, RuleRewriter, SheetRef};
