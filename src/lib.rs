//! cssprite - CSS sprite sheet generator
//!
//! Finds background images tagged with `?__name` in stylesheets, packs
//! each tag's images into a sheet and rewrites the declarations to point
//! at it.

pub mod cli;
pub mod css;
pub mod discovery;
pub mod error;
pub mod output;
pub mod pack;
pub mod pipeline;
pub mod sprite;
pub mod tree;

pub use css::{parse_stylesheet, stringify};
pub use discovery::{discover, MissingAssetPolicy, SpriteOptions};
pub use error::{Result, SpriteError};
pub use output::{Printer, Reporter};
pub use pack::{Algorithm, ImagePacker, Packer};
pub use pipeline::{Pipeline, RunSummary, StageBarrier};
pub use sprite::{DeclarationExtractor, RuleRewriter};
pub use tree::{Control, NodePath, TreeWalker, Visitor};
