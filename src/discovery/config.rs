//! Run options (sprite.yaml) parsing.
//!
//! Every option has a default, so an empty file or no file at all is a
//! valid configuration. Camel-case spellings (`destImg`, `imgPath`,
//! `sizeLimit`) are accepted alongside the snake-case names.

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, SpriteError};
use crate::pack::Algorithm;

/// What to do with a tagged reference whose image does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MissingAssetPolicy {
    /// Drop the reference silently
    Ignore,
    /// Drop the reference and report a warning
    #[default]
    Warn,
    /// Abort the run
    Fail,
}

/// Options for one sprite run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpriteOptions {
    /// Stylesheets or directories to process. A comma-separated string is
    /// accepted as well as a list.
    #[serde(deserialize_with = "string_or_list")]
    pub src: Vec<PathBuf>,

    /// Where rewritten stylesheets go: a directory, or a file when there
    /// is exactly one source.
    pub dest: PathBuf,

    /// Directory sprite sheets are written to.
    #[serde(alias = "destImg", alias = "dest_img")]
    pub output: PathBuf,

    /// Prefix prepended to sheet file names inside rewritten urls.
    #[serde(alias = "imgPath")]
    pub img_path: String,

    /// Sheet file name prefix, also used to tell generated stylesheets
    /// from sources.
    pub prefix: String,

    /// Produce a double-density sheet and a media block pointing at it.
    pub retina: bool,

    pub algorithm: Algorithm,

    /// Pixels between packed images.
    pub padding: u32,

    /// Media query of the high-density block.
    pub media: String,

    /// Largest file (bytes) that the `inline` tag embeds as a data URI.
    /// Zero disables inlining.
    #[serde(alias = "sizeLimit")]
    pub size_limit: u64,

    #[serde(alias = "missingAssets")]
    pub missing_assets: MissingAssetPolicy,
}

pub const DEFAULT_MEDIA: &str = "only screen and (-webkit-min-device-pixel-ratio: 1.5)";

impl Default for SpriteOptions {
    fn default() -> Self {
        Self {
            src: vec![],
            dest: PathBuf::from("./"),
            output: PathBuf::from("./"),
            img_path: "../images/".to_string(),
            prefix: "sprite-".to_string(),
            retina: true,
            algorithm: Algorithm::default(),
            padding: 10,
            media: DEFAULT_MEDIA.to_string(),
            size_limit: 5000,
            missing_assets: MissingAssetPolicy::default(),
        }
    }
}

impl SpriteOptions {
    /// Load options from a sprite.yaml file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SpriteError::Io {
            path: path.to_path_buf(),
            message: format!("Failed to read config: {}", e),
        })?;

        Self::parse(&content)
    }

    /// Parse options from a YAML string.
    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| SpriteError::Parse {
            message: format!("Invalid config: {}", e),
            help: Some("Check sprite.yaml syntax".to_string()),
        })
    }

    /// Reject option combinations that cannot produce a usable run.
    pub fn validate(&self) -> Result<()> {
        if self.prefix.contains(['/', '\\']) {
            return Err(SpriteError::Config {
                message: format!("prefix '{}' contains a path separator", self.prefix),
                help: Some("Use `output` to choose the sheet directory".to_string()),
            });
        }
        if self.retina && self.media.trim().is_empty() {
            return Err(SpriteError::Config {
                message: "retina output needs a media query".to_string(),
                help: Some("Set `media` or pass --no-retina".to_string()),
            });
        }
        Ok(())
    }

    /// Number of raster densities produced per group.
    pub fn density(&self) -> u32 {
        if self.retina {
            2
        } else {
            1
        }
    }

    /// Base file name of the sheet for `tag`.
    pub fn sheet_name(&self, tag: &str) -> String {
        format!("{}{}.png", self.prefix, tag)
    }
}

/// Split a comma-separated source list.
pub fn split_sources(list: &str) -> Vec<PathBuf> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Sources {
    One(String),
    Many(Vec<String>),
}

fn string_or_list<'de, D>(deserializer: D) -> std::result::Result<Vec<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Sources::deserialize(deserializer)? {
        Sources::One(list) => split_sources(&list),
        Sources::Many(items) => items.iter().flat_map(|s| split_sources(s)).collect(),
    })
}
