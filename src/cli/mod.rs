pub mod build;
pub mod completions;
pub mod init;
pub mod list;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::discovery::{split_sources, SpriteOptions, CONFIG_FILENAME};
use crate::error::Result;

/// cssprite - CSS sprite sheet generator
#[derive(Parser, Debug)]
#[command(name = "cssprite")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pack tagged images into sheets and rewrite the stylesheets
    Build(build::BuildArgs),

    /// Show sprite groups without writing anything
    List(list::ListArgs),

    /// Write a default sprite.yaml
    Init(init::InitArgs),

    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

/// Load options from `config`, or from `sprite.yaml` in the current
/// directory when it exists, or the defaults.
pub fn load_options(config: Option<&Path>) -> Result<SpriteOptions> {
    match config {
        Some(path) => SpriteOptions::load(path),
        None if Path::new(CONFIG_FILENAME).is_file() => {
            log::debug!("using ./{}", CONFIG_FILENAME);
            SpriteOptions::load(Path::new(CONFIG_FILENAME))
        }
        None => Ok(SpriteOptions::default()),
    }
}

/// Command-line sources replace configured ones; commas split entries.
fn apply_sources(options: &mut SpriteOptions, src: &[String]) {
    if !src.is_empty() {
        options.src = src.iter().flat_map(|s| split_sources(s)).collect::<Vec<PathBuf>>();
    }
}
