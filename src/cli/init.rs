//! Init command implementation.
//!
//! Writes a commented `sprite.yaml` holding every default.

use std::fs;
use std::path::PathBuf;

use clap::Args;

use crate::discovery::CONFIG_FILENAME;
use crate::error::{Result, SpriteError};
use crate::output::{display_path, Printer};

/// Write a default sprite.yaml
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory to write into (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing sprite.yaml
    #[arg(long)]
    pub force: bool,
}

const TEMPLATE: &str = r#"# cssprite configuration
#
# Tag a background image to pack it:
#   .icon { background: url(../img/home.png?__icons) no-repeat; }
# Every image tagged `icons` lands in one sheet named <prefix>icons.png.

# Stylesheets or directories to process (list or comma-separated string)
# src:
#   - css/

# Where rewritten stylesheets go (a file when there is a single source)
dest: ./

# Directory sprite sheets are written to
output: ./

# Prefix for sheet urls inside rewritten declarations
img_path: ../images/

# Sheet file name prefix; files named with it are never treated as sources
prefix: sprite-

# Also write a double-density sheet and a media block that uses it
retina: true

# top-down | left-right | diagonal | alt-diagonal | binary-tree
algorithm: binary-tree

# Pixels between packed images
padding: 10

media: "only screen and (-webkit-min-device-pixel-ratio: 1.5)"

# Largest image in bytes embedded by the `inline` tag (0 disables)
size_limit: 5000

# ignore | warn | fail
missing_assets: warn
"#;

pub fn run(args: InitArgs, printer: &Printer) -> Result<()> {
    let config_path = args.path.join(CONFIG_FILENAME);

    if config_path.exists() && !args.force {
        return Err(SpriteError::Config {
            message: format!("{} already exists", display_path(&config_path)),
            help: Some("Use --force to overwrite".to_string()),
        });
    }

    fs::create_dir_all(&args.path).map_err(|e| SpriteError::Io {
        path: args.path.clone(),
        message: e.to_string(),
    })?;
    fs::write(&config_path, TEMPLATE).map_err(|e| SpriteError::Io {
        path: config_path.clone(),
        message: e.to_string(),
    })?;

    printer.success("Created", &display_path(&config_path));
    Ok(())
}
