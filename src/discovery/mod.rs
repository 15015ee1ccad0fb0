//! Options loading and stylesheet discovery.
//!
//! A run is configured by a `sprite.yaml` file (optional) plus command-line
//! overrides. Sources may name files or directories; directories are
//! scanned for stylesheets.
//!
//! # Example
//!
//! ```ignore
//! use cssprite::discovery::{discover, SpriteOptions};
//!
//! let options = SpriteOptions::load("sprite.yaml".as_ref())?;
//! let sources = discover(&options)?;
//! println!("Found {} stylesheets", sources.len());
//! ```

mod config;
mod scanner;

use std::path::PathBuf;

use crate::error::{Result, SpriteError};

pub use config::{split_sources, MissingAssetPolicy, SpriteOptions, DEFAULT_MEDIA};
pub use scanner::{absolute, is_stylesheet, normalize, scan_directory, scan_sources};

/// The name of the config file.
pub const CONFIG_FILENAME: &str = "sprite.yaml";

/// Resolve the stylesheets a run will process.
///
/// Fails when nothing is left to process.
pub fn discover(options: &SpriteOptions) -> Result<Vec<PathBuf>> {
    if options.src.is_empty() {
        return Err(SpriteError::Config {
            message: "no stylesheets given".to_string(),
            help: Some(format!(
                "Pass files or directories, or set `src` in {}",
                CONFIG_FILENAME
            )),
        });
    }

    let sources = scan_sources(&options.src, &options.prefix);
    if sources.is_empty() {
        return Err(SpriteError::Config {
            message: "no stylesheets found in the given sources".to_string(),
            help: Some("Directories are scanned for *.css files".to_string()),
        });
    }

    log::debug!("discovered {} stylesheet(s)", sources.len());
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_discover_requires_sources() {
        let err = discover(&SpriteOptions::default()).unwrap_err();
        assert!(matches!(err, SpriteError::Config { .. }));
    }

    #[test]
    fn test_discover_empty_directory() {
        let dir = tempdir().unwrap();
        let options = SpriteOptions {
            src: vec![dir.path().to_path_buf()],
            ..Default::default()
        };
        assert!(discover(&options).is_err());
    }

    #[test]
    fn test_discover_with_config() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("css")).unwrap();
        fs::write(dir.path().join("css/site.css"), "a { color: red }").unwrap();

        let yaml = format!("src: {}\nretina: false\n", dir.path().join("css").display());
        fs::write(dir.path().join(CONFIG_FILENAME), yaml).unwrap();

        let options = SpriteOptions::load(&dir.path().join(CONFIG_FILENAME)).unwrap();
        let sources = discover(&options).unwrap();

        assert!(!options.retina);
        assert_eq!(sources, vec![dir.path().join("css/site.css")]);
    }
}
