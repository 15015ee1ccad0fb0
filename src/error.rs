use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Main error type for cssprite operations
#[derive(Error, Diagnostic, Debug, Clone)]
pub enum SpriteError {
    #[error("IO error with {path}: {message}")]
    #[diagnostic(code(cssprite::io))]
    Io { path: PathBuf, message: String },

    #[error("Failed to read stylesheet {path}: {message}")]
    #[diagnostic(code(cssprite::source_read))]
    SourceRead { path: PathBuf, message: String },

    #[error("Referenced image {path} does not exist (from {source_file})")]
    #[diagnostic(
        code(cssprite::missing_asset),
        help("Fix the url or run with --missing-assets warn to drop the reference")
    )]
    MissingAsset { path: PathBuf, source_file: PathBuf },

    #[error("Failed to pack sprite group '{tag}': {message}")]
    #[diagnostic(code(cssprite::packing))]
    Packing { tag: String, message: String },

    #[error("Failed to write sprite sheet {path}: {message}")]
    #[diagnostic(code(cssprite::sheet_write))]
    SheetWrite { path: PathBuf, message: String },

    #[error("Failed to write stylesheet {path}: {message}")]
    #[diagnostic(code(cssprite::css_write))]
    CssWrite { path: PathBuf, message: String },

    #[error("Parse error: {message}")]
    #[diagnostic(code(cssprite::parse))]
    Parse {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(cssprite::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("Pipeline ended without reporting an outcome")]
    #[diagnostic(
        code(cssprite::interrupted),
        help("A stage's work was dropped before it ran; try again with --sequential")
    )]
    Interrupted,

    #[error("{stage} stage failed in {count} unit(s)")]
    #[diagnostic(code(cssprite::aborted))]
    Aborted {
        stage: String,
        count: usize,
        #[related]
        errors: Vec<SpriteError>,
    },
}

impl SpriteError {
    /// Attach the file a parse error came from.
    pub fn in_file(self, path: &std::path::Path) -> Self {
        match self {
            SpriteError::Parse { message, help } => SpriteError::Parse {
                message: format!("{}: {}", path.display(), message),
                help,
            },
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, SpriteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_file_prefixes_parse_errors() {
        let err = SpriteError::Parse {
            message: "unclosed block at 3:1".to_string(),
            help: None,
        }
        .in_file(std::path::Path::new("css/main.css"));

        assert_eq!(
            err.to_string(),
            "Parse error: css/main.css: unclosed block at 3:1"
        );
    }

    #[test]
    fn test_in_file_leaves_other_errors() {
        let err = SpriteError::Packing {
            tag: "logo".to_string(),
            message: "boom".to_string(),
        }
        .in_file(std::path::Path::new("a.css"));

        assert!(matches!(err, SpriteError::Packing { .. }));
    }
}
