//! Embedding small images as data URIs.

use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Tag that asks for an image to be embedded rather than packed.
pub const INLINE_TAG: &str = "inline";

/// Outcome of trying to inline one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inlined {
    /// `data:` URI for the image.
    Embedded(String),
    /// Larger than the limit.
    TooLarge { size: u64 },
    /// Missing or unreadable.
    Unreadable(String),
}

/// Read `path` and encode it when it is at most `limit` bytes.
pub fn inline_image(path: &Path, limit: u64) -> Inlined {
    let size = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) => return Inlined::Unreadable(e.to_string()),
    };
    if size > limit {
        return Inlined::TooLarge { size };
    }

    match fs::read(path) {
        Ok(bytes) => Inlined::Embedded(data_uri(path, &bytes)),
        Err(e) => Inlined::Unreadable(e.to_string()),
    }
}

/// Encode bytes as a base64 `data:` URI, typed by file extension.
pub fn data_uri(path: &Path, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type(path), STANDARD.encode(bytes))
}

fn mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_data_uri() {
        assert_eq!(data_uri(Path::new("a.png"), b"hi"), "data:image/png;base64,aGk=");
        assert_eq!(data_uri(Path::new("a.SVG"), b""), "data:image/svg+xml;base64,");
    }

    #[test]
    fn test_inline_respects_limit() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("dot.gif");
        fs::write(&path, [0u8; 16]).unwrap();

        assert!(matches!(
            inline_image(&path, 16),
            Inlined::Embedded(ref uri) if uri.starts_with("data:image/gif;base64,")
        ));
        assert_eq!(inline_image(&path, 15), Inlined::TooLarge { size: 16 });
    }

    #[test]
    fn test_inline_missing_file() {
        assert!(matches!(
            inline_image(Path::new("/nonexistent/a.png"), 100),
            Inlined::Unreadable(_)
        ));
    }
}
