//! Where rewritten stylesheets are written.

use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use crate::discovery::absolute;

/// Prefix used when the configured one is empty and a source would
/// otherwise be overwritten.
const FALLBACK_PREFIX: &str = "sprite-";

/// Resolved `dest` option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Write the single source's output to this exact file.
    File(PathBuf),
    /// Write each output into this directory.
    Directory(PathBuf),
}

impl Destination {
    /// Decide what `dest` means for a run with `source_count` stylesheets.
    ///
    /// An existing directory, a trailing separator, or a missing extension
    /// means a directory. A name with an extension is a file for a single
    /// source; with several sources its parent directory is used instead.
    pub fn classify(dest: &Path, source_count: usize) -> Self {
        let text = dest.to_string_lossy();
        let trailing = text.ends_with('/') || text.ends_with(MAIN_SEPARATOR);

        if dest.is_dir() || trailing || dest.extension().is_none() {
            return Destination::Directory(dest.to_path_buf());
        }
        if source_count > 1 {
            let parent = dest
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            log::debug!(
                "{} names a file but there are {} sources; writing into {}",
                dest.display(),
                source_count,
                parent.display()
            );
            return Destination::Directory(parent);
        }
        Destination::File(dest.to_path_buf())
    }

    /// Output path for `source`.
    ///
    /// Inside a directory the source's file name is kept, gaining `prefix`
    /// when the directory is the source's own so the source survives.
    pub fn output_path(&self, source: &Path, prefix: &str) -> PathBuf {
        match self {
            Destination::File(path) => path.clone(),
            Destination::Directory(dir) => {
                let name = source
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let same_dir = source
                    .parent()
                    .is_some_and(|parent| absolute(parent) == absolute(dir));
                if same_dir {
                    let prefix = if prefix.is_empty() { FALLBACK_PREFIX } else { prefix };
                    dir.join(format!("{}{}", prefix, name))
                } else {
                    dir.join(name)
                }
            }
        }
    }
}
