//! Discovery and loading of `.aro` source files.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

/// File extension of ARO sources.
pub const SOURCE_EXTENSION: &str = "aro";

/// Failure to collect sources.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The directory walk failed.
    #[error("cannot walk source directory: {0}")]
    Walk(#[from] walkdir::Error),
    /// A source file could not be read.
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        /// The file.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },
}

/// One loaded source file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceFile {
    /// Where it was read from.
    pub path: PathBuf,
    /// Its contents.
    pub text: String,
}

impl SourceFile {
    /// Creates a source file from text already in memory.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }
}

/// Lists every `.aro` file under `dir`, recursively, in sorted order.
///
/// # Errors
///
/// Returns [`SourceError::Walk`] if the directory cannot be traversed.
pub fn discover(dir: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        let is_source = entry.file_type().is_file()
            && entry.path().extension().is_some_and(|ext| ext == SOURCE_EXTENSION);
        if is_source {
            paths.push(entry.into_path());
        }
    }
    Ok(paths)
}

/// Discovers and reads every source file under `dir`.
///
/// # Errors
///
/// Returns [`SourceError`] if the walk or any read fails.
pub fn load(dir: &Path) -> Result<Vec<SourceFile>, SourceError> {
    discover(dir)?
        .into_iter()
        .map(|path| match fs::read_to_string(&path) {
            Ok(text) => Ok(SourceFile { path, text }),
            Err(source) => Err(SourceError::Read { path, source }),
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A scratch directory removed on drop.
    pub(crate) struct TempDir(PathBuf);

    impl TempDir {
        pub(crate) fn new() -> Self {
            let path = std::env::temp_dir().join(format!("aro-{}", uuid::Uuid::new_v4()));
            fs::create_dir_all(&path).unwrap();
            Self(path)
        }

        pub(crate) fn path(&self) -> &Path {
            &self.0
        }

        pub(crate) fn write(&self, relative: &str, contents: &str) -> PathBuf {
            let path = self.0.join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(&path, contents).unwrap();
            path
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    #[test]
    fn discovers_nested_sources_in_order() {
        let dir = TempDir::new();
        dir.write("users/create.aro", "");
        dir.write("main.aro", "");
        dir.write("notes.txt", "");
        dir.write("a/b.aro", "");

        let found: Vec<PathBuf> = discover(dir.path())
            .unwrap()
            .into_iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            found,
            vec![
                PathBuf::from("a/b.aro"),
                PathBuf::from("main.aro"),
                PathBuf::from("users/create.aro"),
            ]
        );
    }

    #[test]
    fn load_reads_contents() {
        let dir = TempDir::new();
        dir.write("main.aro", "(Application-Start: Demo) {}");
        let files = load(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].text, "(Application-Start: Demo) {}");
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = TempDir::new();
        let err = load(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, SourceError::Walk(_)));
    }
}
