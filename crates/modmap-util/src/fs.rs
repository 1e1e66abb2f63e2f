use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

/// Read a file to string, replacing invalid UTF-8 sequences with the replacement character.
///
/// # Errors
/// Returns an error if the file cannot be read.
pub fn read_to_string_lossy(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Modification time and size of a file, used for cache invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileStamp {
    /// Last modification time, if the platform reports one.
    pub mtime: Option<SystemTime>,
    /// File size in bytes.
    pub size: Option<u64>,
}

impl FileStamp {
    /// Stat `path`. A missing file yields an empty stamp.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.metadata() {
            Ok(meta) => Self {
                mtime: meta.modified().ok(),
                size: Some(meta.len()),
            },
            Err(_) => Self::default(),
        }
    }

    /// True when the stamp was taken from an existing file.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.size.is_some()
    }

    /// Check if the stamp still matches the file on disk.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        self.exists() && Self::from_path(path) == *self
    }
}

/// Modification time of `path`, or `None` when it cannot be stat'd.
#[must_use]
pub fn modified(path: &Path) -> Option<SystemTime> {
    path.metadata().ok()?.modified().ok()
}
