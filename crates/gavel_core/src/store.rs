//! File store abstraction.
//!
//! The properties generator only ever asks for "read current content at path"
//! and "write merged content at path". Keeping this behind a trait lets tests
//! run against an in-memory store.

use std::fs;
use std::io;
use std::path::Path;

/// Read/write access to documentation files by path.
pub trait FileStore {
    /// Current content at `path`, or `None` if no file exists there.
    fn read(&self, path: &Path) -> io::Result<Option<String>>;

    /// Writes `content` at `path`, creating parent directories as needed.
    fn write(&self, path: &Path, content: &str) -> io::Result<()>;
}

/// File store backed by the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct LocalFileStore;

impl FileStore for LocalFileStore {
    fn read(&self, path: &Path) -> io::Result<Option<String>> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn write(&self, path: &Path, content: &str) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)
    }
}
