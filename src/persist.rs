//! File persistence helpers
//!
//! Whole documents are staged in a temp file next to the target and renamed
//! into place, so readers see either the old or the new document, never a torn
//! one. Record logs are append-only, one JSON line per record.

use async_trait::async_trait;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::errors::{MemoryError, Result};

/// Replace `path` with `contents` atomically
pub fn atomic_write(path: &Path, contents: &str) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)
        .map_err(|e| MemoryError::Persistence(format!("cannot create {}: {}", dir.display(), e)))?;

    let mut staged = NamedTempFile::new_in(dir)
        .map_err(|e| MemoryError::Persistence(format!("cannot stage write: {}", e)))?;
    staged
        .write_all(contents.as_bytes())
        .and_then(|_| staged.as_file().sync_all())
        .map_err(|e| MemoryError::Persistence(format!("cannot write staged file: {}", e)))?;
    staged
        .persist(path)
        .map_err(|e| MemoryError::Persistence(format!("cannot replace {}: {}", path.display(), e.error)))?;
    Ok(())
}

/// Append newline-terminated lines to `path` with a single write, creating it if needed
pub fn append_lines(path: &Path, lines: &[String]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .map_err(|e| MemoryError::Persistence(format!("cannot create {}: {}", dir.display(), e)))?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)
        .map_err(|e| MemoryError::Persistence(format!("cannot open {}: {}", path.display(), e)))?;

    // A torn final line from an interrupted append must not swallow the next record
    let mut buffer = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum::<usize>() + 1);
    if !ends_with_newline(&mut file)? {
        buffer.push('\n');
    }
    for line in lines {
        buffer.push_str(line);
        buffer.push('\n');
    }
    file.write_all(buffer.as_bytes())
        .and_then(|_| file.sync_data())
        .map_err(|e| MemoryError::Persistence(format!("cannot append to {}: {}", path.display(), e)))?;
    Ok(())
}

/// True for an empty file or one whose last byte is a newline
fn ends_with_newline(file: &mut fs::File) -> Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(true);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Read a whole file; a missing file is `None`, not an error
pub fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(MemoryError::Io(e)),
    }
}

/// A single named text resource, read and written whole
#[async_trait]
pub trait DocumentResource: Send + Sync {
    /// Current contents; `None` when the resource does not exist yet
    async fn load(&self) -> Result<Option<String>>;

    /// Replace the contents atomically
    async fn save(&self, contents: &str) -> Result<()>;

    fn describe(&self) -> String;
}

/// Document resource stored as a file on local disk
#[derive(Debug, Clone)]
pub struct FileResource {
    path: PathBuf,
}

impl FileResource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DocumentResource for FileResource {
    async fn load(&self) -> Result<Option<String>> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || read_optional(&path))
            .await
            .map_err(|e| MemoryError::Generic(format!("read task failed: {}", e)))?
    }

    async fn save(&self, contents: &str) -> Result<()> {
        let path = self.path.clone();
        let contents = contents.to_string();
        tokio::task::spawn_blocking(move || atomic_write(&path, &contents))
            .await
            .map_err(|e| MemoryError::Generic(format!("write task failed: {}", e)))?
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
