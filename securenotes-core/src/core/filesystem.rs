//! Byte-level file access inside one private directory.
//!
//! The store never builds paths itself; it names files and lets a
//! [`FileSystem`] decide where the bytes live. [`DirFileSystem`] maps names
//! onto a real directory, [`MemoryFileSystem`] keeps everything in a shared
//! map for tests and throwaway stores.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Named-file operations within a single base directory.
///
/// Failures surface as [`std::io::Error`]; a missing file must be reported
/// with [`io::ErrorKind::NotFound`].
pub trait FileSystem {
    fn exists(&self, name: &str) -> bool;

    /// Creates an empty file if none exists.
    fn create(&self, name: &str) -> io::Result<()>;

    fn delete(&self, name: &str) -> io::Result<()>;

    /// Opens `name` for writing, truncating any previous content.
    fn open_for_write(&self, name: &str) -> io::Result<Box<dyn Write + '_>>;

    fn open_for_read(&self, name: &str) -> io::Result<Box<dyn Read + '_>>;

    /// Moves `from` to `to`, replacing `to` if it exists.
    fn rename(&self, from: &str, to: &str) -> io::Result<()>;
}

/// A [`FileSystem`] rooted at a private directory on disk.
#[derive(Debug, Clone)]
pub struct DirFileSystem {
    base: PathBuf,
}

impl DirFileSystem {
    /// Opens `base`, creating it (owner-only on Unix) if needed.
    ///
    /// # Errors
    ///
    /// Returns any I/O error from creating the directory or setting its
    /// permissions.
    pub fn new<P: AsRef<Path>>(base: P) -> io::Result<Self> {
        let base = base.as_ref().to_path_buf();
        fs::create_dir_all(&base)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&base, fs::Permissions::from_mode(0o700))?;
        }
        Ok(Self { base })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn path(&self, name: &str) -> PathBuf {
        self.base.join(name)
    }
}

impl FileSystem for DirFileSystem {
    fn exists(&self, name: &str) -> bool {
        self.path(name).is_file()
    }

    fn create(&self, name: &str) -> io::Result<()> {
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.path(name))?;
        Ok(())
    }

    fn delete(&self, name: &str) -> io::Result<()> {
        fs::remove_file(self.path(name))
    }

    fn open_for_write(&self, name: &str) -> io::Result<Box<dyn Write + '_>> {
        Ok(Box::new(File::create(self.path(name))?))
    }

    fn open_for_read(&self, name: &str) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(File::open(self.path(name))?))
    }

    fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        fs::rename(self.path(from), self.path(to))
    }
}

type FileMap = HashMap<String, Vec<u8>>;

/// An in-memory [`FileSystem`]. Clones share the same files.
///
/// The map only holds byte vectors, so a panic while it is locked cannot
/// leave it inconsistent; every accessor recovers a poisoned lock and carries on.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    files: Arc<Mutex<FileMap>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all files, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.files).keys().cloned().collect();
        names.sort();
        names
    }

    /// Raw stored bytes of `name`, bypassing any encryption layer.
    pub fn raw(&self, name: &str) -> Option<Vec<u8>> {
        lock(&self.files).get(name).cloned()
    }

    /// Replaces the raw bytes of `name`, creating it if needed.
    pub fn put_raw(&self, name: &str, bytes: impl Into<Vec<u8>>) {
        lock(&self.files).insert(name.to_string(), bytes.into());
    }
}

fn lock(files: &Mutex<FileMap>) -> MutexGuard<'_, FileMap> {
    files.lock().unwrap_or_else(PoisonError::into_inner)
}

fn not_found(name: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("no such file: {name}"))
}

impl FileSystem for MemoryFileSystem {
    fn exists(&self, name: &str) -> bool {
        lock(&self.files).contains_key(name)
    }

    fn create(&self, name: &str) -> io::Result<()> {
        lock(&self.files).entry(name.to_string()).or_default();
        Ok(())
    }

    fn delete(&self, name: &str) -> io::Result<()> {
        lock(&self.files)
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| not_found(name))
    }

    fn open_for_write(&self, name: &str) -> io::Result<Box<dyn Write + '_>> {
        lock(&self.files).insert(name.to_string(), Vec::new());
        Ok(Box::new(MemoryWriter {
            files: &self.files,
            name: name.to_string(),
        }))
    }

    fn open_for_read(&self, name: &str) -> io::Result<Box<dyn Read + '_>> {
        let bytes = lock(&self.files)
            .get(name)
            .cloned()
            .ok_or_else(|| not_found(name))?;
        Ok(Box::new(Cursor::new(bytes)))
    }

    fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        let mut files = lock(&self.files);
        let bytes = files.remove(from).ok_or_else(|| not_found(from))?;
        files.insert(to.to_string(), bytes);
        Ok(())
    }
}

/// Appends straight into the shared map so nothing is lost if the writer is
/// dropped without a flush.
struct MemoryWriter<'a> {
    files: &'a Mutex<FileMap>,
    name: String,
}

impl Write for MemoryWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut files = lock(self.files);
        let file = files
            .get_mut(&self.name)
            .ok_or_else(|| not_found(&self.name))?;
        file.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
