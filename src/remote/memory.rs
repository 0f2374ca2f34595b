//! In-memory remote filesystem used by pipeline tests.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashSet};
use std::io::{self, Cursor, Read};

use super::transport::{RemoteEntry, RemoteError, RemoteFs, SessionFactory, join_remote_path};

#[derive(Debug, Clone)]
struct MemoryFile {
    name: String,
    content: Vec<u8>,
    advertised: u64,
    is_dir: bool,
}

/// Folders keep insertion order so listing order is deterministic.
#[derive(Default)]
pub struct MemoryRemote {
    folders: RefCell<BTreeMap<String, Vec<MemoryFile>>>,
    broken_listings: HashSet<String>,
    broken_reads: HashSet<String>,
    broken_deletes: HashSet<String>,
    pub reads: Cell<usize>,
    pub deletes: Cell<usize>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, folder: &str, name: &str, content: &[u8]) -> Self {
        let size = content.len() as u64;
        self.with_lying_file(folder, name, content, size)
    }

    /// A file whose listed size differs from the bytes actually streamed.
    pub fn with_lying_file(self, folder: &str, name: &str, content: &[u8], advertised: u64) -> Self {
        self.push(
            folder,
            MemoryFile {
                name: name.to_string(),
                content: content.to_vec(),
                advertised,
                is_dir: false,
            },
        );
        self
    }

    pub fn with_dir(self, folder: &str, name: &str) -> Self {
        self.push(
            folder,
            MemoryFile {
                name: name.to_string(),
                content: Vec::new(),
                advertised: 4096,
                is_dir: true,
            },
        );
        self
    }

    pub fn with_empty_folder(self, folder: &str) -> Self {
        self.folders
            .borrow_mut()
            .entry(normalize(folder))
            .or_default();
        self
    }

    pub fn with_broken_listing(mut self, folder: &str) -> Self {
        self.broken_listings.insert(normalize(folder));
        self
    }

    pub fn with_broken_read(mut self, path: &str) -> Self {
        self.broken_reads.insert(path.to_string());
        self
    }

    pub fn with_broken_delete(mut self, path: &str) -> Self {
        self.broken_deletes.insert(path.to_string());
        self
    }

    pub fn contains(&self, path: &str) -> bool {
        self.find(path).is_some()
    }

    fn push(&self, folder: &str, file: MemoryFile) {
        self.folders
            .borrow_mut()
            .entry(normalize(folder))
            .or_default()
            .push(file);
    }

    fn find(&self, path: &str) -> Option<MemoryFile> {
        let folders = self.folders.borrow();
        folders.iter().find_map(|(folder, files)| {
            files
                .iter()
                .find(|f| join_remote_path(folder, &f.name) == path)
                .cloned()
        })
    }
}

fn normalize(folder: &str) -> String {
    let trimmed = folder.replace('\\', "/");
    let trimmed = trimmed.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

fn not_found(path: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{path} not found"))
}

impl RemoteFs for MemoryRemote {
    fn list(&self, folder: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        let key = normalize(folder);
        if self.broken_listings.contains(&key) {
            return Err(RemoteError::io(
                "list",
                folder,
                io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
            ));
        }
        let folders = self.folders.borrow();
        let files = folders
            .get(&key)
            .ok_or_else(|| RemoteError::io("list", folder, not_found(folder)))?;
        Ok(files
            .iter()
            .map(|f| RemoteEntry::new(folder, f.name.clone(), !f.is_dir, f.advertised))
            .collect())
    }

    fn open_read(&self, path: &str) -> Result<Box<dyn Read + '_>, RemoteError> {
        self.reads.set(self.reads.get() + 1);
        if self.broken_reads.contains(path) {
            return Err(RemoteError::io(
                "open",
                path,
                io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"),
            ));
        }
        let file = self
            .find(path)
            .filter(|f| !f.is_dir)
            .ok_or_else(|| RemoteError::io("open", path, not_found(path)))?;
        Ok(Box::new(Cursor::new(file.content)))
    }

    fn delete(&self, path: &str) -> Result<(), RemoteError> {
        if self.broken_deletes.contains(path) {
            return Err(RemoteError::io(
                "delete",
                path,
                io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
            ));
        }
        let mut folders = self.folders.borrow_mut();
        for (folder, files) in folders.iter_mut() {
            if let Some(idx) = files
                .iter()
                .position(|f| join_remote_path(folder, &f.name) == path)
            {
                files.remove(idx);
                self.deletes.set(self.deletes.get() + 1);
                return Ok(());
            }
        }
        Err(RemoteError::io("delete", path, not_found(path)))
    }
}

/// Hands out a borrowed [`MemoryRemote`] as the run's session.
pub struct MemoryConnector<'a> {
    pub remote: &'a MemoryRemote,
    pub fail: bool,
    pub connects: Cell<usize>,
}

impl<'a> MemoryConnector<'a> {
    pub fn new(remote: &'a MemoryRemote) -> Self {
        Self {
            remote,
            fail: false,
            connects: Cell::new(0),
        }
    }
}

impl<'a> SessionFactory for MemoryConnector<'a> {
    type Session = &'a MemoryRemote;

    fn connect(&self) -> Result<&'a MemoryRemote, RemoteError> {
        self.connects.set(self.connects.get() + 1);
        if self.fail {
            return Err(RemoteError::Auth {
                user: "test".to_string(),
                detail: "rejected".to_string(),
            });
        }
        Ok(self.remote)
    }
}
