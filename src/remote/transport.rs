//! The narrow remote capability the download pipeline consumes.

use std::io::{self, Read};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("unable to connect to {addr}: {source}")]
    Connect { addr: String, source: io::Error },
    #[error("ssh {operation} failed: {source}")]
    Ssh {
        operation: &'static str,
        source: ssh2::Error,
    },
    #[error("authentication failed for {user}: {detail}")]
    Auth { user: String, detail: String },
    #[error("remote {operation} failed for {path}: {source}")]
    Io {
        operation: &'static str,
        path: String,
        source: io::Error,
    },
}

impl RemoteError {
    pub(crate) fn ssh(operation: &'static str, source: ssh2::Error) -> Self {
        Self::Ssh { operation, source }
    }

    pub(crate) fn io(operation: &'static str, path: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// One directory entry as reported by the server. Never cached across runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub path: String,
    pub is_regular_file: bool,
    pub size: u64,
}

impl RemoteEntry {
    pub fn new(folder: &str, name: impl Into<String>, is_regular_file: bool, size: u64) -> Self {
        let name = name.into();
        Self {
            path: join_remote_path(folder, &name),
            name,
            is_regular_file,
            size,
        }
    }
}

/// Read-only listing, streaming reads and deletes on a pre-authenticated session.
pub trait RemoteFs {
    fn list(&self, folder: &str) -> Result<Vec<RemoteEntry>, RemoteError>;
    fn open_read(&self, path: &str) -> Result<Box<dyn Read + '_>, RemoteError>;
    fn delete(&self, path: &str) -> Result<(), RemoteError>;
}

impl<T: RemoteFs + ?Sized> RemoteFs for &T {
    fn list(&self, folder: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        (**self).list(folder)
    }

    fn open_read(&self, path: &str) -> Result<Box<dyn Read + '_>, RemoteError> {
        (**self).open_read(path)
    }

    fn delete(&self, path: &str) -> Result<(), RemoteError> {
        (**self).delete(path)
    }
}

/// Opens the single session a run works with. The session is released when dropped.
pub trait SessionFactory {
    type Session: RemoteFs;

    fn connect(&self) -> Result<Self::Session, RemoteError>;
}

/// Join a remote folder and a file name with `/`.
///
/// Backslashes in the folder are normalized and trailing separators
/// trimmed; an empty folder means the server root.
pub fn join_remote_path(folder: &str, name: &str) -> String {
    let folder = folder.replace('\\', "/");
    let folder = folder.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    if folder.is_empty() {
        format!("/{name}")
    } else {
        format!("{folder}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_with_single_separator() {
        assert_eq!(join_remote_path("/in", "a.txt"), "/in/a.txt");
        assert_eq!(join_remote_path("/in/", "a.txt"), "/in/a.txt");
        assert_eq!(join_remote_path("\\in\\sub\\", "/a.txt"), "/in/sub/a.txt");
        assert_eq!(join_remote_path("", "a.txt"), "/a.txt");
        assert_eq!(join_remote_path("/", "a.txt"), "/a.txt");
        assert_eq!(join_remote_path("relative", "a.txt"), "relative/a.txt");
    }

    #[test]
    fn entry_carries_full_path() {
        let entry = RemoteEntry::new("/in", "a.txt", true, 10);
        assert_eq!(entry.path, "/in/a.txt");
        assert_eq!(entry.name, "a.txt");
    }
}
