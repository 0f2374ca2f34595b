//! SFTP implementation of the remote capability (libssh2 via `ssh2`).

use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use ssh2::{Session, Sftp};
use tracing::{debug, info, warn};

use super::transport::{RemoteEntry, RemoteError, RemoteFs, SessionFactory};
use crate::base_system::context::SftpOptions;

pub struct SftpConnector {
    options: SftpOptions,
}

impl SftpConnector {
    pub fn new(options: SftpOptions) -> Self {
        Self { options }
    }

    fn open_tcp(&self) -> Result<TcpStream, RemoteError> {
        let addr = format!("{}:{}", self.options.host, self.options.port);
        let timeout = Duration::from_secs(self.options.timeout_secs.max(1));
        let resolved = addr
            .to_socket_addrs()
            .map_err(|source| RemoteError::Connect {
                addr: addr.clone(),
                source,
            })?;

        let mut last_err = None;
        for sock in resolved {
            match TcpStream::connect_timeout(&sock, timeout) {
                Ok(stream) => return Ok(stream),
                Err(err) => {
                    debug!("tcp connect to {sock} failed: {err}");
                    last_err = Some(err);
                }
            }
        }
        Err(RemoteError::Connect {
            addr,
            source: last_err.unwrap_or_else(|| std::io::Error::other("no address resolved")),
        })
    }

    fn authenticate(&self, session: &Session) -> Result<(), RemoteError> {
        let user = &self.options.username;
        let mut failures: Vec<String> = Vec::new();

        if let Some(key) = self
            .options
            .private_key_path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
        {
            let passphrase = self
                .options
                .private_key_passphrase
                .as_deref()
                .filter(|p| !p.is_empty());
            if let Err(err) = session.userauth_pubkey_file(user, None, Path::new(key), passphrase) {
                failures.push(format!("private key {key}: {err}"));
            }
        }

        if !session.authenticated() {
            if let Some(password) = self.options.password.as_deref().filter(|p| !p.is_empty()) {
                if let Err(err) = session.userauth_password(user, password) {
                    failures.push(format!("password: {err}"));
                }
            }
        }

        if session.authenticated() {
            return Ok(());
        }
        if failures.is_empty() {
            failures.push("no authentication method configured".to_string());
        }
        Err(RemoteError::Auth {
            user: user.clone(),
            detail: failures.join("; "),
        })
    }
}

impl SessionFactory for SftpConnector {
    type Session = SftpSession;

    fn connect(&self) -> Result<SftpSession, RemoteError> {
        let tcp = self.open_tcp()?;
        let mut session = Session::new().map_err(|e| RemoteError::ssh("session", e))?;
        let timeout_ms = self.options.timeout_secs.saturating_mul(1000).min(u32::MAX as u64);
        session.set_timeout(timeout_ms as u32);
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| RemoteError::ssh("handshake", e))?;
        self.authenticate(&session)?;
        let sftp = session.sftp().map_err(|e| RemoteError::ssh("sftp", e))?;

        info!(
            "connected to {}:{} as {}",
            self.options.host, self.options.port, self.options.username
        );
        Ok(SftpSession { sftp, session })
    }
}

/// A connected, authenticated SFTP channel. Disconnects on drop.
pub struct SftpSession {
    sftp: Sftp,
    session: Session,
}

impl RemoteFs for SftpSession {
    fn list(&self, folder: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        let entries = self
            .sftp
            .readdir(Path::new(folder))
            .map_err(|e| RemoteError::io("list", folder, e.into()))?;

        Ok(entries
            .into_iter()
            .filter_map(|(path, stat)| {
                let name = path.file_name()?.to_string_lossy().into_owned();
                if name == "." || name == ".." {
                    return None;
                }
                Some(RemoteEntry::new(
                    folder,
                    name,
                    stat.is_file(),
                    stat.size.unwrap_or(0),
                ))
            })
            .collect())
    }

    fn open_read(&self, path: &str) -> Result<Box<dyn Read + '_>, RemoteError> {
        let file = self
            .sftp
            .open(Path::new(path))
            .map_err(|e| RemoteError::io("open", path, e.into()))?;
        Ok(Box::new(file))
    }

    fn delete(&self, path: &str) -> Result<(), RemoteError> {
        self.sftp
            .unlink(Path::new(path))
            .map_err(|e| RemoteError::io("delete", path, e.into()))
    }
}

impl Drop for SftpSession {
    fn drop(&mut self) {
        match self.session.disconnect(None, "run finished", None) {
            Ok(()) => debug!("sftp session closed"),
            Err(err) => warn!("sftp disconnect failed: {err}"),
        }
    }
}
