//! Remote file server access.
//!
//! - `transport`: the capability trait (`RemoteFs`), entries and errors
//! - `sftp`: `ssh2`-backed implementation and session factory

#[cfg(test)]
pub(crate) mod memory;
pub mod sftp;
pub mod transport;
