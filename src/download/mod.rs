//! Job execution pipeline.
//!
//! Submodules, top down:
//! - `orchestrator`: job selection, session ownership, run outcome
//! - `job`: one job across its remote folders, then the archive
//! - `folder`: list, filter and download one remote folder
//! - `transaction`: atomic download-and-verify of a single file
//! - `archive`: post-job `.tar.gz` snapshot of the local folder
//! - `progress`: sampled progress lines and the output sink
//! - `report`: end-of-run summary
//! - `models` / `error`: result records and failure types

pub mod archive;
pub mod error;
pub mod folder;
pub mod job;
pub mod models;
pub mod orchestrator;
pub mod progress;
pub mod report;
pub mod transaction;
