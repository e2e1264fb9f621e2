//! SKCD — Sleuth Kit Case Database.
//!
//! A persistent, transactional store for digital-forensic case data: an
//! object forest over an image/volume/file-system tree, a file store with
//! timeline-event derivation, a blackboard of artifacts and attributes, a
//! scoring aggregator, a tag store, host/OS-account identity tracking, and
//! a transaction façade that fires domain events through a process-local
//! bus on commit. Backed by either an embedded SQLite file or a networked
//! PostgreSQL database.

pub mod attributes;
pub mod backend;
pub mod blackboard;
pub mod case;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod files;
pub mod host;
pub mod lock;
pub mod objects;
pub mod os_account;
pub mod pool;
pub mod retry;
pub mod schema;
pub mod scoring;
pub mod tags;
pub mod transaction;

pub use backend::{Backend, BackendKind};
pub use case::Case;
pub use config::{BackendDescriptor, CaseConfig};
pub use error::{Result, SkcdError};
pub use events::{CaseEvent, EventBus};
pub use transaction::CaseTransaction;
