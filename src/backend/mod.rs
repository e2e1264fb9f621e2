//! Backend driver abstraction (C1): a uniform surface over the embedded
//! (SQLite) and networked (PostgreSQL) engines.
//!
//! Grounded on the teacher's `infrastructure::database::Database`, which
//! already builds a `sqlx`-backed connection with PRAGMA tuning for the
//! SQLite case; generalized here into an enum that also carries a
//! PostgreSQL pool, since the spec requires both engines side by side
//! rather than SQLite only.

pub mod classify;
pub mod connect;

pub use classify::ConnectError;
pub use connect::{connect, reachability_probe};

use crate::error::Result;
use sqlx::{Pool, Postgres, Sqlite};

/// Which engine a case is backed by. Mirrors the spec's C1/C2 split: the
/// embedded backend engages the process-wide write lock (C3) and the
/// embedded retry classifier (C11); the networked backend does neither of
/// those but takes the `tsk_aggregate_score` table lock (C8) instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Embedded,
    Networked,
}

/// The live connection pool for one case, wrapping exactly one of the two
/// engines. `sqlx`'s own per-pool statement cache handles prepared
/// statements; query text lives next to the operation that issues it.
#[derive(Clone)]
pub enum Backend {
    Sqlite(Pool<Sqlite>),
    Postgres(Pool<Postgres>),
}

impl Backend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Sqlite(_) => BackendKind::Embedded,
            Backend::Postgres(_) => BackendKind::Networked,
        }
    }

    pub fn as_sqlite(&self) -> Option<&Pool<Sqlite>> {
        match self {
            Backend::Sqlite(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_postgres(&self) -> Option<&Pool<Postgres>> {
        match self {
            Backend::Postgres(p) => Some(p),
            _ => None,
        }
    }

    pub async fn close(&self) {
        match self {
            Backend::Sqlite(p) => p.close().await,
            Backend::Postgres(p) => p.close().await,
        }
    }
}

/// Backend-specific DDL fragments the schema engine needs to stay portable
/// (§9 "Schema engine and DDL portability"): integer primary keys vs.
/// `BIGSERIAL`, `INTEGER` vs. `BIGINT` timestamps, `BLOB` vs. `BYTEA`.
pub trait DdlDialect {
    fn autoincrement_pk(&self) -> &'static str;
    fn bigint(&self) -> &'static str;
    fn blob(&self) -> &'static str;
    fn supports_alter_drop_column(&self) -> bool;
    fn supports_partial_index(&self) -> bool;
}

impl DdlDialect for BackendKind {
    fn autoincrement_pk(&self) -> &'static str {
        match self {
            BackendKind::Embedded => "INTEGER PRIMARY KEY AUTOINCREMENT",
            BackendKind::Networked => "BIGSERIAL PRIMARY KEY",
        }
    }

    fn bigint(&self) -> &'static str {
        match self {
            BackendKind::Embedded => "INTEGER",
            BackendKind::Networked => "BIGINT",
        }
    }

    fn blob(&self) -> &'static str {
        match self {
            BackendKind::Embedded => "BLOB",
            BackendKind::Networked => "BYTEA",
        }
    }

    fn supports_alter_drop_column(&self) -> bool {
        matches!(self, BackendKind::Networked)
    }

    fn supports_partial_index(&self) -> bool {
        // The embedded engine gained partial-index support in SQLite 3.8+,
        // but case files created against older bundled versions (pre-3.x
        // in the original toolkit's vendored build) lack it — §4.1, 9.5→9.6.
        matches!(self, BackendKind::Networked)
    }
}

pub(crate) async fn ping(backend: &Backend) -> Result<()> {
    match backend {
        Backend::Sqlite(p) => {
            sqlx::query("SELECT 1").execute(p).await?;
        }
        Backend::Postgres(p) => {
            sqlx::query("SELECT 1").execute(p).await?;
        }
    }
    Ok(())
}
