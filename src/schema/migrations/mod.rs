//! The migration chain (§4.1), one module per version transition, mirroring
//! the teacher's `mYYYYMMDD_NNNNNN_description.rs` convention
//! (`m20240101_000001_create_initial_tables.rs`, ...) with version pairs in
//! place of dates, since the spec's chain is versioned rather than dated.
//!
//! Each step is a self-contained, idempotent function: calling it again
//! with a database already at or past its `to` version must be a no-op
//! (§4.1, "Each migration ... must be idempotent").

mod v2_3;
mod v3_4;
mod v4_5;
mod v5_6;
mod v6_7;
mod v7_71;
mod v71_72;
mod v72_80;
mod v80_81;
mod v81_82;
mod v82_83;
mod v83_84;
mod v84_85;
mod v85_86;
mod v86_90;
mod v90_91;
mod v91_92;
mod v92_93;
mod v93_94;
mod v94_95;
mod v95_96;

use crate::backend::{Backend, BackendKind};
use crate::error::Result;
use crate::schema::SchemaVersion;
use futures::future::BoxFuture;

pub struct MigrationStep {
    pub from: SchemaVersion,
    pub to: SchemaVersion,
    pub run: for<'a> fn(&'a Backend, BackendKind) -> BoxFuture<'a, Result<()>>,
}

/// The ordered chain, ready to be walked by `crate::schema::open_and_upgrade`.
pub fn chain() -> Vec<MigrationStep> {
    vec![
        MigrationStep { from: SchemaVersion::new(2, 0), to: SchemaVersion::new(3, 0), run: v2_3::run },
        MigrationStep { from: SchemaVersion::new(3, 0), to: SchemaVersion::new(4, 0), run: v3_4::run },
        MigrationStep { from: SchemaVersion::new(4, 0), to: SchemaVersion::new(5, 0), run: v4_5::run },
        MigrationStep { from: SchemaVersion::new(5, 0), to: SchemaVersion::new(6, 0), run: v5_6::run },
        MigrationStep { from: SchemaVersion::new(6, 0), to: SchemaVersion::new(7, 0), run: v6_7::run },
        MigrationStep { from: SchemaVersion::new(7, 0), to: SchemaVersion::new(7, 1), run: v7_71::run },
        MigrationStep { from: SchemaVersion::new(7, 1), to: SchemaVersion::new(7, 2), run: v71_72::run },
        MigrationStep { from: SchemaVersion::new(7, 2), to: SchemaVersion::new(8, 0), run: v72_80::run },
        MigrationStep { from: SchemaVersion::new(8, 0), to: SchemaVersion::new(8, 1), run: v80_81::run },
        MigrationStep { from: SchemaVersion::new(8, 1), to: SchemaVersion::new(8, 2), run: v81_82::run },
        MigrationStep { from: SchemaVersion::new(8, 2), to: SchemaVersion::new(8, 3), run: v82_83::run },
        MigrationStep { from: SchemaVersion::new(8, 3), to: SchemaVersion::new(8, 4), run: v83_84::run },
        MigrationStep { from: SchemaVersion::new(8, 4), to: SchemaVersion::new(8, 5), run: v84_85::run },
        MigrationStep { from: SchemaVersion::new(8, 5), to: SchemaVersion::new(8, 6), run: v85_86::run },
        MigrationStep { from: SchemaVersion::new(8, 6), to: SchemaVersion::new(9, 0), run: v86_90::run },
        MigrationStep { from: SchemaVersion::new(9, 0), to: SchemaVersion::new(9, 1), run: v90_91::run },
        MigrationStep { from: SchemaVersion::new(9, 1), to: SchemaVersion::new(9, 2), run: v91_92::run },
        MigrationStep { from: SchemaVersion::new(9, 2), to: SchemaVersion::new(9, 3), run: v92_93::run },
        MigrationStep { from: SchemaVersion::new(9, 3), to: SchemaVersion::new(9, 4), run: v93_94::run },
        MigrationStep { from: SchemaVersion::new(9, 4), to: SchemaVersion::new(9, 5), run: v94_95::run },
        MigrationStep { from: SchemaVersion::new(9, 5), to: SchemaVersion::new(9, 6), run: v95_96::run },
    ]
}

/// Execute one DDL/DML statement against whichever engine backs `backend`.
pub(crate) async fn exec(backend: &Backend, sql: &str) -> Result<()> {
    match backend {
        Backend::Sqlite(pool) => {
            sqlx::query(sql).execute(pool).await?;
        }
        Backend::Postgres(pool) => {
            sqlx::query(sql).execute(pool).await?;
        }
    }
    Ok(())
}

/// True if `table.column` already exists — the idempotence probe used
/// before every `ADD COLUMN` (§4.1, 5→6: "guarded by IF NOT EXISTS probes").
pub(crate) async fn column_exists(
    backend: &Backend,
    table: &str,
    column: &str,
) -> Result<bool> {
    match backend {
        Backend::Sqlite(pool) => {
            let rows: Vec<(i64, String, String, i64, Option<String>, i64)> =
                sqlx::query_as(&format!("PRAGMA table_info({table})"))
                    .fetch_all(pool)
                    .await?;
            Ok(rows.iter().any(|(_, name, ..)| name == column))
        }
        Backend::Postgres(pool) => {
            let exists: (bool,) = sqlx::query_as(
                "SELECT EXISTS (SELECT 1 FROM information_schema.columns \
                 WHERE table_name = $1 AND column_name = $2)",
            )
            .bind(table)
            .bind(column)
            .fetch_one(pool)
            .await?;
            Ok(exists.0)
        }
    }
}

/// True if `table` already exists.
pub(crate) async fn table_exists(backend: &Backend, table: &str) -> Result<bool> {
    match backend {
        Backend::Sqlite(pool) => {
            let row: Option<(i64,)> =
                sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type='table' AND name = ?")
                    .bind(table)
                    .fetch_optional(pool)
                    .await?;
            Ok(row.is_some())
        }
        Backend::Postgres(pool) => {
            let exists: (bool,) = sqlx::query_as(
                "SELECT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_name = $1)",
            )
            .bind(table)
            .fetch_one(pool)
            .await?;
            Ok(exists.0)
        }
    }
}

/// Build a brand-new case database directly at `CURRENT`, used when
/// `crate::schema::open_and_upgrade` finds no `tsk_db_info` table at all.
/// This runs the same DDL the full migration chain would eventually reach,
/// collapsed into one pass — there is nothing to preserve in an empty file.
pub async fn create_fresh(backend: &Backend, kind: BackendKind) -> Result<()> {
    v2_3::create_base_tables(backend, kind).await?;
    v2_3::run(backend, kind).await?;
    v3_4::run(backend, kind).await?;
    v4_5::run(backend, kind).await?;
    v5_6::run(backend, kind).await?;
    v6_7::run(backend, kind).await?;
    v7_71::run(backend, kind).await?;
    v71_72::run(backend, kind).await?;
    v72_80::run(backend, kind).await?;
    v80_81::run(backend, kind).await?;
    v81_82::run(backend, kind).await?;
    v82_83::run(backend, kind).await?;
    v83_84::run(backend, kind).await?;
    v84_85::run(backend, kind).await?;
    v85_86::run(backend, kind).await?;
    v86_90::run(backend, kind).await?;
    v90_91::run(backend, kind).await?;
    v91_92::run(backend, kind).await?;
    v92_93::run(backend, kind).await?;
    v93_94::run(backend, kind).await?;
    v94_95::run(backend, kind).await?;
    v95_96::run(backend, kind).await?;
    crate::schema::write_stored_version(backend, crate::schema::CURRENT).await?;
    Ok(())
}
