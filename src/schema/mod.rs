//! Schema engine (C4): reads the stored schema version, decides
//! compatibility, and runs the ordered chain of migrations up to
//! `CURRENT`. Grounded on the teacher's `infrastructure::database::
//! migration` — a sequence of self-contained, per-version files — but
//! using hand-written SQL instead of `sea_orm_migration`'s `SchemaManager`,
//! since the spec requires bit-exact, backend-specific DDL (`BIGSERIAL` vs.
//! `INTEGER PRIMARY KEY AUTOINCREMENT`, etc.) that the generic migration
//! crate does not model.

pub mod migrations;

use crate::backend::{Backend, BackendKind};
use crate::error::{Result, SkcdError};
use tracing::info;

pub const TSK_VERSION_KEY: &str = "TSK_VER";
pub const SCHEMA_MAJOR_VERSION_KEY: &str = "SCHEMA_MAJOR_VERSION";
pub const SCHEMA_MINOR_VERSION_KEY: &str = "SCHEMA_MINOR_VERSION";
pub const CREATION_SCHEMA_MAJOR_VERSION_KEY: &str = "CREATION_SCHEMA_MAJOR_VERSION";
pub const CREATION_SCHEMA_MINOR_VERSION_KEY: &str = "CREATION_SCHEMA_MINOR_VERSION";
pub const IMAGE_PASSWORD_KEY: &str = "imagePassword";

/// `(major, minor)` — compared lexicographically, matching the spec's
/// ordered migration chain (`7` < `7.1` < `7.2` < `8.0` < ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaVersion {
    pub major: i32,
    pub minor: i32,
}

impl SchemaVersion {
    pub const fn new(major: i32, minor: i32) -> Self {
        Self { major, minor }
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// The built-in current schema version this build knows how to produce.
pub const CURRENT: SchemaVersion = SchemaVersion::new(9, 6);

/// Oldest version this engine accepts as a legacy-but-upgradable starting
/// point. `spec.md` describes the chain as starting at schema 2.
pub const OLDEST_SUPPORTED: SchemaVersion = SchemaVersion::new(2, 0);

/// Tables whose presence this engine guarantees at `CURRENT` (§6.1,
/// "a third-party reader must be able to open the database with them").
pub const CORE_TABLE_NAMES: &[&str] = &[
    "tsk_db_info",
    "tsk_db_info_extended",
    "tsk_objects",
    "tsk_files",
    "tsk_files_path",
    "tsk_file_layout",
    "tsk_file_attributes",
    "tsk_image_info",
    "tsk_image_names",
    "tsk_vs_info",
    "tsk_vs_parts",
    "tsk_volumes",
    "tsk_pool_info",
    "tsk_fs_info",
    "data_source_info",
    "blackboard_artifact_types",
    "blackboard_attribute_types",
    "blackboard_artifacts",
    "blackboard_attributes",
    "tsk_analysis_results",
    "tsk_data_artifacts",
    "tsk_aggregate_score",
    "tag_names",
    "tsk_tag_sets",
    "content_tags",
    "blackboard_artifact_tags",
    "tsk_examiners",
    "reports",
    "review_statuses",
    "file_encoding_types",
    "file_collected_status_types",
    "tsk_events",
    "tsk_event_types",
    "tsk_event_descriptions",
    "tsk_hosts",
    "tsk_host_addresses",
    "tsk_host_address_map",
    "tsk_host_address_dns_ip_map",
    "tsk_os_account_realms",
    "tsk_os_accounts",
    "tsk_os_account_instances",
    "tsk_os_account_attributes",
];

pub const CORE_INDEX_NAMES: &[&str] = &[
    "tsk_objects_par_obj_id",
    "tsk_files_name",
    "tsk_files_extension",
    "tsk_files_data_source_obj_id",
    "tsk_files_md5_size",
    "blackboard_artifacts_obj_id",
    "blackboard_attributes_artifact_id",
    "content_tags_obj_id",
    "blackboard_artifact_tags_artifact_id",
    "tsk_events_data_source_obj_id",
    "tsk_os_account_instances_account_data_source",
];

/// Read the stored `(major, minor)` schema version from `tsk_db_info` /
/// `tsk_db_info_extended`. `None` means the database has no schema yet
/// (freshly created file/empty database).
pub async fn read_stored_version(backend: &Backend) -> Result<Option<SchemaVersion>> {
    match backend {
        Backend::Sqlite(pool) => {
            let exists: Option<(i64,)> =
                sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type='table' AND name='tsk_db_info'")
                    .fetch_optional(pool)
                    .await?;
            if exists.is_none() {
                return Ok(None);
            }
            let row: Option<(i64,)> = sqlx::query_as("SELECT schema_ver FROM tsk_db_info")
                .fetch_optional(pool)
                .await?;
            let major = match row {
                Some((v,)) => v as i32,
                None => return Err(SkcdError::SchemaCorrupt("tsk_db_info has no rows".into())),
            };
            let minor: i64 = sqlx::query_scalar(
                "SELECT CAST(value_text AS INTEGER) FROM tsk_db_info_extended WHERE name = ?",
            )
            .bind(SCHEMA_MINOR_VERSION_KEY)
            .fetch_optional(pool)
            .await?
            .unwrap_or(0);
            Ok(Some(SchemaVersion::new(major, minor as i32)))
        }
        Backend::Postgres(pool) => {
            let exists: Option<(bool,)> = sqlx::query_as(
                "SELECT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_name = 'tsk_db_info')",
            )
            .fetch_optional(pool)
            .await?;
            if !exists.map(|(b,)| b).unwrap_or(false) {
                return Ok(None);
            }
            let row: Option<(i32,)> = sqlx::query_as("SELECT schema_ver FROM tsk_db_info")
                .fetch_optional(pool)
                .await?;
            let major = match row {
                Some((v,)) => v,
                None => return Err(SkcdError::SchemaCorrupt("tsk_db_info has no rows".into())),
            };
            let minor: i32 = sqlx::query_scalar(
                "SELECT CAST(value_text AS INTEGER) FROM tsk_db_info_extended WHERE name = $1",
            )
            .bind(SCHEMA_MINOR_VERSION_KEY)
            .fetch_optional(pool)
            .await?
            .unwrap_or(0);
            Ok(Some(SchemaVersion::new(major, minor)))
        }
    }
}

/// §4.1: for the embedded backend, copy the database file to
/// `<path>.schemaVer<stored>.backup` before the first migration step runs.
pub fn backup_embedded_file(path: &std::path::Path, stored: SchemaVersion) -> Result<()> {
    let backup = path.with_extension(format!(
        "{}.schemaVer{}.backup",
        path.extension().and_then(|e| e.to_str()).unwrap_or("db"),
        stored.major
    ));
    std::fs::copy(path, &backup)?;
    info!(backup = %backup.display(), "backed up case file before migration");
    Ok(())
}

/// §4.1 contract: on case open, under the write lock, compare stored vs.
/// `CURRENT` and either no-op, fail with `SchemaUnsupported`, or run the
/// full migration chain as one all-or-nothing pass (each step its own
/// transaction, committed after each success — §4.1's "every migration
/// step may only add ... it may never drop user-visible data").
pub async fn open_and_upgrade(
    backend: &Backend,
    embedded_path: Option<&std::path::Path>,
) -> Result<SchemaVersion> {
    let stored = match read_stored_version(backend).await? {
        Some(v) => v,
        None => {
            // Fresh database: create at CURRENT directly.
            migrations::create_fresh(backend, backend.kind()).await?;
            return Ok(CURRENT);
        }
    };

    if stored == CURRENT {
        return Ok(stored);
    }

    if stored.major > CURRENT.major {
        return Err(SkcdError::SchemaUnsupported {
            stored: stored.major,
            current: CURRENT.major,
        });
    }

    if let (BackendKind::Embedded, Some(path)) = (backend.kind(), embedded_path) {
        backup_embedded_file(path, stored)?;
    }

    let mut version = stored;
    for step in migrations::chain() {
        if step.from < version {
            continue;
        }
        if step.from != version {
            continue;
        }
        info!(from = %step.from, to = %step.to, "running schema migration step");
        (step.run)(backend, backend.kind()).await?;
        write_stored_version(backend, step.to).await?;
        version = step.to;
        if version == CURRENT {
            break;
        }
    }

    if version != CURRENT {
        return Err(SkcdError::SchemaCorrupt(format!(
            "migration chain ended at {version}, expected {CURRENT}"
        )));
    }

    Ok(version)
}

pub async fn write_stored_version(backend: &Backend, version: SchemaVersion) -> Result<()> {
    match backend {
        Backend::Sqlite(pool) => {
            sqlx::query("UPDATE tsk_db_info SET schema_ver = ?")
                .bind(version.major)
                .execute(pool)
                .await?;
            upsert_extended(pool_sqlite(pool), SCHEMA_MINOR_VERSION_KEY, &version.minor.to_string())
                .await?;
        }
        Backend::Postgres(pool) => {
            sqlx::query("UPDATE tsk_db_info SET schema_ver = $1")
                .bind(version.major)
                .execute(pool)
                .await?;
            upsert_extended_pg(pool, SCHEMA_MINOR_VERSION_KEY, &version.minor.to_string()).await?;
        }
    }
    Ok(())
}

fn pool_sqlite(pool: &sqlx::SqlitePool) -> &sqlx::SqlitePool {
    pool
}

async fn upsert_extended(pool: &sqlx::SqlitePool, name: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO tsk_db_info_extended (name, value_text) VALUES (?, ?)
         ON CONFLICT(name) DO UPDATE SET value_text = excluded.value_text",
    )
    .bind(name)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

async fn upsert_extended_pg(pool: &sqlx::PgPool, name: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO tsk_db_info_extended (name, value_text) VALUES ($1, $2)
         ON CONFLICT(name) DO UPDATE SET value_text = excluded.value_text",
    )
    .bind(name)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_versions_order_lexicographically() {
        assert!(SchemaVersion::new(7, 1) < SchemaVersion::new(7, 2));
        assert!(SchemaVersion::new(7, 2) < SchemaVersion::new(8, 0));
        assert!(SchemaVersion::new(8, 6) < SchemaVersion::new(9, 0));
        assert_eq!(CURRENT, SchemaVersion::new(9, 6));
    }

    #[test]
    fn backup_path_is_derived_from_stored_major() {
        let path = std::path::Path::new("/cases/demo.db");
        let stored = SchemaVersion::new(8, 6);
        let backup = path.with_extension(format!(
            "{}.schemaVer{}.backup",
            path.extension().and_then(|e| e.to_str()).unwrap_or("db"),
            stored.major
        ));
        assert_eq!(backup, std::path::PathBuf::from("/cases/demo.db.schemaVer8.backup"));
    }
}
