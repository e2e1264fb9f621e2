//! Object-graph store (C5): the `tsk_objects` forest every other table
//! hangs off of, plus the has-children bitset cache and typed `Content`
//! loader.
//!
//! Grounded on the teacher's `LibraryManager`'s `Arc<RwLock<HashMap<..>>>`
//! cache (`src/library/manager.rs`), generalized from "library id → handle"
//! to "obj_id → has at least one child", and on its one-shot background
//! population style rather than computing the set on every open.

use crate::backend::Backend;
use crate::domain::content::{
    ArtifactRef, FileSystemInfo, HostAddressRef, ImageInfo, OsAccountRef, PoolInfo, ReportInfo,
    VolumeInfo, VolumeSystemInfo,
};
use crate::domain::{Content, ObjectType};
use crate::error::{Result, SkcdError};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Insert a new row in `tsk_objects` and return its `obj_id`. If `parent`
/// is set and a `has_children` cache is passed, the parent is also
/// recorded in the bitset right away rather than waiting for the next
/// full reload or an on-miss fallback query.
pub async fn add_object(
    backend: &Backend,
    par_obj_id: Option<i64>,
    object_type: ObjectType,
    has_children: Option<&HasChildrenCache>,
) -> Result<i64> {
    let obj_id = match backend {
        Backend::Sqlite(pool) => {
            let res = sqlx::query("INSERT INTO tsk_objects (par_obj_id, type) VALUES (?, ?)")
                .bind(par_obj_id)
                .bind(object_type as i32)
                .execute(pool)
                .await?;
            res.last_insert_rowid()
        }
        Backend::Postgres(pool) => {
            let row: (i64,) = sqlx::query_as(
                "INSERT INTO tsk_objects (par_obj_id, type) VALUES ($1, $2) RETURNING obj_id",
            )
            .bind(par_obj_id)
            .bind(object_type as i32)
            .fetch_one(pool)
            .await?;
            row.0
        }
    };
    if let (Some(par), Some(cache)) = (par_obj_id, has_children) {
        cache.record_child(par).await;
    }
    Ok(obj_id)
}

/// Everything `tsk_image_info`/`tsk_image_names` needs beyond the `obj_id`
/// object-graph insertion already assigned, for a new data source.
pub struct NewImage {
    pub device_id: String,
    pub time_zone: String,
    pub size: i64,
    pub sector_size: i32,
    pub md5: Option<String>,
    pub paths: Vec<String>,
}

/// Create a data-source root: the `tsk_objects` row (no parent) plus its
/// `tsk_image_info`/`tsk_image_names` detail rows. When `has_children` is
/// given, the bitset is reloaded synchronously afterwards, matching
/// "adding a new data source reloads the entire bitset synchronously".
pub async fn add_image(backend: &Backend, new: NewImage, has_children: Option<&HasChildrenCache>) -> Result<i64> {
    let obj_id = add_object(backend, None, ObjectType::Image, None).await?;
    match backend {
        Backend::Sqlite(pool) => {
            sqlx::query(
                "INSERT INTO tsk_image_info (obj_id, type, ssize, tzone, size, md5, device_id, time_zone) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(obj_id)
            .bind(0i32)
            .bind(new.sector_size)
            .bind(&new.time_zone)
            .bind(new.size)
            .bind(&new.md5)
            .bind(&new.device_id)
            .bind(&new.time_zone)
            .execute(pool)
            .await?;
            for (sequence, path) in new.paths.iter().enumerate() {
                sqlx::query("INSERT INTO tsk_image_names (obj_id, name, sequence) VALUES (?, ?, ?)")
                    .bind(obj_id)
                    .bind(path)
                    .bind(sequence as i64)
                    .execute(pool)
                    .await?;
            }
        }
        Backend::Postgres(pool) => {
            sqlx::query(
                "INSERT INTO tsk_image_info (obj_id, type, ssize, tzone, size, md5, device_id, time_zone) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(obj_id)
            .bind(0i32)
            .bind(new.sector_size)
            .bind(&new.time_zone)
            .bind(new.size)
            .bind(&new.md5)
            .bind(&new.device_id)
            .bind(&new.time_zone)
            .execute(pool)
            .await?;
            for (sequence, path) in new.paths.iter().enumerate() {
                sqlx::query("INSERT INTO tsk_image_names (obj_id, name, sequence) VALUES ($1, $2, $3)")
                    .bind(obj_id)
                    .bind(path)
                    .bind(sequence as i64)
                    .execute(pool)
                    .await?;
            }
        }
    }
    if let Some(cache) = has_children {
        cache.reload().await?;
    }
    Ok(obj_id)
}

/// Everything `tsk_fs_info` needs beyond the `obj_id` object-graph insertion
/// already assigned, for a new file system under a data source.
pub struct NewFileSystem {
    pub data_source_obj_id: i64,
    pub img_offset: i64,
    pub fs_type: i32,
    pub block_size: i32,
    pub block_count: i64,
    pub root_inum: i64,
    pub first_inum: i64,
    pub last_inum: i64,
}

/// Create a file system as a child of `par_obj_id` (typically an image or
/// volume): the `tsk_objects` row plus its `tsk_fs_info` detail row. When
/// `has_children` is given, `par_obj_id` is recorded in the bitset.
pub async fn add_file_system(
    backend: &Backend,
    par_obj_id: i64,
    new: NewFileSystem,
    has_children: Option<&HasChildrenCache>,
) -> Result<i64> {
    let obj_id = add_object(backend, Some(par_obj_id), ObjectType::FileSystem, has_children).await?;
    match backend {
        Backend::Sqlite(pool) => {
            sqlx::query(
                "INSERT INTO tsk_fs_info \
                 (obj_id, img_offset, fs_type, block_size, block_count, root_inum, first_inum, last_inum, data_source_obj_id) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(obj_id)
            .bind(new.img_offset)
            .bind(new.fs_type)
            .bind(new.block_size)
            .bind(new.block_count)
            .bind(new.root_inum)
            .bind(new.first_inum)
            .bind(new.last_inum)
            .bind(new.data_source_obj_id)
            .execute(pool)
            .await?;
        }
        Backend::Postgres(pool) => {
            sqlx::query(
                "INSERT INTO tsk_fs_info \
                 (obj_id, img_offset, fs_type, block_size, block_count, root_inum, first_inum, last_inum, data_source_obj_id) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(obj_id)
            .bind(new.img_offset)
            .bind(new.fs_type)
            .bind(new.block_size)
            .bind(new.block_count)
            .bind(new.root_inum)
            .bind(new.first_inum)
            .bind(new.last_inum)
            .bind(new.data_source_obj_id)
            .execute(pool)
            .await?;
        }
    }
    Ok(obj_id)
}

fn object_type_from_db(value: i32) -> Result<ObjectType> {
    ObjectType::from_db(value).ok_or_else(|| SkcdError::SchemaCorrupt(format!("unknown tsk_objects.type {value}")))
}

async fn raw_object_row(backend: &Backend, obj_id: i64) -> Result<(i64, Option<i64>, i32)> {
    let row: Option<(i64, Option<i64>, i32)> = match backend {
        Backend::Sqlite(pool) => {
            sqlx::query_as("SELECT obj_id, par_obj_id, type FROM tsk_objects WHERE obj_id = ?")
                .bind(obj_id)
                .fetch_optional(pool)
                .await?
        }
        Backend::Postgres(pool) => {
            sqlx::query_as("SELECT obj_id, par_obj_id, type FROM tsk_objects WHERE obj_id = $1")
                .bind(obj_id)
                .fetch_optional(pool)
                .await?
        }
    };
    row.ok_or_else(|| SkcdError::NotFound(format!("obj_id {obj_id}")))
}

/// Load the typed `Content` for `obj_id`, dispatching on `tsk_objects.type`
/// to whichever side table backs that object kind.
pub async fn get_content_by_id(backend: &Backend, obj_id: i64) -> Result<Content> {
    let (obj_id, _par, type_code) = raw_object_row(backend, obj_id).await?;
    let object_type = object_type_from_db(type_code)?;
    match object_type {
        ObjectType::Image => Ok(Content::Image(load_image_info(backend, obj_id).await?)),
        ObjectType::VolumeSystem => {
            Ok(Content::VolumeSystem(load_vs_info(backend, obj_id).await?))
        }
        ObjectType::Volume => Ok(Content::Volume(load_volume_info(backend, obj_id).await?)),
        ObjectType::Pool => Ok(Content::Pool(load_pool_info(backend, obj_id).await?)),
        ObjectType::FileSystem => Ok(Content::FileSystem(load_fs_info(backend, obj_id).await?)),
        ObjectType::AbstractFile => {
            let file = crate::files::get_file_by_id(backend, obj_id).await?;
            Ok(Content::AbstractFile(file))
        }
        ObjectType::Artifact => {
            let artifact_id: i64 = match backend {
                Backend::Sqlite(pool) => {
                    sqlx::query_scalar("SELECT artifact_id FROM blackboard_artifacts WHERE obj_id = ?")
                        .bind(obj_id)
                        .fetch_one(pool)
                        .await?
                }
                Backend::Postgres(pool) => {
                    sqlx::query_scalar("SELECT artifact_id FROM blackboard_artifacts WHERE obj_id = $1")
                        .bind(obj_id)
                        .fetch_one(pool)
                        .await?
                }
            };
            Ok(Content::Artifact(ArtifactRef { obj_id, artifact_id }))
        }
        ObjectType::Report => Ok(Content::Report(load_report_info(backend, obj_id).await?)),
        ObjectType::OsAccount => Ok(Content::OsAccount(OsAccountRef { obj_id })),
        ObjectType::HostAddress => Ok(Content::HostAddress(HostAddressRef { obj_id })),
        ObjectType::Unsupported => Ok(Content::Unsupported { obj_id }),
    }
}

async fn load_image_info(backend: &Backend, obj_id: i64) -> Result<ImageInfo> {
    let row: (Option<i64>, Option<String>, Option<i64>, Option<String>, Option<String>) = match backend {
        Backend::Sqlite(pool) => {
            sqlx::query_as("SELECT size, tzone, ssize, md5, device_id FROM tsk_image_info WHERE obj_id = ?")
                .bind(obj_id)
                .fetch_one(pool)
                .await?
        }
        Backend::Postgres(pool) => {
            sqlx::query_as("SELECT size, tzone, ssize, md5, device_id FROM tsk_image_info WHERE obj_id = $1")
                .bind(obj_id)
                .fetch_one(pool)
                .await?
        }
    };
    let (size, tzone, ssize, md5, device_id) = row;
    Ok(ImageInfo {
        obj_id,
        device_id: device_id.unwrap_or_default(),
        time_zone: tzone.unwrap_or_default(),
        size: size.unwrap_or(0),
        sector_size: ssize.unwrap_or(0) as i32,
        md5,
        sha1: None,
        sha256: None,
        acquisition_details: None,
        acquisition_tool_name: None,
        acquisition_tool_version: None,
        acquisition_tool_settings: None,
        added_date_time: 0,
        host_id: None,
        paths: image_paths(backend, obj_id).await?,
    })
}

async fn image_paths(backend: &Backend, obj_id: i64) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = match backend {
        Backend::Sqlite(pool) => {
            sqlx::query_as("SELECT name FROM tsk_image_names WHERE obj_id = ? ORDER BY sequence")
                .bind(obj_id)
                .fetch_all(pool)
                .await?
        }
        Backend::Postgres(pool) => {
            sqlx::query_as("SELECT name FROM tsk_image_names WHERE obj_id = $1 ORDER BY sequence")
                .bind(obj_id)
                .fetch_all(pool)
                .await?
        }
    };
    Ok(rows.into_iter().map(|(n,)| n).collect())
}

async fn load_vs_info(backend: &Backend, obj_id: i64) -> Result<VolumeSystemInfo> {
    let row: (Option<i32>, Option<i64>, Option<i32>) = match backend {
        Backend::Sqlite(pool) => {
            sqlx::query_as("SELECT vs_type, img_offset, block_size FROM tsk_vs_info WHERE obj_id = ?")
                .bind(obj_id)
                .fetch_one(pool)
                .await?
        }
        Backend::Postgres(pool) => {
            sqlx::query_as("SELECT vs_type, img_offset, block_size FROM tsk_vs_info WHERE obj_id = $1")
                .bind(obj_id)
                .fetch_one(pool)
                .await?
        }
    };
    Ok(VolumeSystemInfo {
        obj_id,
        vs_type: row.0.unwrap_or(0),
        img_offset: row.1.unwrap_or(0),
        block_size: row.2.unwrap_or(0),
    })
}

async fn load_volume_info(backend: &Backend, obj_id: i64) -> Result<VolumeInfo> {
    // §9 open question: the description column is spelled `desc` on the
    // embedded backend and `descr` on the networked one; read whichever
    // exists rather than normalising the schema.
    let desc_col = if backend.kind() == crate::backend::BackendKind::Embedded { "desc" } else { "descr" };
    let row: (Option<i64>, Option<i64>, Option<i64>, Option<String>, Option<i32>) = match backend {
        Backend::Sqlite(pool) => {
            sqlx::query_as(&format!(
                "SELECT addr, start, length, {desc_col}, flags FROM tsk_vs_parts WHERE obj_id = ?"
            ))
            .bind(obj_id)
            .fetch_one(pool)
            .await?
        }
        Backend::Postgres(pool) => {
            sqlx::query_as(&format!(
                "SELECT addr, start, length, {desc_col}, flags FROM tsk_vs_parts WHERE obj_id = $1"
            ))
            .bind(obj_id)
            .fetch_one(pool)
            .await?
        }
    };
    Ok(VolumeInfo {
        obj_id,
        addr: row.0.unwrap_or(0),
        start: row.1.unwrap_or(0),
        length: row.2.unwrap_or(0),
        flags: row.4.unwrap_or(0),
        description: row.3.unwrap_or_default(),
    })
}

async fn load_pool_info(backend: &Backend, obj_id: i64) -> Result<PoolInfo> {
    let pool_type: Option<i32> = match backend {
        Backend::Sqlite(pool) => {
            sqlx::query_scalar("SELECT pool_type FROM tsk_pool_info WHERE obj_id = ?")
                .bind(obj_id)
                .fetch_one(pool)
                .await?
        }
        Backend::Postgres(pool) => {
            sqlx::query_scalar("SELECT pool_type FROM tsk_pool_info WHERE obj_id = $1")
                .bind(obj_id)
                .fetch_one(pool)
                .await?
        }
    };
    Ok(PoolInfo { obj_id, pool_type: pool_type.unwrap_or(0) })
}

async fn load_fs_info(backend: &Backend, obj_id: i64) -> Result<FileSystemInfo> {
    let row: (Option<i64>, Option<i32>, Option<i32>, Option<i64>, Option<i64>, Option<i64>, Option<i64>) =
        match backend {
            Backend::Sqlite(pool) => {
                sqlx::query_as(
                    "SELECT img_offset, fs_type, block_size, block_count, root_inum, first_inum, last_inum \
                     FROM tsk_fs_info WHERE obj_id = ?",
                )
                .bind(obj_id)
                .fetch_one(pool)
                .await?
            }
            Backend::Postgres(pool) => {
                sqlx::query_as(
                    "SELECT img_offset, fs_type, block_size, block_count, root_inum, first_inum, last_inum \
                     FROM tsk_fs_info WHERE obj_id = $1",
                )
                .bind(obj_id)
                .fetch_one(pool)
                .await?
            }
        };
    let data_source_obj_id = root_data_source(backend, obj_id).await.unwrap_or(obj_id);
    Ok(FileSystemInfo {
        obj_id,
        data_source_obj_id,
        img_offset: row.0.unwrap_or(0),
        fs_type: row.1.unwrap_or(0),
        block_size: row.2.unwrap_or(0),
        block_count: row.3.unwrap_or(0),
        root_inum: row.4.unwrap_or(0),
        first_inum: row.5.unwrap_or(0),
        last_inum: row.6.unwrap_or(0),
    })
}

async fn root_data_source(backend: &Backend, mut obj_id: i64) -> Result<i64> {
    loop {
        let (_, parent, _) = raw_object_row(backend, obj_id).await?;
        match parent {
            Some(p) => obj_id = p,
            None => return Ok(obj_id),
        }
    }
}

async fn load_report_info(backend: &Backend, obj_id: i64) -> Result<ReportInfo> {
    let row: (Option<String>, Option<i64>, Option<String>, Option<String>) = match backend {
        Backend::Sqlite(pool) => {
            sqlx::query_as("SELECT path, crtime, src_module_name, report_name FROM reports WHERE obj_id = ?")
                .bind(obj_id)
                .fetch_one(pool)
                .await?
        }
        Backend::Postgres(pool) => {
            sqlx::query_as("SELECT path, crtime, src_module_name, report_name FROM reports WHERE obj_id = $1")
                .bind(obj_id)
                .fetch_one(pool)
                .await?
        }
    };
    Ok(ReportInfo {
        obj_id,
        path: row.0.unwrap_or_default(),
        source_module_name: row.2.unwrap_or_default(),
        report_name: row.3.unwrap_or_default(),
        created_time: row.1.unwrap_or(0),
    })
}

/// `(obj_id, type)` for every direct child of `obj_id`.
pub async fn get_children_info(backend: &Backend, obj_id: i64) -> Result<Vec<(i64, ObjectType)>> {
    let rows: Vec<(i64, i32)> = match backend {
        Backend::Sqlite(pool) => {
            sqlx::query_as("SELECT obj_id, type FROM tsk_objects WHERE par_obj_id = ?")
                .bind(obj_id)
                .fetch_all(pool)
                .await?
        }
        Backend::Postgres(pool) => {
            sqlx::query_as("SELECT obj_id, type FROM tsk_objects WHERE par_obj_id = $1")
                .bind(obj_id)
                .fetch_all(pool)
                .await?
        }
    };
    rows.into_iter()
        .map(|(id, t)| object_type_from_db(t).map(|ty| (id, ty)))
        .collect()
}

/// `(obj_id, type)` for the parent of `obj_id`, `None` for a root object.
pub async fn get_parent_info(backend: &Backend, obj_id: i64) -> Result<Option<(i64, ObjectType)>> {
    let (_, par_obj_id, _) = raw_object_row(backend, obj_id).await?;
    match par_obj_id {
        None => Ok(None),
        Some(parent_id) => {
            let (_, _, parent_type) = raw_object_row(backend, parent_id).await?;
            Ok(Some((parent_id, object_type_from_db(parent_type)?)))
        }
    }
}

/// `(obj_id, type)` for every distinct parent in the object forest —
/// equivalently, one row per object that has at least one child.
pub async fn get_distinct_parents(backend: &Backend) -> Result<Vec<i64>> {
    let rows: Vec<(i64,)> = match backend {
        Backend::Sqlite(pool) => {
            sqlx::query_as("SELECT DISTINCT par_obj_id FROM tsk_objects WHERE par_obj_id IS NOT NULL")
                .fetch_all(pool)
                .await?
        }
        Backend::Postgres(pool) => {
            sqlx::query_as("SELECT DISTINCT par_obj_id FROM tsk_objects WHERE par_obj_id IS NOT NULL")
                .fetch_all(pool)
                .await?
        }
    };
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// `(obj_id, type)` for every object with no parent — data-source roots and
/// reports (§1's invariant: `par_obj_id` is null only for those two kinds).
pub async fn get_root_objects(backend: &Backend) -> Result<Vec<(i64, ObjectType)>> {
    let rows: Vec<(i64, i32)> = match backend {
        Backend::Sqlite(pool) => {
            sqlx::query_as("SELECT obj_id, type FROM tsk_objects WHERE par_obj_id IS NULL").fetch_all(pool).await?
        }
        Backend::Postgres(pool) => {
            sqlx::query_as("SELECT obj_id, type FROM tsk_objects WHERE par_obj_id IS NULL").fetch_all(pool).await?
        }
    };
    rows.into_iter().map(|(id, t)| object_type_from_db(t).map(|ty| (id, ty))).collect()
}

/// One-shot-populated cache of which `obj_id`s have at least one child, so
/// tree UIs can render expand affordances without a per-row query. A set
/// bit means "has children with probability 1"; a missing bit means
/// "unknown — consult the DB", never "definitely no children" — new
/// inserts after population are either recorded directly
/// (`record_child`) or, failing that, caught by the on-miss fallback
/// query in `has_children`.
pub struct HasChildrenCache {
    backend: Backend,
    set: Arc<RwLock<Option<HashSet<i64>>>>,
}

impl HasChildrenCache {
    pub fn new(backend: Backend) -> Self {
        Self { backend, set: Arc::new(RwLock::new(None)) }
    }

    /// Kick off background population; cheap to call more than once, the
    /// second call observes the set already filling in.
    pub fn spawn_populate(&self) {
        let backend = self.backend.clone();
        let set = Arc::clone(&self.set);
        tokio::spawn(async move {
            if let Ok(ids) = get_distinct_parents(&backend).await {
                *set.write().await = Some(ids.into_iter().collect());
            }
        });
    }

    /// Synchronously re-populate the whole set from `tsk_objects`, used
    /// when a new data source is added so readers never observe a stale
    /// bitset in the meantime.
    pub async fn reload(&self) -> Result<()> {
        let ids = get_distinct_parents(&self.backend).await?;
        *self.set.write().await = Some(ids.into_iter().collect());
        Ok(())
    }

    /// Record that `par_obj_id` now has at least one child, without
    /// waiting for the next full reload. A no-op if the set hasn't been
    /// populated yet — the first `reload`/background population will
    /// already pick up the row this call would have recorded.
    pub async fn record_child(&self, par_obj_id: i64) {
        if let Some(ids) = self.set.write().await.as_mut() {
            ids.insert(par_obj_id);
        }
    }

    pub async fn has_children(&self, obj_id: i64) -> Result<bool> {
        {
            let guard = self.set.read().await;
            if let Some(ids) = guard.as_ref() {
                if ids.contains(&obj_id) {
                    return Ok(true);
                }
                // A missing bit is "unknown", not "no" — an insert since
                // the set was last (re)populated may not have been
                // recorded. Fall through to the live check below.
            }
        }
        let rows: Vec<(i64,)> = match &self.backend {
            Backend::Sqlite(pool) => {
                sqlx::query_as("SELECT 1 FROM tsk_objects WHERE par_obj_id = ? LIMIT 1")
                    .bind(obj_id)
                    .fetch_all(pool)
                    .await?
            }
            Backend::Postgres(pool) => {
                sqlx::query_as("SELECT 1 FROM tsk_objects WHERE par_obj_id = $1 LIMIT 1")
                    .bind(obj_id)
                    .fetch_all(pool)
                    .await?
            }
        };
        Ok(!rows.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_type_round_trips_through_db_codes() {
        for ty in [
            ObjectType::Image,
            ObjectType::VolumeSystem,
            ObjectType::Volume,
            ObjectType::Pool,
            ObjectType::FileSystem,
            ObjectType::AbstractFile,
            ObjectType::Artifact,
            ObjectType::Report,
            ObjectType::OsAccount,
            ObjectType::HostAddress,
            ObjectType::Unsupported,
        ] {
            assert_eq!(object_type_from_db(ty as i32).unwrap(), ty);
        }
    }

    #[test]
    fn unknown_type_code_is_schema_corrupt() {
        assert!(matches!(object_type_from_db(99), Err(SkcdError::SchemaCorrupt(_))));
    }
}
