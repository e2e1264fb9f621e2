//! File store (C6): `tsk_files` plus its side tables — local-path overlay,
//! layout ranges, carved-file folder rotation, and the timeline hook.
//!
//! Grounded on the teacher's `domain::entry::Entry` row shape for the main
//! struct, and on `operations::indexing::persistence` for the
//! insert-then-derive-events two-step (generalized from "index one entry,
//! emit one index event" to "insert one file, emit one timeline event").

use crate::backend::Backend;
use crate::domain::file::{CollectedStatus, DirFlag, DirType, FileKind, KnownStatus, MetaType, UNKNOWN_OWNER_UID};
use crate::domain::File;
use crate::error::{Result, SkcdError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// Everything `INSERT_FILE` needs beyond the identity that object-graph
/// insertion already assigned (§4.4 "Insert invariants").
pub struct NewFile {
    pub par_obj_id: Option<i64>,
    pub fs_obj_id: Option<i64>,
    pub data_source_obj_id: i64,
    pub parent_path: String,
    pub name: String,
    pub kind: FileKind,
    pub dir_type: DirType,
    pub meta_type: MetaType,
    pub dir_flags: i32,
    pub meta_flags: i32,
    pub size: i64,
    pub ctime: i64,
    pub crtime: i64,
    pub atime: i64,
    pub mtime: i64,
    pub md5: Option<String>,
    pub sha1: Option<String>,
    pub sha256: Option<String>,
    pub known: KnownStatus,
    pub mime_type: Option<String>,
    pub owner_uid: Option<String>,
    pub os_account_obj_id: Option<i64>,
    pub collected: CollectedStatus,
    pub has_path: bool,
}

/// A client asking the core to skip deriving timeline events for this case
/// (§4.4, "unless a process-wide flag `timelineEventsDisabled` has been
/// set"). Generalizing the teacher's indexing `progress` reporter, which is
/// likewise an optional collaborator the core calls when present.
#[async_trait]
pub trait TimelineSink: Send + Sync {
    async fn add_events_for_new_file(&self, file: &File) -> Result<()>;
}

pub struct NoopTimelineSink;

#[async_trait]
impl TimelineSink for NoopTimelineSink {
    async fn add_events_for_new_file(&self, _file: &File) -> Result<()> {
        Ok(())
    }
}

/// Insert one row into `tsk_files` (the caller has already created the
/// `tsk_objects` row and passes its `obj_id`), applying every normalisation
/// §4.4 calls out, then emits a timeline event unless disabled.
pub async fn insert_file(
    backend: &Backend,
    obj_id: i64,
    new: NewFile,
    timeline_disabled: bool,
    timeline: &dyn TimelineSink,
) -> Result<File> {
    let extension = File::extract_extension(&new.name);
    let size = File::clamp_size(new.size);
    let owner_uid = new.owner_uid.unwrap_or_else(|| UNKNOWN_OWNER_UID.to_string());

    match backend {
        Backend::Sqlite(pool) => {
            sqlx::query(
                "INSERT INTO tsk_files (\
                    obj_id, fs_obj_id, data_source_obj_id, name, type, extension, \
                    dir_type, meta_type, dir_flags, meta_flags, size, \
                    ctime, crtime, atime, mtime, parent_path, \
                    md5, sha1, sha256, known, mime_type, owner_uid, os_account_obj_id, collected) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(obj_id)
            .bind(new.fs_obj_id)
            .bind(new.data_source_obj_id)
            .bind(&new.name)
            .bind(new.kind as i32)
            .bind(&extension)
            .bind(new.dir_type as i32)
            .bind(new.meta_type as i32)
            .bind(new.dir_flags)
            .bind(new.meta_flags)
            .bind(size)
            .bind(new.ctime)
            .bind(new.crtime)
            .bind(new.atime)
            .bind(new.mtime)
            .bind(&new.parent_path)
            .bind(&new.md5)
            .bind(&new.sha1)
            .bind(&new.sha256)
            .bind(new.known as i32)
            .bind(&new.mime_type)
            .bind(&owner_uid)
            .bind(new.os_account_obj_id)
            .bind(new.collected as i32)
            .execute(pool)
            .await?;
        }
        Backend::Postgres(pool) => {
            sqlx::query(
                "INSERT INTO tsk_files (\
                    obj_id, fs_obj_id, data_source_obj_id, name, type, extension, \
                    dir_type, meta_type, dir_flags, meta_flags, size, \
                    ctime, crtime, atime, mtime, parent_path, \
                    md5, sha1, sha256, known, mime_type, owner_uid, os_account_obj_id, collected) \
                 VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21,$22,$23,$24)",
            )
            .bind(obj_id)
            .bind(new.fs_obj_id)
            .bind(new.data_source_obj_id)
            .bind(&new.name)
            .bind(new.kind as i32)
            .bind(&extension)
            .bind(new.dir_type as i32)
            .bind(new.meta_type as i32)
            .bind(new.dir_flags)
            .bind(new.meta_flags)
            .bind(size)
            .bind(new.ctime)
            .bind(new.crtime)
            .bind(new.atime)
            .bind(new.mtime)
            .bind(&new.parent_path)
            .bind(&new.md5)
            .bind(&new.sha1)
            .bind(&new.sha256)
            .bind(new.known as i32)
            .bind(&new.mime_type)
            .bind(&owner_uid)
            .bind(new.os_account_obj_id)
            .bind(new.collected as i32)
            .execute(pool)
            .await?;
        }
    }

    let file = get_file_by_id(backend, obj_id).await?;

    if !timeline_disabled && file.kind.emits_timeline_events() {
        timeline.add_events_for_new_file(&file).await?;
    } else {
        debug!(obj_id, disabled = timeline_disabled, "skipped timeline event derivation");
    }

    Ok(file)
}

fn row_to_file(
    obj_id: i64,
    fs_obj_id: Option<i64>,
    data_source_obj_id: Option<i64>,
    name: String,
    type_code: i32,
    extension: Option<String>,
    dir_type: Option<i32>,
    meta_type: Option<i32>,
    dir_flags: Option<i32>,
    meta_flags: Option<i32>,
    size: Option<i64>,
    ctime: Option<i64>,
    crtime: Option<i64>,
    atime: Option<i64>,
    mtime: Option<i64>,
    parent_path: Option<String>,
    md5: Option<String>,
    sha1: Option<String>,
    sha256: Option<String>,
    known: Option<i32>,
    mime_type: Option<String>,
    owner_uid: Option<String>,
    os_account_obj_id: Option<i64>,
    collected: Option<i32>,
) -> Result<File> {
    Ok(File {
        obj_id,
        fs_obj_id,
        data_source_obj_id: data_source_obj_id.unwrap_or(0),
        parent_path: parent_path.unwrap_or_default(),
        name,
        extension: extension.unwrap_or_default(),
        kind: FileKind::from_db(type_code)
            .ok_or_else(|| SkcdError::SchemaCorrupt(format!("unknown tsk_files.type {type_code}")))?,
        dir_type: db_dir_type(dir_type.unwrap_or(0))?,
        meta_type: db_meta_type(meta_type.unwrap_or(0))?,
        dir_flags: dir_flags.unwrap_or(DirFlag::Unallocated as i32),
        meta_flags: meta_flags.unwrap_or(0),
        size: size.unwrap_or(0),
        ctime: ctime.unwrap_or(0),
        crtime: crtime.unwrap_or(0),
        atime: atime.unwrap_or(0),
        mtime: mtime.unwrap_or(0),
        md5,
        sha1,
        sha256,
        known: KnownStatus::from_db_or_unknown(known.unwrap_or(0)),
        mime_type,
        owner_uid: owner_uid.unwrap_or_else(|| UNKNOWN_OWNER_UID.to_string()),
        os_account_obj_id,
        collected: CollectedStatus::from_db(collected.unwrap_or(0)).unwrap_or(CollectedStatus::Unknown),
        has_path: false,
    })
}

fn db_dir_type(v: i32) -> Result<DirType> {
    use DirType::*;
    Ok(match v {
        0 => Undef,
        1 => Fifo,
        2 => Dir,
        3 => Chr,
        4 => Blk,
        5 => Reg,
        6 => Lnk,
        7 => Shad,
        8 => Sock,
        9 => Wht,
        10 => Virt,
        other => return Err(SkcdError::SchemaCorrupt(format!("unknown dir_type {other}"))),
    })
}

fn db_meta_type(v: i32) -> Result<MetaType> {
    use MetaType::*;
    Ok(match v {
        0 => Undef,
        1 => Fifo,
        2 => Chr,
        3 => Dir,
        4 => Blk,
        5 => Reg,
        6 => Lnk,
        7 => Shad,
        8 => Sock,
        9 => Wht,
        10 => Virt,
        11 => VirtDir,
        other => return Err(SkcdError::SchemaCorrupt(format!("unknown meta_type {other}"))),
    })
}

type FileRow = (
    i64,
    Option<i64>,
    Option<i64>,
    String,
    i32,
    Option<String>,
    Option<i32>,
    Option<i32>,
    Option<i32>,
    Option<i32>,
    Option<i64>,
    Option<i64>,
    Option<i64>,
    Option<i64>,
    Option<i64>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<i32>,
    Option<String>,
    Option<String>,
    Option<i64>,
    Option<i32>,
);

const FILE_COLUMNS: &str = "obj_id, fs_obj_id, data_source_obj_id, name, type, extension, \
     dir_type, meta_type, dir_flags, meta_flags, size, ctime, crtime, atime, mtime, parent_path, \
     md5, sha1, sha256, known, mime_type, owner_uid, os_account_obj_id, collected";

async fn fetch_one_file(backend: &Backend, sql: &str, obj_id: i64) -> Result<File> {
    let row: FileRow = match backend {
        Backend::Sqlite(pool) => sqlx::query_as(sql).bind(obj_id).fetch_optional(pool).await?,
        Backend::Postgres(pool) => sqlx::query_as(sql).bind(obj_id).fetch_optional(pool).await?,
    }
    .ok_or_else(|| SkcdError::NotFound(format!("tsk_files obj_id {obj_id}")))?;
    let mut file = build_file_from_row(row)?;
    file.has_path = has_local_path(backend, file.obj_id).await?;
    Ok(file)
}

fn build_file_from_row(row: FileRow) -> Result<File> {
    row_to_file(
        row.0, row.1, row.2, row.3, row.4, row.5, row.6, row.7, row.8, row.9, row.10, row.11,
        row.12, row.13, row.14, row.15, row.16, row.17, row.18, row.19, row.20, row.21, row.22,
        row.23,
    )
}

pub async fn get_file_by_id(backend: &Backend, obj_id: i64) -> Result<File> {
    let sql = format!("SELECT {FILE_COLUMNS} FROM tsk_files WHERE obj_id = ?");
    let sql_pg = format!("SELECT {FILE_COLUMNS} FROM tsk_files WHERE obj_id = $1");
    fetch_one_file(backend, if backend.kind() == crate::backend::BackendKind::Embedded { &sql } else { &sql_pg }, obj_id).await
}

async fn has_local_path(backend: &Backend, obj_id: i64) -> Result<bool> {
    let row: Option<(i64,)> = match backend {
        Backend::Sqlite(pool) => {
            sqlx::query_as("SELECT 1 FROM tsk_files_path WHERE obj_id = ?").bind(obj_id).fetch_optional(pool).await?
        }
        Backend::Postgres(pool) => {
            sqlx::query_as("SELECT 1 FROM tsk_files_path WHERE obj_id = $1").bind(obj_id).fetch_optional(pool).await?
        }
    };
    Ok(row.is_some())
}

pub async fn get_files_by_parent_path(
    backend: &Backend,
    fs_obj_id: i64,
    parent_path: &str,
) -> Result<Vec<File>> {
    let rows: Vec<FileRow> = match backend {
        Backend::Sqlite(pool) => {
            sqlx::query_as(&format!(
                "SELECT {FILE_COLUMNS} FROM tsk_files WHERE fs_obj_id = ? AND parent_path = ?"
            ))
            .bind(fs_obj_id)
            .bind(parent_path)
            .fetch_all(pool)
            .await?
        }
        Backend::Postgres(pool) => {
            sqlx::query_as(&format!(
                "SELECT {FILE_COLUMNS} FROM tsk_files WHERE fs_obj_id = $1 AND parent_path = $2"
            ))
            .bind(fs_obj_id)
            .bind(parent_path)
            .fetch_all(pool)
            .await?
        }
    };
    rows.into_iter().map(build_file_from_row).collect()
}

pub async fn get_files_by_name(backend: &Backend, fs_obj_id: i64, name: &str) -> Result<Vec<File>> {
    let rows: Vec<FileRow> = match backend {
        Backend::Sqlite(pool) => {
            sqlx::query_as(&format!("SELECT {FILE_COLUMNS} FROM tsk_files WHERE fs_obj_id = ? AND name = ?"))
                .bind(fs_obj_id)
                .bind(name)
                .fetch_all(pool)
                .await?
        }
        Backend::Postgres(pool) => {
            sqlx::query_as(&format!("SELECT {FILE_COLUMNS} FROM tsk_files WHERE fs_obj_id = $1 AND name = $2"))
                .bind(fs_obj_id)
                .bind(name)
                .fetch_all(pool)
                .await?
        }
    };
    rows.into_iter().map(build_file_from_row).collect()
}

pub async fn get_files_by_extension(backend: &Backend, extension: &str) -> Result<Vec<File>> {
    let rows: Vec<FileRow> = match backend {
        Backend::Sqlite(pool) => {
            sqlx::query_as(&format!("SELECT {FILE_COLUMNS} FROM tsk_files WHERE extension = ?"))
                .bind(extension)
                .fetch_all(pool)
                .await?
        }
        Backend::Postgres(pool) => {
            sqlx::query_as(&format!("SELECT {FILE_COLUMNS} FROM tsk_files WHERE extension = $1"))
                .bind(extension)
                .fetch_all(pool)
                .await?
        }
    };
    rows.into_iter().map(build_file_from_row).collect()
}

/// The local-path overlay (§3 "LocalPath overlay"): one row per file whose
/// bytes live outside the database.
pub async fn insert_local_path(backend: &Backend, obj_id: i64, path: &str, encoding_type: i32) -> Result<()> {
    match backend {
        Backend::Sqlite(pool) => {
            sqlx::query("INSERT INTO tsk_files_path (obj_id, path, encoding_type) VALUES (?, ?, ?)")
                .bind(obj_id)
                .bind(path)
                .bind(encoding_type)
                .execute(pool)
                .await?;
        }
        Backend::Postgres(pool) => {
            sqlx::query("INSERT INTO tsk_files_path (obj_id, path, encoding_type) VALUES ($1, $2, $3)")
                .bind(obj_id)
                .bind(path)
                .bind(encoding_type)
                .execute(pool)
                .await?;
        }
    }
    Ok(())
}

/// One `(byte_start, byte_len, sequence)` row of a layout file's byte
/// stream (§3 "Layout range").
pub async fn insert_layout_range(backend: &Backend, obj_id: i64, byte_start: i64, byte_len: i64, sequence: i64) -> Result<()> {
    match backend {
        Backend::Sqlite(pool) => {
            sqlx::query("INSERT INTO tsk_file_layout (obj_id, byte_start, byte_len, sequence) VALUES (?, ?, ?, ?)")
                .bind(obj_id)
                .bind(byte_start)
                .bind(byte_len)
                .bind(sequence)
                .execute(pool)
                .await?;
        }
        Backend::Postgres(pool) => {
            sqlx::query("INSERT INTO tsk_file_layout (obj_id, byte_start, byte_len, sequence) VALUES ($1, $2, $3, $4)")
                .bind(obj_id)
                .bind(byte_start)
                .bind(byte_len)
                .bind(sequence)
                .execute(pool)
                .await?;
        }
    }
    Ok(())
}

/// Fields `update_derived_file` is allowed to replace (§4.4
/// "Derived-file update"): identity (`obj_id`) is preserved.
pub struct DerivedFileUpdate {
    pub kind: FileKind,
    pub dir_flags: i32,
    pub meta_flags: i32,
    pub size: i64,
    pub ctime: i64,
    pub crtime: i64,
    pub atime: i64,
    pub mtime: i64,
    pub mime_type: Option<String>,
    pub local_path: Option<String>,
}

pub async fn update_derived_file(backend: &Backend, obj_id: i64, update: DerivedFileUpdate) -> Result<File> {
    let size = File::clamp_size(update.size);
    match backend {
        Backend::Sqlite(pool) => {
            sqlx::query(
                "UPDATE tsk_files SET type = ?, dir_flags = ?, meta_flags = ?, size = ?, \
                 ctime = ?, crtime = ?, atime = ?, mtime = ?, mime_type = ? WHERE obj_id = ?",
            )
            .bind(update.kind as i32)
            .bind(update.dir_flags)
            .bind(update.meta_flags)
            .bind(size)
            .bind(update.ctime)
            .bind(update.crtime)
            .bind(update.atime)
            .bind(update.mtime)
            .bind(&update.mime_type)
            .bind(obj_id)
            .execute(pool)
            .await?;
        }
        Backend::Postgres(pool) => {
            sqlx::query(
                "UPDATE tsk_files SET type = $1, dir_flags = $2, meta_flags = $3, size = $4, \
                 ctime = $5, crtime = $6, atime = $7, mtime = $8, mime_type = $9 WHERE obj_id = $10",
            )
            .bind(update.kind as i32)
            .bind(update.dir_flags)
            .bind(update.meta_flags)
            .bind(size)
            .bind(update.ctime)
            .bind(update.crtime)
            .bind(update.atime)
            .bind(update.mtime)
            .bind(&update.mime_type)
            .bind(obj_id)
            .execute(pool)
            .await?;
        }
    }

    if let Some(path) = update.local_path {
        match backend {
            Backend::Sqlite(pool) => {
                sqlx::query("UPDATE tsk_files_path SET path = ? WHERE obj_id = ?")
                    .bind(&path)
                    .bind(obj_id)
                    .execute(pool)
                    .await?;
            }
            Backend::Postgres(pool) => {
                sqlx::query("UPDATE tsk_files_path SET path = $1 WHERE obj_id = $2")
                    .bind(&path)
                    .bind(obj_id)
                    .execute(pool)
                    .await?;
            }
        }
    }

    get_file_by_id(backend, obj_id).await
}

const CARVED_FILES_SOFT_LIMIT: i64 = 2000;
const CARVED_FILES_DIR_NAME: &str = "$CarvedFiles";

/// Per-root-object counters for `$CarvedFiles` subfolder rotation (§4.4).
/// Approximate across concurrent writers by design — the spec calls the
/// 2000 cap a soft target, not a hard invariant.
#[derive(Default)]
pub struct CarvedFilesRegistry {
    counts: Mutex<HashMap<i64, (i64, i64)>>, // root_obj_id -> (current_subfolder, count_in_subfolder)
}

impl CarvedFilesRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the subfolder number a new carved child of `root_obj_id`
    /// should land in, and whether the caller must first create that
    /// subfolder (it is either folder 1 for a never-seen root, or the
    /// current folder just rolled over).
    pub fn next_subfolder(&self, root_obj_id: i64) -> (i64, bool) {
        let mut counts = self.counts.lock().unwrap();
        let entry = counts.entry(root_obj_id).or_insert((1, 0));
        if entry.1 >= CARVED_FILES_SOFT_LIMIT {
            entry.0 += 1;
            entry.1 = 0;
            entry.1 += 1;
            return (entry.0, true);
        }
        let is_new_root = entry.1 == 0 && entry.0 == 1;
        entry.1 += 1;
        (entry.0, is_new_root)
    }
}

/// `obj_id` of an existing child of `par_obj_id` named `name`, if any —
/// used to find a previously created virtual directory rather than
/// re-creating it on every case open.
async fn find_child_by_name(backend: &Backend, par_obj_id: i64, name: &str) -> Result<Option<i64>> {
    match backend {
        Backend::Sqlite(pool) => {
            sqlx::query_scalar(
                "SELECT f.obj_id FROM tsk_files f JOIN tsk_objects o ON o.obj_id = f.obj_id \
                 WHERE o.par_obj_id = ? AND f.name = ?",
            )
            .bind(par_obj_id)
            .bind(name)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
        }
        Backend::Postgres(pool) => {
            sqlx::query_scalar(
                "SELECT f.obj_id FROM tsk_files f JOIN tsk_objects o ON o.obj_id = f.obj_id \
                 WHERE o.par_obj_id = $1 AND f.name = $2",
            )
            .bind(par_obj_id)
            .bind(name)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
        }
    }
}

/// Find-or-create a `VirtualDir` child of `par_obj_id` named `name` —
/// directories never emit timeline events (`FileKind::is_directory`), so
/// this always inserts with the timeline sink disabled.
async fn ensure_virtual_dir(
    backend: &Backend,
    par_obj_id: i64,
    data_source_obj_id: i64,
    parent_path: &str,
    name: &str,
) -> Result<i64> {
    if let Some(existing) = find_child_by_name(backend, par_obj_id, name).await? {
        return Ok(existing);
    }
    let obj_id = crate::objects::add_object(backend, Some(par_obj_id), crate::domain::ObjectType::AbstractFile, None).await?;
    let new_dir = NewFile {
        par_obj_id: Some(par_obj_id),
        fs_obj_id: None,
        data_source_obj_id,
        parent_path: parent_path.to_string(),
        name: name.to_string(),
        kind: FileKind::VirtualDir,
        dir_type: DirType::Dir,
        meta_type: MetaType::Dir,
        dir_flags: 0,
        meta_flags: 0,
        size: 0,
        ctime: 0,
        crtime: 0,
        atime: 0,
        mtime: 0,
        md5: None,
        sha1: None,
        sha256: None,
        known: KnownStatus::Unknown,
        mime_type: None,
        owner_uid: None,
        os_account_obj_id: None,
        collected: CollectedStatus::Unknown,
        has_path: false,
    };
    insert_file(backend, obj_id, new_dir, false, &NoopTimelineSink).await?;
    Ok(obj_id)
}

/// Everything needed to carve one file beyond the identity the object
/// graph will assign it.
pub struct NewCarvedFile {
    pub data_source_obj_id: i64,
    pub name: String,
    pub byte_start: i64,
    pub byte_len: i64,
}

/// Insert a carved file as a child of the numbered `$CarvedFiles`
/// subfolder under `root_obj_id` (the nearest file-system/volume/image
/// ancestor of the carving), creating `$CarvedFiles` and the subfolder on
/// demand (§4.4's rotation rule, driven by `carved_files`).
pub async fn insert_carved_file(
    backend: &Backend,
    carved_files: &CarvedFilesRegistry,
    root_obj_id: i64,
    new: NewCarvedFile,
) -> Result<File> {
    let carved_root_obj_id =
        ensure_virtual_dir(backend, root_obj_id, new.data_source_obj_id, "/", CARVED_FILES_DIR_NAME).await?;

    let (subfolder, _created) = carved_files.next_subfolder(root_obj_id);
    let subfolder_name = subfolder.to_string();
    let subfolder_parent_path = format!("/{CARVED_FILES_DIR_NAME}/");
    let subfolder_obj_id =
        ensure_virtual_dir(backend, carved_root_obj_id, new.data_source_obj_id, &subfolder_parent_path, &subfolder_name)
            .await?;

    let file_obj_id =
        crate::objects::add_object(backend, Some(subfolder_obj_id), crate::domain::ObjectType::AbstractFile, None).await?;
    let carved_parent_path = format!("/{CARVED_FILES_DIR_NAME}/{subfolder_name}/");
    let new_file = NewFile {
        par_obj_id: Some(subfolder_obj_id),
        fs_obj_id: None,
        data_source_obj_id: new.data_source_obj_id,
        parent_path: carved_parent_path,
        name: new.name,
        kind: FileKind::Carved,
        dir_type: DirType::Reg,
        meta_type: MetaType::Reg,
        dir_flags: 0,
        meta_flags: 0,
        size: new.byte_len,
        ctime: 0,
        crtime: 0,
        atime: 0,
        mtime: 0,
        md5: None,
        sha1: None,
        sha256: None,
        known: KnownStatus::Unknown,
        mime_type: None,
        owner_uid: None,
        os_account_obj_id: None,
        collected: CollectedStatus::Unknown,
        has_path: false,
    };
    let file = insert_file(backend, file_obj_id, new_file, false, &NoopTimelineSink).await?;
    insert_layout_range(backend, file_obj_id, new.byte_start, new.byte_len, 0).await?;
    Ok(file)
}

impl KnownStatus {
    fn from_db_or_unknown(v: i32) -> Self {
        match v {
            1 => KnownStatus::Known,
            2 => KnownStatus::KnownBad,
            _ => KnownStatus::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carved_files_rotate_after_soft_limit() {
        let registry = CarvedFilesRegistry::new();
        let mut folders = Vec::new();
        for _ in 0..4500 {
            let (folder, _) = registry.next_subfolder(1);
            folders.push(folder);
        }
        let count_in = |n: i64| folders.iter().filter(|&&f| f == n).count();
        assert_eq!(count_in(1), 2000);
        assert_eq!(count_in(2), 2000);
        assert_eq!(count_in(3), 500);
    }

    #[test]
    fn distinct_roots_get_independent_counters() {
        let registry = CarvedFilesRegistry::new();
        let (folder_a, created_a) = registry.next_subfolder(10);
        let (folder_b, created_b) = registry.next_subfolder(20);
        assert_eq!(folder_a, 1);
        assert_eq!(folder_b, 1);
        assert!(created_a);
        assert!(created_b);
    }
}
