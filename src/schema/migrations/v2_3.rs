//! Schema version 2 → 3: introduce `tag_names`, `content_tags`,
//! `blackboard_artifact_tags`, `reports`; denormalize `artifact_type_id`
//! into `blackboard_attributes`; migrate pre-3 tag artifacts into the new
//! tag tables.
//!
//! `create_base_tables` additionally lays down the version-2 baseline this
//! step (and `crate::schema::migrations::create_fresh`) assumes already
//! exists: `tsk_objects`, `tsk_files` and friends, `tsk_db_info`.

use super::{column_exists, exec, table_exists};
use crate::backend::{Backend, BackendKind, DdlDialect};
use crate::error::Result;
use futures::future::BoxFuture;

pub async fn create_base_tables(backend: &Backend, kind: BackendKind) -> Result<()> {
    if table_exists(backend, "tsk_objects").await? {
        return Ok(());
    }

    let pk = kind.autoincrement_pk();
    let bigint = kind.bigint();

    exec(
        backend,
        &format!(
            "CREATE TABLE tsk_db_info (schema_ver {bigint} NOT NULL, tsk_ver {bigint} NOT NULL)"
        ),
    )
    .await?;
    exec(backend, "INSERT INTO tsk_db_info (schema_ver, tsk_ver) VALUES (2, 1)").await?;

    exec(
        backend,
        &format!(
            "CREATE TABLE tsk_db_info_extended (name TEXT NOT NULL UNIQUE, value_text TEXT)"
        ),
    )
    .await?;

    exec(
        backend,
        &format!(
            "CREATE TABLE tsk_objects (\
                obj_id {pk}, \
                par_obj_id {bigint}, \
                type {bigint} NOT NULL, \
                FOREIGN KEY(par_obj_id) REFERENCES tsk_objects(obj_id))"
        ),
    )
    .await?;
    exec(
        backend,
        "CREATE INDEX tsk_objects_par_obj_id ON tsk_objects(par_obj_id)",
    )
    .await?;

    exec(
        backend,
        &format!(
            "CREATE TABLE tsk_image_info (\
                obj_id {bigint} PRIMARY KEY, \
                type {bigint}, ssize {bigint}, tzone TEXT, size {bigint}, \
                md5 TEXT, device_id TEXT, time_zone TEXT, \
                FOREIGN KEY(obj_id) REFERENCES tsk_objects(obj_id))"
        ),
    )
    .await?;

    exec(
        backend,
        &format!(
            "CREATE TABLE tsk_image_names (\
                obj_id {bigint} NOT NULL, name TEXT NOT NULL, sequence {bigint} NOT NULL, \
                FOREIGN KEY(obj_id) REFERENCES tsk_objects(obj_id))"
        ),
    )
    .await?;

    exec(
        backend,
        &format!(
            "CREATE TABLE tsk_vs_info (\
                obj_id {bigint} PRIMARY KEY, vs_type {bigint}, img_offset {bigint}, block_size {bigint}, \
                FOREIGN KEY(obj_id) REFERENCES tsk_objects(obj_id))"
        ),
    )
    .await?;

    // §9 open question: the source mixes `desc`/`descr` spellings for this
    // table across backends; preserve the divergence rather than normalise
    // it away. Embedded carries `desc`, networked carries `descr`, and
    // query code falls back from one to the other (`crate::objects`).
    let vs_parts_desc_col = if kind == BackendKind::Embedded { "desc" } else { "descr" };
    exec(
        backend,
        &format!(
            "CREATE TABLE tsk_vs_parts (\
                obj_id {bigint} PRIMARY KEY, addr {bigint}, start {bigint}, length {bigint}, \
                {vs_parts_desc_col} TEXT, flags {bigint}, \
                FOREIGN KEY(obj_id) REFERENCES tsk_objects(obj_id))"
        ),
    )
    .await?;

    exec(
        backend,
        &format!(
            "CREATE TABLE tsk_fs_info (\
                obj_id {bigint} PRIMARY KEY, img_offset {bigint}, fs_type {bigint}, block_size {bigint}, \
                block_count {bigint}, root_inum {bigint}, first_inum {bigint}, last_inum {bigint}, \
                FOREIGN KEY(obj_id) REFERENCES tsk_objects(obj_id))"
        ),
    )
    .await?;

    exec(
        backend,
        &format!(
            "CREATE TABLE tsk_files (\
                obj_id {bigint} PRIMARY KEY, fs_obj_id {bigint}, \
                name TEXT NOT NULL, type {bigint}, \
                dir_type {bigint}, meta_type {bigint}, dir_flags {bigint}, meta_flags {bigint}, \
                size {bigint}, ctime {bigint}, crtime {bigint}, atime {bigint}, mtime {bigint}, \
                parent_path TEXT, md5 TEXT, known {bigint}, \
                FOREIGN KEY(obj_id) REFERENCES tsk_objects(obj_id), \
                FOREIGN KEY(fs_obj_id) REFERENCES tsk_fs_info(obj_id))"
        ),
    )
    .await?;
    exec(backend, "CREATE INDEX tsk_files_name ON tsk_files(name)").await?;

    exec(
        backend,
        &format!(
            "CREATE TABLE tsk_files_path (obj_id {bigint} PRIMARY KEY, path TEXT, \
                FOREIGN KEY(obj_id) REFERENCES tsk_objects(obj_id))"
        ),
    )
    .await?;

    exec(
        backend,
        &format!(
            "CREATE TABLE tsk_file_layout (\
                obj_id {bigint} NOT NULL, byte_start {bigint} NOT NULL, byte_len {bigint} NOT NULL, \
                sequence {bigint} NOT NULL, \
                FOREIGN KEY(obj_id) REFERENCES tsk_objects(obj_id))"
        ),
    )
    .await?;

    exec(
        backend,
        &format!(
            "CREATE TABLE blackboard_artifact_types (\
                artifact_type_id {bigint} PRIMARY KEY, type_name TEXT NOT NULL UNIQUE, display_name TEXT)"
        ),
    )
    .await?;

    exec(
        backend,
        &format!(
            "CREATE TABLE blackboard_attribute_types (\
                attribute_type_id {bigint} PRIMARY KEY, type_name TEXT NOT NULL UNIQUE, display_name TEXT, value_type {bigint})"
        ),
    )
    .await?;

    exec(
        backend,
        &format!(
            "CREATE TABLE blackboard_artifacts (\
                artifact_id {bigint} PRIMARY KEY, obj_id {bigint} NOT NULL, artifact_type_id {bigint} NOT NULL, \
                FOREIGN KEY(obj_id) REFERENCES tsk_objects(obj_id), \
                FOREIGN KEY(artifact_type_id) REFERENCES blackboard_artifact_types(artifact_type_id))"
        ),
    )
    .await?;
    exec(
        backend,
        "CREATE INDEX blackboard_artifacts_obj_id ON blackboard_artifacts(obj_id)",
    )
    .await?;

    exec(
        backend,
        &format!(
            "CREATE TABLE blackboard_attributes (\
                artifact_id {bigint} NOT NULL, source TEXT, attribute_type_id {bigint} NOT NULL, \
                value_type {bigint} NOT NULL, value_byte {kind_blob}, value_text TEXT, \
                value_int32 {bigint}, value_int64 {bigint}, value_double DOUBLE PRECISION, \
                FOREIGN KEY(artifact_id) REFERENCES blackboard_artifacts(artifact_id))",
            kind_blob = kind.blob()
        ),
    )
    .await?;
    exec(
        backend,
        "CREATE INDEX blackboard_attributes_artifact_id ON blackboard_attributes(artifact_id)",
    )
    .await?;

    Ok(())
}

pub fn run<'a>(backend: &'a Backend, kind: BackendKind) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        if !table_exists(backend, "tag_names").await? {
            exec(
                backend,
                &format!(
                    "CREATE TABLE tag_names (\
                        tag_name_id {pk}, display_name TEXT NOT NULL, description TEXT, \
                        color TEXT, knownStatus {bigint})",
                    pk = kind.autoincrement_pk(),
                    bigint = kind.bigint()
                ),
            )
            .await?;
        }

        if !table_exists(backend, "content_tags").await? {
            exec(
                backend,
                &format!(
                    "CREATE TABLE content_tags (\
                        tag_id {pk}, obj_id {bigint} NOT NULL, tag_name_id {bigint} NOT NULL, \
                        comment TEXT, begin_byte_offset {bigint}, end_byte_offset {bigint}, \
                        FOREIGN KEY(obj_id) REFERENCES tsk_objects(obj_id), \
                        FOREIGN KEY(tag_name_id) REFERENCES tag_names(tag_name_id))",
                    pk = kind.autoincrement_pk(),
                    bigint = kind.bigint()
                ),
            )
            .await?;
            exec(backend, "CREATE INDEX content_tags_obj_id ON content_tags(obj_id)").await?;
        }

        if !table_exists(backend, "blackboard_artifact_tags").await? {
            exec(
                backend,
                &format!(
                    "CREATE TABLE blackboard_artifact_tags (\
                        tag_id {pk}, artifact_id {bigint} NOT NULL, tag_name_id {bigint} NOT NULL, \
                        comment TEXT, \
                        FOREIGN KEY(artifact_id) REFERENCES blackboard_artifacts(artifact_id), \
                        FOREIGN KEY(tag_name_id) REFERENCES tag_names(tag_name_id))",
                    pk = kind.autoincrement_pk(),
                    bigint = kind.bigint()
                ),
            )
            .await?;
            exec(
                backend,
                "CREATE INDEX blackboard_artifact_tags_artifact_id ON blackboard_artifact_tags(artifact_id)",
            )
            .await?;
        }

        if !table_exists(backend, "reports").await? {
            exec(
                backend,
                &format!(
                    "CREATE TABLE reports (\
                        report_id {pk}, path TEXT, crtime {bigint}, src_module_name TEXT, report_name TEXT)",
                    pk = kind.autoincrement_pk(),
                    bigint = kind.bigint()
                ),
            )
            .await?;
        }

        if !column_exists(backend, "blackboard_attributes", "artifact_type_id").await? {
            add_column(
                backend,
                kind,
                "blackboard_attributes",
                "artifact_type_id",
                kind.bigint(),
            )
            .await?;
            exec(
                backend,
                "UPDATE blackboard_attributes SET artifact_type_id = ( \
                    SELECT artifact_type_id FROM blackboard_artifacts \
                    WHERE blackboard_artifacts.artifact_id = blackboard_attributes.artifact_id) \
                 WHERE artifact_type_id IS NULL",
            )
            .await?;
        }

        // Legacy pre-3 "tag" artifacts (a TSK_TAG_NAME/TSK_TAG_FILE attribute
        // pair on an ordinary artifact) are migrated into `content_tags`/
        // `tag_names` once, then left alone; the source table itself does
        // not need to be dropped (migrations never drop user-visible data).
        migrate_legacy_tag_artifacts(backend).await?;

        Ok(())
    })
}

async fn add_column(
    backend: &Backend,
    _kind: BackendKind,
    table: &str,
    column: &str,
    ty: &str,
) -> Result<()> {
    exec(backend, &format!("ALTER TABLE {table} ADD COLUMN {column} {ty}")).await
}

/// Pre-3 installs represented a tag as an ordinary `blackboard_artifacts`
/// row of type `TSK_TAG_FILE` carrying a `TSK_TAG_NAME` string attribute
/// (the tag's display name) and an optional `TSK_COMMENT` string
/// attribute; fold each such artifact into `tag_names`/`content_tags` and
/// leave the source artifact in place (migrations never drop user-visible
/// data).
async fn migrate_legacy_tag_artifacts(backend: &Backend) -> Result<()> {
    let tag_file_type_id: Option<i64> = match backend {
        Backend::Sqlite(pool) => {
            sqlx::query_scalar("SELECT artifact_type_id FROM blackboard_artifact_types WHERE type_name = ?")
                .bind("TSK_TAG_FILE")
                .fetch_optional(pool)
                .await?
        }
        Backend::Postgres(pool) => {
            sqlx::query_scalar("SELECT artifact_type_id FROM blackboard_artifact_types WHERE type_name = $1")
                .bind("TSK_TAG_FILE")
                .fetch_optional(pool)
                .await?
        }
    };
    let Some(tag_file_type_id) = tag_file_type_id else {
        // Legacy installs at schema 2 that never ran the old tagging
        // module have no `TSK_TAG_FILE` artifact type registered —
        // nothing to migrate.
        return Ok(());
    };

    let artifacts: Vec<(i64, i64)> = match backend {
        Backend::Sqlite(pool) => {
            sqlx::query_as("SELECT artifact_id, obj_id FROM blackboard_artifacts WHERE artifact_type_id = ?")
                .bind(tag_file_type_id)
                .fetch_all(pool)
                .await?
        }
        Backend::Postgres(pool) => {
            sqlx::query_as("SELECT artifact_id, obj_id FROM blackboard_artifacts WHERE artifact_type_id = $1")
                .bind(tag_file_type_id)
                .fetch_all(pool)
                .await?
        }
    };
    if artifacts.is_empty() {
        return Ok(());
    }

    for (artifact_id, obj_id) in artifacts {
        let Some(display_name) = legacy_tag_attribute_text(backend, artifact_id, "TSK_TAG_NAME").await? else {
            // No name attribute survived on this row; nothing sensible to tag with.
            continue;
        };
        let comment = legacy_tag_attribute_text(backend, artifact_id, "TSK_COMMENT").await?;

        let tag_name_id = ensure_legacy_tag_name(backend, &display_name).await?;
        match backend {
            Backend::Sqlite(pool) => {
                sqlx::query("INSERT INTO content_tags (obj_id, tag_name_id, comment) VALUES (?, ?, ?)")
                    .bind(obj_id)
                    .bind(tag_name_id)
                    .bind(comment)
                    .execute(pool)
                    .await?;
            }
            Backend::Postgres(pool) => {
                sqlx::query("INSERT INTO content_tags (obj_id, tag_name_id, comment) VALUES ($1, $2, $3)")
                    .bind(obj_id)
                    .bind(tag_name_id)
                    .bind(comment)
                    .execute(pool)
                    .await?;
            }
        }
    }
    Ok(())
}

async fn legacy_tag_attribute_text(
    backend: &Backend,
    artifact_id: i64,
    attribute_type_name: &str,
) -> Result<Option<String>> {
    match backend {
        Backend::Sqlite(pool) => {
            sqlx::query_scalar(
                "SELECT a.value_text FROM blackboard_attributes a \
                 JOIN blackboard_attribute_types t ON t.attribute_type_id = a.attribute_type_id \
                 WHERE a.artifact_id = ? AND t.type_name = ?",
            )
            .bind(artifact_id)
            .bind(attribute_type_name)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
        }
        Backend::Postgres(pool) => {
            sqlx::query_scalar(
                "SELECT a.value_text FROM blackboard_attributes a \
                 JOIN blackboard_attribute_types t ON t.attribute_type_id = a.attribute_type_id \
                 WHERE a.artifact_id = $1 AND t.type_name = $2",
            )
            .bind(artifact_id)
            .bind(attribute_type_name)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
        }
    }
}

async fn ensure_legacy_tag_name(backend: &Backend, display_name: &str) -> Result<i64> {
    let existing: Option<i64> = match backend {
        Backend::Sqlite(pool) => {
            sqlx::query_scalar("SELECT tag_name_id FROM tag_names WHERE display_name = ?")
                .bind(display_name)
                .fetch_optional(pool)
                .await?
        }
        Backend::Postgres(pool) => {
            sqlx::query_scalar("SELECT tag_name_id FROM tag_names WHERE display_name = $1")
                .bind(display_name)
                .fetch_optional(pool)
                .await?
        }
    };
    if let Some(id) = existing {
        return Ok(id);
    }
    match backend {
        Backend::Sqlite(pool) => {
            let res = sqlx::query("INSERT INTO tag_names (display_name) VALUES (?)")
                .bind(display_name)
                .execute(pool)
                .await?;
            Ok(res.last_insert_rowid())
        }
        Backend::Postgres(pool) => {
            let row: (i64,) = sqlx::query_as("INSERT INTO tag_names (display_name) VALUES ($1) RETURNING tag_name_id")
                .bind(display_name)
                .fetch_one(pool)
                .await?;
            Ok(row.0)
        }
    }
}
