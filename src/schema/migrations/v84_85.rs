//! 8.4 → 8.5: add `tsk_tag_sets`, `tag_set_id`, `rank`; migrate legacy
//! Project-VIC tag names; add `data_source_obj_id` on `tsk_fs_info`.

use super::{column_exists, exec, table_exists};
use crate::backend::{Backend, BackendKind, DdlDialect};
use crate::error::Result;
use futures::future::BoxFuture;

const PROJECT_VIC_PREFIX: &str = "PROJECT_VIC__";

pub fn run<'a>(backend: &'a Backend, kind: BackendKind) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let bigint = kind.bigint();

        if !table_exists(backend, "tsk_tag_sets").await? {
            exec(
                backend,
                &format!(
                    "CREATE TABLE tsk_tag_sets (tag_set_id {pk}, name TEXT NOT NULL UNIQUE)",
                    pk = kind.autoincrement_pk()
                ),
            )
            .await?;
        }

        if !column_exists(backend, "tag_names", "tag_set_id").await? {
            exec(backend, &format!("ALTER TABLE tag_names ADD COLUMN tag_set_id {bigint}")).await?;
        }
        if !column_exists(backend, "tag_names", "rank").await? {
            exec(backend, &format!("ALTER TABLE tag_names ADD COLUMN rank {bigint}")).await?;
        }

        migrate_legacy_project_vic_tags(backend).await?;

        if !column_exists(backend, "tsk_fs_info", "data_source_obj_id").await? {
            exec(
                backend,
                &format!("ALTER TABLE tsk_fs_info ADD COLUMN data_source_obj_id {bigint}"),
            )
            .await?;
        }

        Ok(())
    })
}

/// Pre-8.5 installs of the Project VIC ingest module stored its category
/// tags as plain `tag_names` rows with a `PROJECT_VIC__` display-name
/// prefix and no tag set; fold them under one named set and strip the
/// prefix so they render like any other tag going forward.
async fn migrate_legacy_project_vic_tags(backend: &Backend) -> Result<()> {
    if !table_exists(backend, "tag_names").await? {
        return Ok(());
    }
    let rows: Vec<(i64, String)> = match backend {
        Backend::Sqlite(pool) => {
            sqlx::query_as("SELECT tag_name_id, display_name FROM tag_names WHERE display_name LIKE ?")
                .bind(format!("{PROJECT_VIC_PREFIX}%"))
                .fetch_all(pool)
                .await?
        }
        Backend::Postgres(pool) => {
            sqlx::query_as("SELECT tag_name_id, display_name FROM tag_names WHERE display_name LIKE $1")
                .bind(format!("{PROJECT_VIC_PREFIX}%"))
                .fetch_all(pool)
                .await?
        }
    };
    if rows.is_empty() {
        return Ok(());
    }

    let set_id = ensure_project_vic_set(backend).await?;
    for (tag_name_id, display_name) in rows {
        let stripped = display_name.trim_start_matches(PROJECT_VIC_PREFIX).to_string();
        match backend {
            Backend::Sqlite(pool) => {
                sqlx::query("UPDATE tag_names SET display_name = ?, tag_set_id = ? WHERE tag_name_id = ?")
                    .bind(stripped)
                    .bind(set_id)
                    .bind(tag_name_id)
                    .execute(pool)
                    .await?;
            }
            Backend::Postgres(pool) => {
                sqlx::query("UPDATE tag_names SET display_name = $1, tag_set_id = $2 WHERE tag_name_id = $3")
                    .bind(stripped)
                    .bind(set_id)
                    .bind(tag_name_id)
                    .execute(pool)
                    .await?;
            }
        }
    }
    Ok(())
}

async fn ensure_project_vic_set(backend: &Backend) -> Result<i64> {
    let existing: Option<i64> = match backend {
        Backend::Sqlite(pool) => {
            sqlx::query_scalar("SELECT tag_set_id FROM tsk_tag_sets WHERE name = ?")
                .bind("Project VIC")
                .fetch_optional(pool)
                .await?
        }
        Backend::Postgres(pool) => {
            sqlx::query_scalar("SELECT tag_set_id FROM tsk_tag_sets WHERE name = $1")
                .bind("Project VIC")
                .fetch_optional(pool)
                .await?
        }
    };
    if let Some(id) = existing {
        return Ok(id);
    }
    match backend {
        Backend::Sqlite(pool) => {
            let res = sqlx::query("INSERT INTO tsk_tag_sets (name) VALUES ('Project VIC')")
                .execute(pool)
                .await?;
            Ok(res.last_insert_rowid())
        }
        Backend::Postgres(pool) => {
            let row: (i64,) =
                sqlx::query_as("INSERT INTO tsk_tag_sets (name) VALUES ('Project VIC') RETURNING tag_set_id")
                    .fetch_one(pool)
                    .await?;
            Ok(row.0)
        }
    }
}
