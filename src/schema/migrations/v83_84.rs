//! 8.3 → 8.4: rename `file_obj_id → content_obj_id` on event descriptions
//! (create-copy-rename on the embedded backend, plain `ALTER` on the
//! networked one — §9 "Schema engine and DDL portability"); add
//! `tsk_pool_info`; add default messaging-app account types.

use super::{column_exists, exec, table_exists};
use crate::backend::{Backend, BackendKind, DdlDialect};
use crate::error::Result;
use futures::future::BoxFuture;

pub fn run<'a>(backend: &'a Backend, kind: BackendKind) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        if column_exists(backend, "tsk_event_descriptions", "file_obj_id").await?
            && !column_exists(backend, "tsk_event_descriptions", "content_obj_id").await?
        {
            rename_file_obj_id(backend, kind).await?;
        }

        if !table_exists(backend, "tsk_pool_info").await? {
            exec(
                backend,
                &format!(
                    "CREATE TABLE tsk_pool_info (\
                        obj_id {bigint} PRIMARY KEY, pool_type {bigint}, \
                        FOREIGN KEY(obj_id) REFERENCES tsk_objects(obj_id))",
                    bigint = kind.bigint()
                ),
            )
            .await?;
        }

        seed_messaging_account_types(backend).await?;

        Ok(())
    })
}

async fn rename_file_obj_id(backend: &Backend, kind: BackendKind) -> Result<()> {
    match (backend, kind) {
        (Backend::Postgres(_), BackendKind::Networked) => {
            exec(
                backend,
                "ALTER TABLE tsk_event_descriptions RENAME COLUMN file_obj_id TO content_obj_id",
            )
            .await?;
        }
        (Backend::Sqlite(_), BackendKind::Embedded) => {
            exec(
                backend,
                "CREATE TABLE tsk_event_descriptions_new (\
                    event_description_id INTEGER PRIMARY KEY AUTOINCREMENT, full_description TEXT NOT NULL, \
                    med_description TEXT, short_description TEXT, \
                    data_source_obj_id INTEGER, content_obj_id INTEGER, artifact_id INTEGER, \
                    hash_hit INTEGER DEFAULT 0, tagged INTEGER DEFAULT 0)",
            )
            .await?;
            exec(
                backend,
                "INSERT INTO tsk_event_descriptions_new \
                 (event_description_id, full_description, med_description, short_description, \
                  data_source_obj_id, content_obj_id, artifact_id, hash_hit, tagged) \
                 SELECT event_description_id, full_description, med_description, short_description, \
                  data_source_obj_id, file_obj_id, artifact_id, hash_hit, tagged \
                 FROM tsk_event_descriptions",
            )
            .await?;
            exec(backend, "DROP TABLE tsk_event_descriptions").await?;
            exec(
                backend,
                "ALTER TABLE tsk_event_descriptions_new RENAME TO tsk_event_descriptions",
            )
            .await?;
        }
        _ => unreachable!("Backend/BackendKind pairing is always consistent"),
    }
    Ok(())
}

async fn seed_messaging_account_types(backend: &Backend) -> Result<()> {
    if !table_exists(backend, "account_types").await? {
        return Ok(());
    }
    let count: i64 = match backend {
        Backend::Sqlite(pool) => sqlx::query_scalar("SELECT COUNT(*) FROM account_types").fetch_one(pool).await?,
        Backend::Postgres(pool) => sqlx::query_scalar("SELECT COUNT(*) FROM account_types").fetch_one(pool).await?,
    };
    if count > 0 {
        return Ok(());
    }
    for name in ["Email", "Phone", "Facebook", "Twitter", "Instagram", "WhatsApp"] {
        exec(
            backend,
            &format!("INSERT INTO account_types (type_name, display_name) VALUES ('{name}', '{name}')"),
        )
        .await?;
    }
    Ok(())
}
