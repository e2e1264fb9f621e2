//! 8.1 → 8.2: add SHA-1/SHA-256 on images; `acquisition_details`;
//! `tsk_db_info_extended`; event-type + event-description + events tables
//! with indices.

use super::{column_exists, exec, table_exists};
use crate::backend::{Backend, BackendKind, DdlDialect};
use crate::error::Result;
use futures::future::BoxFuture;

pub fn run<'a>(backend: &'a Backend, kind: BackendKind) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let bigint = kind.bigint();

        for column in ["sha1", "sha256"] {
            if !column_exists(backend, "tsk_image_info", column).await? {
                exec(backend, &format!("ALTER TABLE tsk_image_info ADD COLUMN {column} TEXT")).await?;
            }
        }
        if !column_exists(backend, "tsk_image_info", "acquisition_details").await? {
            exec(backend, "ALTER TABLE tsk_image_info ADD COLUMN acquisition_details TEXT").await?;
        }

        if !table_exists(backend, "tsk_db_info_extended").await? {
            exec(
                backend,
                "CREATE TABLE tsk_db_info_extended (name TEXT NOT NULL UNIQUE, value_text TEXT)",
            )
            .await?;
        }

        if !table_exists(backend, "tsk_event_types").await? {
            exec(
                backend,
                &format!(
                    "CREATE TABLE tsk_event_types (\
                        event_type_id {pk}, display_name TEXT NOT NULL, super_type_id {bigint}, \
                        FOREIGN KEY(super_type_id) REFERENCES tsk_event_types(event_type_id))",
                    pk = kind.autoincrement_pk()
                ),
            )
            .await?;
        }

        if !table_exists(backend, "tsk_event_descriptions").await? {
            exec(
                backend,
                &format!(
                    "CREATE TABLE tsk_event_descriptions (\
                        event_description_id {pk}, full_description TEXT NOT NULL, \
                        med_description TEXT, short_description TEXT, \
                        data_source_obj_id {bigint}, file_obj_id {bigint}, artifact_id {bigint}, \
                        hash_hit {bigint} DEFAULT 0, tagged {bigint} DEFAULT 0)",
                    pk = kind.autoincrement_pk()
                ),
            )
            .await?;
        }

        if !table_exists(backend, "tsk_events").await? {
            exec(
                backend,
                &format!(
                    "CREATE TABLE tsk_events (\
                        event_id {pk}, event_type_id {bigint} NOT NULL, event_description_id {bigint} NOT NULL, \
                        time {bigint} NOT NULL, \
                        FOREIGN KEY(event_type_id) REFERENCES tsk_event_types(event_type_id), \
                        FOREIGN KEY(event_description_id) REFERENCES tsk_event_descriptions(event_description_id))",
                    pk = kind.autoincrement_pk()
                ),
            )
            .await?;
            exec(
                backend,
                "CREATE INDEX tsk_events_data_source_obj_id ON tsk_event_descriptions(data_source_obj_id)",
            )
            .await?;
            exec(backend, "CREATE INDEX tsk_events_time ON tsk_events(time)").await?;
        }

        seed_base_event_types(backend, kind).await?;

        Ok(())
    })
}

async fn seed_base_event_types(backend: &Backend, _kind: BackendKind) -> Result<()> {
    let count: i64 = match backend {
        Backend::Sqlite(pool) => {
            sqlx::query_scalar("SELECT COUNT(*) FROM tsk_event_types").fetch_one(pool).await?
        }
        Backend::Postgres(pool) => {
            sqlx::query_scalar("SELECT COUNT(*) FROM tsk_event_types").fetch_one(pool).await?
        }
    };
    if count > 0 {
        return Ok(());
    }
    for name in ["File System", "Web Activity", "Misc Types"] {
        exec(
            backend,
            &format!("INSERT INTO tsk_event_types (display_name, super_type_id) VALUES ('{name}', NULL)"),
        )
        .await?;
    }
    Ok(())
}
