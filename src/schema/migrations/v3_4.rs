//! 3 → 4: add `mime_type`, `value_type`, `data_source_info` (with
//! time-zone, device-id), `data_source_obj_id` on `tsk_files`; add
//! ingest-job/ingest-module tables.

use super::{column_exists, exec, table_exists};
use crate::backend::{Backend, BackendKind, DdlDialect};
use crate::error::Result;
use futures::future::BoxFuture;

pub fn run<'a>(backend: &'a Backend, kind: BackendKind) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let bigint = kind.bigint();

        if !column_exists(backend, "tsk_files", "mime_type").await? {
            exec(backend, "ALTER TABLE tsk_files ADD COLUMN mime_type TEXT").await?;
        }
        if !column_exists(backend, "blackboard_attributes", "value_type").await? {
            // `value_type` already exists on fresh schema-2 installs (it was
            // part of the base table from the start); this probe only fires
            // for genuinely old pre-3 databases missing it.
            exec(
                backend,
                &format!("ALTER TABLE blackboard_attributes ADD COLUMN value_type {bigint}"),
            )
            .await?;
        }

        if !table_exists(backend, "data_source_info").await? {
            exec(
                backend,
                &format!(
                    "CREATE TABLE data_source_info (\
                        obj_id {bigint} PRIMARY KEY, device_id TEXT NOT NULL, \
                        time_zone TEXT, acquisition_details TEXT, \
                        FOREIGN KEY(obj_id) REFERENCES tsk_objects(obj_id))"
                ),
            )
            .await?;
        }

        // §9 Design Notes: on an upgraded (pre-existing) database the
        // foreign key to `data_source_info` is intentionally omitted here —
        // the column is added as a plain nullable reference and only a
        // freshly created database (`create_fresh`) constrains it. This
        // divergence is preserved rather than normalised away.
        if !column_exists(backend, "tsk_files", "data_source_obj_id").await? {
            exec(
                backend,
                &format!("ALTER TABLE tsk_files ADD COLUMN data_source_obj_id {bigint}"),
            )
            .await?;
        }

        if !table_exists(backend, "ingest_jobs").await? {
            exec(
                backend,
                &format!(
                    "CREATE TABLE ingest_jobs (\
                        ingest_job_id {pk}, obj_id {bigint} NOT NULL, \
                        host_name TEXT, start_date_time {bigint}, end_date_time {bigint}, status {bigint})",
                    pk = kind.autoincrement_pk(),
                ),
            )
            .await?;
        }
        if !table_exists(backend, "ingest_modules").await? {
            exec(
                backend,
                &format!(
                    "CREATE TABLE ingest_modules (\
                        ingest_module_id {pk}, display_name TEXT NOT NULL, unique_name TEXT NOT NULL UNIQUE, type {bigint}, version TEXT)",
                    pk = kind.autoincrement_pk(),
                ),
            )
            .await?;
        }
        if !table_exists(backend, "ingest_job_status_types").await? {
            exec(
                backend,
                &format!(
                    "CREATE TABLE ingest_job_status_types ({pk_name} INTEGER PRIMARY KEY, type_name TEXT NOT NULL UNIQUE)",
                    pk_name = "ingest_job_status_type_id"
                ),
            )
            .await?;
        }

        Ok(())
    })
}
