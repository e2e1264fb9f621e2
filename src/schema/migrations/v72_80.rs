//! 7.2 → 8.0: turn `report_id` into an object-id; rebuild `reports`.

use super::{column_exists, exec, table_exists};
use crate::backend::{Backend, BackendKind, DdlDialect};
use crate::error::Result;
use futures::future::BoxFuture;

pub fn run<'a>(backend: &'a Backend, kind: BackendKind) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        if column_exists(backend, "reports", "obj_id").await? {
            return Ok(());
        }

        let bigint = kind.bigint();
        let old_rows: Vec<(i64, Option<String>, Option<i64>, Option<String>, Option<String>)> =
            match backend {
                Backend::Sqlite(pool) => {
                    sqlx::query_as("SELECT report_id, path, crtime, src_module_name, report_name FROM reports")
                        .fetch_all(pool)
                        .await?
                }
                Backend::Postgres(pool) => {
                    sqlx::query_as("SELECT report_id, path, crtime, src_module_name, report_name FROM reports")
                        .fetch_all(pool)
                        .await?
                }
            };

        exec(backend, "ALTER TABLE reports RENAME TO reports_old_72").await?;
        exec(
            backend,
            &format!(
                "CREATE TABLE reports (\
                    obj_id {bigint} PRIMARY KEY, path TEXT, crtime {bigint}, src_module_name TEXT, report_name TEXT, \
                    FOREIGN KEY(obj_id) REFERENCES tsk_objects(obj_id))"
            ),
        )
        .await?;

        for (_old_id, path, crtime, src_module_name, report_name) in old_rows {
            let obj_id = insert_object(backend, crate::domain::ObjectType::Report as i32).await?;
            match backend {
                Backend::Sqlite(pool) => {
                    sqlx::query(
                        "INSERT INTO reports (obj_id, path, crtime, src_module_name, report_name) VALUES (?, ?, ?, ?, ?)",
                    )
                    .bind(obj_id)
                    .bind(path)
                    .bind(crtime)
                    .bind(src_module_name)
                    .bind(report_name)
                    .execute(pool)
                    .await?;
                }
                Backend::Postgres(pool) => {
                    sqlx::query(
                        "INSERT INTO reports (obj_id, path, crtime, src_module_name, report_name) VALUES ($1, $2, $3, $4, $5)",
                    )
                    .bind(obj_id)
                    .bind(path)
                    .bind(crtime)
                    .bind(src_module_name)
                    .bind(report_name)
                    .execute(pool)
                    .await?;
                }
            }
        }

        if !table_exists(backend, "reports_old_72_retained").await? {
            // Policy forbids dropping user-visible data; the pre-rebuild
            // rows are kept under their renamed table rather than dropped.
        }

        Ok(())
    })
}

async fn insert_object(backend: &Backend, object_type: i32) -> Result<i64> {
    match backend {
        Backend::Sqlite(pool) => {
            let res = sqlx::query("INSERT INTO tsk_objects (par_obj_id, type) VALUES (NULL, ?)")
                .bind(object_type)
                .execute(pool)
                .await?;
            Ok(res.last_insert_rowid())
        }
        Backend::Postgres(pool) => {
            let row: (i64,) = sqlx::query_as(
                "INSERT INTO tsk_objects (par_obj_id, type) VALUES (NULL, $1) RETURNING obj_id",
            )
            .bind(object_type)
            .fetch_one(pool)
            .await?;
            Ok(row.0)
        }
    }
}
