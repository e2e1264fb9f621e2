//! 6 → 7: add `extension` (indexed) and `artifact_obj_id`.

use super::{column_exists, exec};
use crate::backend::{Backend, BackendKind, DdlDialect};
use crate::domain::File;
use crate::error::Result;
use futures::future::BoxFuture;

pub fn run<'a>(backend: &'a Backend, kind: BackendKind) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        if !column_exists(backend, "tsk_files", "extension").await? {
            exec(backend, "ALTER TABLE tsk_files ADD COLUMN extension TEXT").await?;
            backfill_extensions(backend).await?;
            exec(backend, "CREATE INDEX tsk_files_extension ON tsk_files(extension)").await?;
        }

        if !column_exists(backend, "blackboard_artifacts", "artifact_obj_id").await? {
            exec(
                backend,
                &format!(
                    "ALTER TABLE blackboard_artifacts ADD COLUMN artifact_obj_id {bigint}",
                    bigint = kind.bigint()
                ),
            )
            .await?;
            exec(
                backend,
                "UPDATE blackboard_artifacts SET artifact_obj_id = obj_id WHERE artifact_obj_id IS NULL",
            )
            .await?;
        }

        Ok(())
    })
}

async fn backfill_extensions(backend: &Backend) -> Result<()> {
    match backend {
        Backend::Sqlite(pool) => {
            let rows: Vec<(i64, String)> = sqlx::query_as("SELECT obj_id, name FROM tsk_files").fetch_all(pool).await?;
            for (obj_id, name) in rows {
                let ext = File::extract_extension(&name);
                sqlx::query("UPDATE tsk_files SET extension = ? WHERE obj_id = ?")
                    .bind(ext)
                    .bind(obj_id)
                    .execute(pool)
                    .await?;
            }
        }
        Backend::Postgres(pool) => {
            let rows: Vec<(i64, String)> = sqlx::query_as("SELECT obj_id, name FROM tsk_files").fetch_all(pool).await?;
            for (obj_id, name) in rows {
                let ext = File::extract_extension(&name);
                sqlx::query("UPDATE tsk_files SET extension = $1 WHERE obj_id = $2")
                    .bind(ext)
                    .bind(obj_id)
                    .execute(pool)
                    .await?;
            }
        }
    }
    Ok(())
}
