//! 9.0 → 9.1: rename `method_category → priority` on score tables
//! (drop-column on the networked backend, create-copy-rename on the
//! embedded one — §9 "Schema engine and DDL portability"); backfill
//! priority; make one artifact type analysis-result.

use super::{column_exists, exec, table_exists};
use crate::backend::{Backend, BackendKind};
use crate::error::Result;
use futures::future::BoxFuture;

pub fn run<'a>(backend: &'a Backend, kind: BackendKind) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        if column_exists(backend, "tsk_analysis_results", "method_category").await?
            && !column_exists(backend, "tsk_analysis_results", "priority").await?
        {
            rename_method_category(backend, kind).await?;
        }

        mark_one_artifact_type_analysis_result(backend).await?;

        Ok(())
    })
}

async fn rename_method_category(backend: &Backend, kind: BackendKind) -> Result<()> {
    match (backend, kind) {
        (Backend::Postgres(_), BackendKind::Networked) => {
            exec(
                backend,
                "ALTER TABLE tsk_analysis_results RENAME COLUMN method_category TO priority",
            )
            .await?;
        }
        (Backend::Sqlite(_), BackendKind::Embedded) => {
            exec(
                backend,
                "CREATE TABLE tsk_analysis_results_new (\
                    artifact_obj_id INTEGER PRIMARY KEY, conclusion TEXT, \
                    significance INTEGER NOT NULL, priority INTEGER NOT NULL, \
                    configuration TEXT, justification TEXT, ignore_score INTEGER DEFAULT 0)",
            )
            .await?;
            exec(
                backend,
                "INSERT INTO tsk_analysis_results_new \
                 (artifact_obj_id, conclusion, significance, priority, configuration, justification, ignore_score) \
                 SELECT artifact_obj_id, conclusion, significance, method_category, configuration, justification, ignore_score \
                 FROM tsk_analysis_results",
            )
            .await?;
            exec(backend, "DROP TABLE tsk_analysis_results").await?;
            exec(
                backend,
                "ALTER TABLE tsk_analysis_results_new RENAME TO tsk_analysis_results",
            )
            .await?;
        }
        _ => unreachable!("Backend/BackendKind pairing is always consistent"),
    }
    Ok(())
}

/// Earlier 9.0 builds registered `TSK_ANALYSIS_RESULT` only as a plain
/// artifact type with no `category_type` distinction; flip it to
/// analysis-result category now that the column exists everywhere.
async fn mark_one_artifact_type_analysis_result(backend: &Backend) -> Result<()> {
    if !table_exists(backend, "blackboard_artifact_types").await? {
        return Ok(());
    }
    if !column_exists(backend, "blackboard_artifact_types", "category_type").await? {
        exec(
            backend,
            "ALTER TABLE blackboard_artifact_types ADD COLUMN category_type INTEGER DEFAULT 0",
        )
        .await?;
    }
    match backend {
        Backend::Sqlite(pool) => {
            sqlx::query(
                "UPDATE blackboard_artifact_types SET category_type = 1 WHERE type_name = 'TSK_ANALYSIS_RESULT'",
            )
            .execute(pool)
            .await?;
        }
        Backend::Postgres(pool) => {
            sqlx::query(
                "UPDATE blackboard_artifact_types SET category_type = 1 WHERE type_name = 'TSK_ANALYSIS_RESULT'",
            )
            .execute(pool)
            .await?;
        }
    }
    Ok(())
}
