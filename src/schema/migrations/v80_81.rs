//! 8.0 → 8.1: add `tsk_examiners` + examiner-id foreign keys on tags.

use super::{column_exists, exec, table_exists};
use crate::backend::{Backend, BackendKind, DdlDialect};
use crate::error::Result;
use futures::future::BoxFuture;

pub fn run<'a>(backend: &'a Backend, kind: BackendKind) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let bigint = kind.bigint();

        if !table_exists(backend, "tsk_examiners").await? {
            exec(
                backend,
                &format!(
                    "CREATE TABLE tsk_examiners (examiner_id {pk}, login_name TEXT NOT NULL UNIQUE, display_name TEXT)",
                    pk = kind.autoincrement_pk()
                ),
            )
            .await?;
        }

        if !column_exists(backend, "content_tags", "examiner_id").await? {
            exec(
                backend,
                &format!(
                    "ALTER TABLE content_tags ADD COLUMN examiner_id {bigint} REFERENCES tsk_examiners(examiner_id)"
                ),
            )
            .await?;
        }
        if !column_exists(backend, "blackboard_artifact_tags", "examiner_id").await? {
            exec(
                backend,
                &format!(
                    "ALTER TABLE blackboard_artifact_tags ADD COLUMN examiner_id {bigint} REFERENCES tsk_examiners(examiner_id)"
                ),
            )
            .await?;
        }

        Ok(())
    })
}
