//! 7.1 → 7.2: add `data_source_obj_id` on `blackboard_artifacts`, backfill;
//! add account tables + indices.

use super::{column_exists, exec, table_exists};
use crate::backend::{Backend, BackendKind, DdlDialect};
use crate::error::Result;
use futures::future::BoxFuture;

pub fn run<'a>(backend: &'a Backend, kind: BackendKind) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let bigint = kind.bigint();

        if !column_exists(backend, "blackboard_artifacts", "data_source_obj_id").await? {
            exec(
                backend,
                &format!("ALTER TABLE blackboard_artifacts ADD COLUMN data_source_obj_id {bigint}"),
            )
            .await?;
            backfill_data_source(backend).await?;
        }

        if !table_exists(backend, "account_types").await? {
            exec(
                backend,
                &format!(
                    "CREATE TABLE account_types (account_type_id {pk}, type_name TEXT NOT NULL UNIQUE, display_name TEXT)",
                    pk = kind.autoincrement_pk()
                ),
            )
            .await?;
        }
        if !table_exists(backend, "accounts").await? {
            exec(
                backend,
                &format!(
                    "CREATE TABLE accounts (\
                        account_id {pk}, account_type_id {bigint} NOT NULL, account_unique_identifier TEXT NOT NULL, \
                        FOREIGN KEY(account_type_id) REFERENCES account_types(account_type_id))",
                    pk = kind.autoincrement_pk()
                ),
            )
            .await?;
            exec(
                backend,
                "CREATE INDEX accounts_type_identifier ON accounts(account_type_id, account_unique_identifier)",
            )
            .await?;
        }
        if !table_exists(backend, "account_relationships").await? {
            exec(
                backend,
                &format!(
                    "CREATE TABLE account_relationships (\
                        relationship_id {pk}, account1_id {bigint} NOT NULL, account2_id {bigint} NOT NULL, \
                        relationship_source_obj_id {bigint}, date_time {bigint}, relationship_type {bigint}, \
                        data_source_obj_id {bigint}, \
                        FOREIGN KEY(account1_id) REFERENCES accounts(account_id), \
                        FOREIGN KEY(account2_id) REFERENCES accounts(account_id))",
                    pk = kind.autoincrement_pk()
                ),
            )
            .await?;
            exec(
                backend,
                "CREATE INDEX account_relationships_account1 ON account_relationships(account1_id)",
            )
            .await?;
            exec(
                backend,
                "CREATE INDEX account_relationships_account2 ON account_relationships(account2_id)",
            )
            .await?;
        }

        Ok(())
    })
}

async fn backfill_data_source(backend: &Backend) -> Result<()> {
    // Each artifact's data source is the root ancestor of its own obj_id in
    // `tsk_objects`; walk the parent chain in application code rather than a
    // recursive CTE, since SQLite builds bundled with very old installs may
    // predate `WITH RECURSIVE` support.
    let pairs: Vec<(i64, i64)> = match backend {
        Backend::Sqlite(pool) => {
            sqlx::query_as("SELECT artifact_id, obj_id FROM blackboard_artifacts")
                .fetch_all(pool)
                .await?
        }
        Backend::Postgres(pool) => {
            sqlx::query_as("SELECT artifact_id, obj_id FROM blackboard_artifacts")
                .fetch_all(pool)
                .await?
        }
    };
    for (artifact_id, obj_id) in pairs {
        let root = find_root(backend, obj_id).await?;
        match backend {
            Backend::Sqlite(pool) => {
                sqlx::query("UPDATE blackboard_artifacts SET data_source_obj_id = ? WHERE artifact_id = ?")
                    .bind(root)
                    .bind(artifact_id)
                    .execute(pool)
                    .await?;
            }
            Backend::Postgres(pool) => {
                sqlx::query("UPDATE blackboard_artifacts SET data_source_obj_id = $1 WHERE artifact_id = $2")
                    .bind(root)
                    .bind(artifact_id)
                    .execute(pool)
                    .await?;
            }
        }
    }
    Ok(())
}

async fn find_root(backend: &Backend, mut obj_id: i64) -> Result<i64> {
    loop {
        let parent: Option<i64> = match backend {
            Backend::Sqlite(pool) => {
                sqlx::query_scalar::<_, Option<i64>>(
                    "SELECT par_obj_id FROM tsk_objects WHERE obj_id = ?",
                )
                .bind(obj_id)
                .fetch_optional(pool)
                .await?
                .flatten()
            }
            Backend::Postgres(pool) => {
                sqlx::query_scalar::<_, Option<i64>>(
                    "SELECT par_obj_id FROM tsk_objects WHERE obj_id = $1",
                )
                .bind(obj_id)
                .fetch_optional(pool)
                .await?
                .flatten()
            }
        };
        match parent {
            Some(p) => obj_id = p,
            None => return Ok(obj_id),
        }
    }
}
