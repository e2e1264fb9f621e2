//! 9.1 → 9.2: expand the uniqueness constraint on
//! `tsk_os_account_instances` to include `instance_type`.

use super::exec;
use crate::backend::{Backend, BackendKind};
use crate::error::Result;
use futures::future::BoxFuture;

const OLD_INDEX: &str = "tsk_os_account_instances_unique";
const NEW_INDEX: &str = "tsk_os_account_instances_unique_v2";

pub fn run<'a>(backend: &'a Backend, kind: BackendKind) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        if index_exists(backend, NEW_INDEX).await? {
            return Ok(());
        }
        if index_exists(backend, OLD_INDEX).await? {
            exec(backend, &format!("DROP INDEX {OLD_INDEX}")).await?;
        }
        exec(
            backend,
            &format!(
                "CREATE UNIQUE INDEX {NEW_INDEX} ON tsk_os_account_instances(os_account_obj_id, data_source_obj_id, instance_type)"
            ),
        )
        .await?;
        let _ = kind;
        Ok(())
    })
}

async fn index_exists(backend: &Backend, name: &str) -> Result<bool> {
    match backend {
        Backend::Sqlite(pool) => {
            let row: Option<(i64,)> =
                sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type='index' AND name = ?")
                    .bind(name)
                    .fetch_optional(pool)
                    .await?;
            Ok(row.is_some())
        }
        Backend::Postgres(pool) => {
            let row: (bool,) =
                sqlx::query_as("SELECT EXISTS (SELECT 1 FROM pg_indexes WHERE indexname = $1)")
                    .bind(name)
                    .fetch_one(pool)
                    .await?;
            Ok(row.0)
        }
    }
}
