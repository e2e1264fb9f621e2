//! 9.5 → 9.6: add an index on `(data_source_obj_id, md5, size)` restricted
//! to `md5 is not null and size > 0` — a partial index on the networked
//! backend, a full index on the embedded backend, which (per case files
//! created against pre-3.x SQLite builds) may lack partial-index support
//! (§9 "Schema engine and DDL portability").

use super::exec;
use crate::backend::{Backend, BackendKind, DdlDialect};
use crate::error::Result;
use futures::future::BoxFuture;

const INDEX_NAME: &str = "tsk_files_data_source_obj_id";

pub fn run<'a>(backend: &'a Backend, kind: BackendKind) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        if index_exists(backend, INDEX_NAME).await? {
            return Ok(());
        }
        let sql = if kind.supports_partial_index() {
            format!(
                "CREATE INDEX {INDEX_NAME} ON tsk_files(data_source_obj_id, md5, size) \
                 WHERE md5 IS NOT NULL AND size > 0"
            )
        } else {
            format!("CREATE INDEX {INDEX_NAME} ON tsk_files(data_source_obj_id, md5, size)")
        };
        exec(backend, &sql).await?;
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
