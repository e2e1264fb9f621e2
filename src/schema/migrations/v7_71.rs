//! 7 → 7.1: add `schema_minor_ver`.

use super::{exec, table_exists};
use crate::backend::{Backend, BackendKind};
use crate::error::Result;
use futures::future::BoxFuture;

pub fn run<'a>(backend: &'a Backend, kind: BackendKind) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        if !table_exists(backend, "tsk_db_info_extended").await? {
            exec(
                backend,
                "CREATE TABLE tsk_db_info_extended (name TEXT NOT NULL UNIQUE, value_text TEXT)",
            )
            .await?;
        }
        let exists: bool = match backend {
            Backend::Sqlite(pool) => {
                sqlx::query_as::<_, (i64,)>(
                    "SELECT 1 FROM tsk_db_info_extended WHERE name = ?",
                )
                .bind(crate::schema::SCHEMA_MINOR_VERSION_KEY)
                .fetch_optional(pool)
                .await?
                .is_some()
            }
            Backend::Postgres(pool) => {
                sqlx::query_as::<_, (i64,)>(
                    "SELECT 1 FROM tsk_db_info_extended WHERE name = $1",
                )
                .bind(crate::schema::SCHEMA_MINOR_VERSION_KEY)
                .fetch_optional(pool)
                .await?
                .is_some()
            }
        };
        if !exists {
            exec(
                backend,
                &format!(
                    "INSERT INTO tsk_db_info_extended (name, value_text) VALUES ('{}', '0')",
                    crate::schema::SCHEMA_MINOR_VERSION_KEY
                ),
            )
            .await?;
        }
        let _ = kind;
        Ok(())
    })
}
