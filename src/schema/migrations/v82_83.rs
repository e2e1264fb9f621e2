//! 8.2 → 8.3: add uniqueness constraints on events; fix mis-named rows in
//! the extended-info table.

use super::{exec, table_exists};
use crate::backend::{Backend, BackendKind};
use crate::error::Result;
use futures::future::BoxFuture;

const EVENTS_UNIQUE_INDEX: &str = "tsk_events_unique";

pub fn run<'a>(backend: &'a Backend, kind: BackendKind) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        if !index_exists(backend, EVENTS_UNIQUE_INDEX).await? {
            exec(
                backend,
                &format!(
                    "CREATE UNIQUE INDEX {EVENTS_UNIQUE_INDEX} ON tsk_events(event_type_id, event_description_id, time)"
                ),
            )
            .await?;
        }

        // Earlier builds of the 8.1 → 8.2 step stamped the schema-minor-ver
        // row under the legacy `TSK_VER` spelling instead of
        // `SCHEMA_MINOR_VERSION`; rename any surviving rows in place.
        rename_minor_version_key(backend).await?;

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
            let row: (bool,) = sqlx::query_as(
                "SELECT EXISTS (SELECT 1 FROM pg_indexes WHERE indexname = $1)",
            )
            .bind(name)
            .fetch_one(pool)
            .await?;
            Ok(row.0)
        }
    }
}

async fn rename_minor_version_key(backend: &Backend) -> Result<()> {
    if !table_exists(backend, "tsk_db_info_extended").await? {
        return Ok(());
    }
    match backend {
        Backend::Sqlite(pool) => {
            sqlx::query(
                "UPDATE tsk_db_info_extended SET name = ? WHERE name = 'TSK_VER_MINOR'",
            )
            .bind(crate::schema::SCHEMA_MINOR_VERSION_KEY)
            .execute(pool)
            .await?;
        }
        Backend::Postgres(pool) => {
            sqlx::query(
                "UPDATE tsk_db_info_extended SET name = $1 WHERE name = 'TSK_VER_MINOR'",
            )
            .bind(crate::schema::SCHEMA_MINOR_VERSION_KEY)
            .execute(pool)
            .await?;
        }
    }
    Ok(())
}
