//! 9.3 → 9.4: add collected-status lookup and `collected` on `tsk_files`.

use super::{column_exists, exec, table_exists};
use crate::backend::{Backend, BackendKind};
use crate::error::Result;
use futures::future::BoxFuture;

pub fn run<'a>(backend: &'a Backend, kind: BackendKind) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        if !table_exists(backend, "file_collected_status_types").await? {
            exec(
                backend,
                "CREATE TABLE file_collected_status_types (collected_id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE)",
            )
            .await?;
            exec(
                backend,
                "INSERT INTO file_collected_status_types (collected_id, name) VALUES \
                 (0, 'UNKNOWN'), (1, 'YES'), (2, 'NO')",
            )
            .await?;
        }
        if !column_exists(backend, "tsk_files", "collected").await? {
            exec(backend, "ALTER TABLE tsk_files ADD COLUMN collected INTEGER DEFAULT 0").await?;
        }
        let _ = kind;
        Ok(())
    })
}
