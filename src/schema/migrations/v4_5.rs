//! 4 → 5: add `review_statuses`, `file_encoding_types`, `encoding_type` on
//! `tsk_files_path`.

use super::{column_exists, exec, table_exists};
use crate::backend::{Backend, BackendKind, DdlDialect};
use crate::error::Result;
use futures::future::BoxFuture;

pub fn run<'a>(backend: &'a Backend, kind: BackendKind) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        if !table_exists(backend, "review_statuses").await? {
            exec(
                backend,
                "CREATE TABLE review_statuses (review_status_id INTEGER PRIMARY KEY, \
                 review_status_name TEXT NOT NULL UNIQUE, display_name TEXT)",
            )
            .await?;
            exec(
                backend,
                "INSERT INTO review_statuses (review_status_id, review_status_name, display_name) VALUES \
                 (0, 'APPROVED', 'Approved'), (1, 'REJECTED', 'Rejected'), (2, 'UNDECIDED', 'Undecided')",
            )
            .await?;
        }

        if !table_exists(backend, "file_encoding_types").await? {
            exec(
                backend,
                "CREATE TABLE file_encoding_types (encoding_type_id INTEGER PRIMARY KEY, \
                 name TEXT NOT NULL UNIQUE)",
            )
            .await?;
            exec(
                backend,
                "INSERT INTO file_encoding_types (encoding_type_id, name) VALUES \
                 (0, 'NONE'), (1, 'XOR1')",
            )
            .await?;
        }

        if !column_exists(backend, "tsk_files_path", "encoding_type").await? {
            exec(
                backend,
                &format!(
                    "ALTER TABLE tsk_files_path ADD COLUMN encoding_type {bigint} DEFAULT 0",
                    bigint = kind.bigint()
                ),
            )
            .await?;
        }

        if !column_exists(backend, "tsk_files", "review_status_id").await? {
            exec(
                backend,
                "ALTER TABLE tsk_files ADD COLUMN review_status_id INTEGER DEFAULT 2",
            )
            .await?;
        }

        Ok(())
    })
}
