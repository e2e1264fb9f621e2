//! 8.5 → 8.6: add `sha256` on `tsk_files`.

use super::{column_exists, exec};
use crate::backend::{Backend, BackendKind};
use crate::error::Result;
use futures::future::BoxFuture;

pub fn run<'a>(backend: &'a Backend, kind: BackendKind) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        if !column_exists(backend, "tsk_files", "sha256").await? {
            exec(backend, "ALTER TABLE tsk_files ADD COLUMN sha256 TEXT").await?;
        }
        let _ = kind;
        Ok(())
    })
}
