//! 5 → 6: bug-fix for installations that missed the 4→5 review-status
//! column; guarded by `IF NOT EXISTS` probes rather than re-run as a plain
//! `ALTER`, since some 5→6 installs already have it and some don't.

use super::{column_exists, exec};
use crate::backend::{Backend, BackendKind};
use crate::error::Result;
use futures::future::BoxFuture;

pub fn run<'a>(backend: &'a Backend, kind: BackendKind) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        if !column_exists(backend, "tsk_files", "review_status_id").await? {
            exec(
                backend,
                "ALTER TABLE tsk_files ADD COLUMN review_status_id INTEGER DEFAULT 2",
            )
            .await?;
        }
        let _ = kind;
        Ok(())
    })
}
