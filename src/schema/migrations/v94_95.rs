//! 9.4 → 9.5: add indices on OS-account login, address, realm name, realm
//! address.

use super::exec;
use crate::backend::{Backend, BackendKind};
use crate::error::Result;
use futures::future::BoxFuture;

const INDICES: &[(&str, &str)] = &[
    ("tsk_os_accounts_login_name", "CREATE INDEX tsk_os_accounts_login_name ON tsk_os_accounts(login_name)"),
    ("tsk_os_accounts_addr", "CREATE INDEX tsk_os_accounts_addr ON tsk_os_accounts(addr)"),
    (
        "tsk_os_account_realms_realm_name",
        "CREATE INDEX tsk_os_account_realms_realm_name ON tsk_os_account_realms(realm_name)",
    ),
    (
        "tsk_os_account_realms_realm_addr",
        "CREATE INDEX tsk_os_account_realms_realm_addr ON tsk_os_account_realms(realm_addr)",
    ),
];

pub fn run<'a>(backend: &'a Backend, kind: BackendKind) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        for (name, sql) in INDICES {
            if !index_exists(backend, name).await? {
                exec(backend, sql).await?;
            }
        }
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
