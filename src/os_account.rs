//! OS-account realms, accounts, per-data-source instances and attributes
//! (§6.1 `tsk_os_account_realms`, `tsk_os_accounts`,
//! `tsk_os_account_instances`, `tsk_os_account_attributes`).
//!
//! Grounded on `crate::blackboard`'s attribute insert/merge logic
//! (`insert_attribute`, `find_matching_attribute`) — OS-account attributes
//! use the identical five-column value model and the identical
//! source-merge rule, just on a different owning table — and on
//! `crate::host::get_or_add_host` for the realm-by-unique-key lookup
//! pattern.

use crate::attributes::{merge_source, AttributeValue};
use crate::backend::Backend;
use crate::domain::content::OsAccountRef;
use crate::domain::ObjectType;
use crate::error::Result;
use crate::objects::add_object;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RealmScope {
    Unknown,
    Local,
    Domain,
}

impl RealmScope {
    fn db_code(self) -> i32 {
        match self {
            RealmScope::Unknown => 0,
            RealmScope::Local => 1,
            RealmScope::Domain => 2,
        }
    }

    fn from_db(v: i32) -> Option<Self> {
        match v {
            0 => Some(RealmScope::Unknown),
            1 => Some(RealmScope::Local),
            2 => Some(RealmScope::Domain),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    Active,
    Disabled,
    Deleted,
}

impl AccountStatus {
    fn db_code(self) -> i32 {
        match self {
            AccountStatus::Active => 0,
            AccountStatus::Disabled => 1,
            AccountStatus::Deleted => 2,
        }
    }

    fn from_db(v: i32) -> Option<Self> {
        match v {
            0 => Some(AccountStatus::Active),
            1 => Some(AccountStatus::Disabled),
            2 => Some(AccountStatus::Deleted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceType {
    Launched,
    Referenced,
}

impl InstanceType {
    fn db_code(self) -> i32 {
        match self {
            InstanceType::Launched => 0,
            InstanceType::Referenced => 1,
        }
    }
}

pub struct NewRealm {
    pub realm_name: Option<String>,
    pub realm_addr: Option<String>,
    pub host_id: Option<i64>,
    pub scope: RealmScope,
}

#[derive(Debug, Clone)]
pub struct OsAccountRealm {
    pub id: i64,
    pub realm_name: Option<String>,
    pub realm_addr: Option<String>,
    pub host_id: Option<i64>,
    pub scope: RealmScope,
}

pub async fn add_realm(backend: &Backend, new: NewRealm) -> Result<OsAccountRealm> {
    let scope_code = new.scope.db_code();
    let id = match backend {
        Backend::Sqlite(pool) => {
            sqlx::query("INSERT INTO tsk_os_account_realms (realm_name, realm_addr, host_id, scope) VALUES (?, ?, ?, ?)")
                .bind(&new.realm_name)
                .bind(&new.realm_addr)
                .bind(new.host_id)
                .bind(scope_code)
                .execute(pool)
                .await?
                .last_insert_rowid()
        }
        Backend::Postgres(pool) => {
            let row: (i64,) = sqlx::query_as(
                "INSERT INTO tsk_os_account_realms (realm_name, realm_addr, host_id, scope) VALUES ($1, $2, $3, $4) RETURNING id",
            )
            .bind(&new.realm_name)
            .bind(&new.realm_addr)
            .bind(new.host_id)
            .bind(scope_code)
            .fetch_one(pool)
            .await?;
            row.0
        }
    };
    Ok(OsAccountRealm { id, realm_name: new.realm_name, realm_addr: new.realm_addr, host_id: new.host_id, scope: new.scope })
}

#[derive(Debug, Clone)]
pub struct OsAccount {
    pub os_account_obj_id: i64,
    pub realm_id: Option<i64>,
    pub login_name: Option<String>,
    pub full_name: Option<String>,
    pub addr: Option<String>,
    pub signature: String,
    pub status: AccountStatus,
}

/// Get-or-add keyed on `(realm_id, signature)` — the unique constraint
/// the schema enforces (§6.1). `signature` is the caller's stable
/// per-realm identity string (SID, UID, or a login name when neither is
/// available).
pub async fn get_or_add_os_account(
    backend: &Backend,
    realm_id: Option<i64>,
    signature: &str,
    login_name: Option<&str>,
    full_name: Option<&str>,
    addr: Option<&str>,
) -> Result<(OsAccountRef, bool)> {
    if let Some(existing) = find_os_account(backend, realm_id, signature).await? {
        return Ok((OsAccountRef { obj_id: existing.os_account_obj_id }, false));
    }
    let obj_id = add_object(backend, None, ObjectType::OsAccount, None).await?;
    match backend {
        Backend::Sqlite(pool) => {
            sqlx::query(
                "INSERT INTO tsk_os_accounts (os_account_obj_id, realm_id, login_name, full_name, addr, signature, status) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(obj_id)
            .bind(realm_id)
            .bind(login_name)
            .bind(full_name)
            .bind(addr)
            .bind(signature)
            .bind(AccountStatus::Active.db_code())
            .execute(pool)
            .await?;
        }
        Backend::Postgres(pool) => {
            sqlx::query(
                "INSERT INTO tsk_os_accounts (os_account_obj_id, realm_id, login_name, full_name, addr, signature, status) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(obj_id)
            .bind(realm_id)
            .bind(login_name)
            .bind(full_name)
            .bind(addr)
            .bind(signature)
            .bind(AccountStatus::Active.db_code())
            .execute(pool)
            .await?;
        }
    }
    Ok((OsAccountRef { obj_id }, true))
}

async fn find_os_account(backend: &Backend, realm_id: Option<i64>, signature: &str) -> Result<Option<OsAccount>> {
    let row: Option<(i64, Option<i64>, Option<String>, Option<String>, Option<String>, String, i32)> = match backend {
        Backend::Sqlite(pool) => {
            sqlx::query_as(
                "SELECT os_account_obj_id, realm_id, login_name, full_name, addr, signature, status \
                 FROM tsk_os_accounts WHERE realm_id IS ? AND signature = ?",
            )
            .bind(realm_id)
            .bind(signature)
            .fetch_optional(pool)
            .await?
        }
        Backend::Postgres(pool) => {
            sqlx::query_as(
                "SELECT os_account_obj_id, realm_id, login_name, full_name, addr, signature, status \
                 FROM tsk_os_accounts WHERE realm_id IS NOT DISTINCT FROM $1 AND signature = $2",
            )
            .bind(realm_id)
            .bind(signature)
            .fetch_optional(pool)
            .await?
        }
    };
    row.map(|(os_account_obj_id, realm_id, login_name, full_name, addr, signature, status)| {
        let status = AccountStatus::from_db(status)
            .ok_or_else(|| crate::error::SkcdError::SchemaCorrupt(format!("unknown os-account status code {status}")))?;
        Ok(OsAccount { os_account_obj_id, realm_id, login_name, full_name, addr, signature, status })
    })
    .transpose()
}

/// Record that `os_account_obj_id` was observed on `data_source_obj_id`,
/// idempotently — the unique `(os_account_obj_id, data_source_obj_id,
/// instance_type)` index means a repeat observation is a no-op (§6.1,
/// "9.1 → 9.2: expand the uniqueness constraint ... to include
/// instance_type").
pub async fn add_os_account_instance(
    backend: &Backend,
    os_account_obj_id: i64,
    data_source_obj_id: i64,
    instance_type: InstanceType,
) -> Result<()> {
    match backend {
        Backend::Sqlite(pool) => {
            sqlx::query(
                "INSERT OR IGNORE INTO tsk_os_account_instances (os_account_obj_id, data_source_obj_id, instance_type) \
                 VALUES (?, ?, ?)",
            )
            .bind(os_account_obj_id)
            .bind(data_source_obj_id)
            .bind(instance_type.db_code())
            .execute(pool)
            .await?;
        }
        Backend::Postgres(pool) => {
            sqlx::query(
                "INSERT INTO tsk_os_account_instances (os_account_obj_id, data_source_obj_id, instance_type) \
                 VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
            )
            .bind(os_account_obj_id)
            .bind(data_source_obj_id)
            .bind(instance_type.db_code())
            .execute(pool)
            .await?;
        }
    }
    Ok(())
}

pub async fn insert_os_account_attribute(
    backend: &Backend,
    os_account_obj_id: i64,
    attribute_type_id: i64,
    source: Option<&str>,
    data_source_obj_id: Option<i64>,
    host_id: Option<i64>,
    value: AttributeValue,
) -> Result<()> {
    if let Some((existing_source, existing_value)) =
        find_matching_attribute(backend, os_account_obj_id, attribute_type_id, value.value_type_code()).await?
    {
        if existing_value.matches(&value) {
            if let Some(new_source) = source {
                let merged = merge_source(existing_source.as_deref(), new_source);
                update_attribute_source(backend, os_account_obj_id, attribute_type_id, &merged).await?;
            }
            return Ok(());
        }
    }

    let (byte, text, int32, int64, double) = value.columns();
    let value_type = value.value_type_code();
    match backend {
        Backend::Sqlite(pool) => {
            sqlx::query(
                "INSERT INTO tsk_os_account_attributes \
                 (os_account_obj_id, source, attribute_type_id, value_type, value_byte, value_text, value_int32, value_int64, value_double, data_source_obj_id, host_id) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(os_account_obj_id)
            .bind(source)
            .bind(attribute_type_id)
            .bind(value_type)
            .bind(byte)
            .bind(text)
            .bind(int32)
            .bind(int64)
            .bind(double)
            .bind(data_source_obj_id)
            .bind(host_id)
            .execute(pool)
            .await?;
        }
        Backend::Postgres(pool) => {
            sqlx::query(
                "INSERT INTO tsk_os_account_attributes \
                 (os_account_obj_id, source, attribute_type_id, value_type, value_byte, value_text, value_int32, value_int64, value_double, data_source_obj_id, host_id) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            )
            .bind(os_account_obj_id)
            .bind(source)
            .bind(attribute_type_id)
            .bind(value_type)
            .bind(byte)
            .bind(text)
            .bind(int32)
            .bind(int64)
            .bind(double)
            .bind(data_source_obj_id)
            .bind(host_id)
            .execute(pool)
            .await?;
        }
    }
    Ok(())
}

async fn find_matching_attribute(
    backend: &Backend,
    os_account_obj_id: i64,
    attribute_type_id: i64,
    value_type: i32,
) -> Result<Option<(Option<String>, AttributeValue)>> {
    let row: Option<(Option<String>, Option<Vec<u8>>, Option<String>, Option<i32>, Option<i64>, Option<f64>)> = match backend {
        Backend::Sqlite(pool) => {
            sqlx::query_as(
                "SELECT source, value_byte, value_text, value_int32, value_int64, value_double \
                 FROM tsk_os_account_attributes WHERE os_account_obj_id = ? AND attribute_type_id = ? AND value_type = ?",
            )
            .bind(os_account_obj_id)
            .bind(attribute_type_id)
            .bind(value_type)
            .fetch_optional(pool)
            .await?
        }
        Backend::Postgres(pool) => {
            sqlx::query_as(
                "SELECT source, value_byte, value_text, value_int32, value_int64, value_double \
                 FROM tsk_os_account_attributes WHERE os_account_obj_id = $1 AND attribute_type_id = $2 AND value_type = $3",
            )
            .bind(os_account_obj_id)
            .bind(attribute_type_id)
            .bind(value_type)
            .fetch_optional(pool)
            .await?
        }
    };
    Ok(row.and_then(|(source, byte, text, int32, int64, double)| {
        reconstruct_value(value_type, byte, text, int32, int64, double).map(|value| (source, value))
    }))
}

fn reconstruct_value(
    value_type: i32,
    byte: Option<Vec<u8>>,
    text: Option<String>,
    int32: Option<i32>,
    int64: Option<i64>,
    double: Option<f64>,
) -> Option<AttributeValue> {
    match value_type {
        1 => int32.map(AttributeValue::Int32),
        2 => int64.map(AttributeValue::Int64),
        3 => text.map(AttributeValue::String),
        4 => byte.map(AttributeValue::Byte),
        5 => double.map(AttributeValue::Double),
        6 => int64.map(AttributeValue::DateTime),
        7 => text.and_then(|t| serde_json::from_str(&t).ok()).map(AttributeValue::Json),
        _ => None,
    }
}

async fn update_attribute_source(
    backend: &Backend,
    os_account_obj_id: i64,
    attribute_type_id: i64,
    merged_source: &str,
) -> Result<()> {
    match backend {
        Backend::Sqlite(pool) => {
            sqlx::query("UPDATE tsk_os_account_attributes SET source = ? WHERE os_account_obj_id = ? AND attribute_type_id = ?")
                .bind(merged_source)
                .bind(os_account_obj_id)
                .bind(attribute_type_id)
                .execute(pool)
                .await?;
        }
        Backend::Postgres(pool) => {
            sqlx::query("UPDATE tsk_os_account_attributes SET source = $1 WHERE os_account_obj_id = $2 AND attribute_type_id = $3")
                .bind(merged_source)
                .bind(os_account_obj_id)
                .bind(attribute_type_id)
                .execute(pool)
                .await?;
        }
    }
    Ok(())
}

/// Merge `source_obj_id` into `destination_obj_id`: repoints the source's
/// data-source instances onto the destination account and marks the
/// source deleted. Callers register the `OsAccountMerged` deferred event
/// themselves once this returns successfully, mirroring how
/// `crate::blackboard::delete_analysis_result` leaves deferred-event
/// registration to its transaction-aware caller.
pub async fn merge_accounts(backend: &Backend, source_obj_id: i64, destination_obj_id: i64) -> Result<()> {
    // The unique (os_account_obj_id, data_source_obj_id, instance_type)
    // index means a straight re-point can collide with an instance the
    // destination already has on the same data source; re-insert under
    // the destination id with conflicts ignored instead of updating in
    // place, then drop the source's now-redundant rows.
    match backend {
        Backend::Sqlite(pool) => {
            sqlx::query(
                "INSERT OR IGNORE INTO tsk_os_account_instances (os_account_obj_id, data_source_obj_id, instance_type) \
                 SELECT ?, data_source_obj_id, instance_type FROM tsk_os_account_instances WHERE os_account_obj_id = ?",
            )
            .bind(destination_obj_id)
            .bind(source_obj_id)
            .execute(pool)
            .await?;
            sqlx::query("DELETE FROM tsk_os_account_instances WHERE os_account_obj_id = ?")
                .bind(source_obj_id)
                .execute(pool)
                .await?;
            sqlx::query("UPDATE tsk_os_accounts SET status = ? WHERE os_account_obj_id = ?")
                .bind(AccountStatus::Deleted.db_code())
                .bind(source_obj_id)
                .execute(pool)
                .await?;
        }
        Backend::Postgres(pool) => {
            sqlx::query(
                "INSERT INTO tsk_os_account_instances (os_account_obj_id, data_source_obj_id, instance_type) \
                 SELECT $1, data_source_obj_id, instance_type FROM tsk_os_account_instances WHERE os_account_obj_id = $2 \
                 ON CONFLICT DO NOTHING",
            )
            .bind(destination_obj_id)
            .bind(source_obj_id)
            .execute(pool)
            .await?;
            sqlx::query("DELETE FROM tsk_os_account_instances WHERE os_account_obj_id = $1")
                .bind(source_obj_id)
                .execute(pool)
                .await?;
            sqlx::query("UPDATE tsk_os_accounts SET status = $1 WHERE os_account_obj_id = $2")
                .bind(AccountStatus::Deleted.db_code())
                .bind(source_obj_id)
                .execute(pool)
                .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn realm_scope_round_trips() {
        for scope in [RealmScope::Unknown, RealmScope::Local, RealmScope::Domain] {
            assert_eq!(RealmScope::from_db(scope.db_code()), Some(scope));
        }
    }

    #[test]
    fn account_status_round_trips() {
        for status in [AccountStatus::Active, AccountStatus::Disabled, AccountStatus::Deleted] {
            assert_eq!(AccountStatus::from_db(status.db_code()), Some(status));
        }
    }

    #[test]
    fn reconstruct_value_matches_value_type_dispatch() {
        let v = reconstruct_value(1, None, None, Some(7), None, None).unwrap();
        assert!(matches!(v, AttributeValue::Int32(7)));
        assert!(reconstruct_value(1, None, None, None, None, None).is_none());
    }
}
