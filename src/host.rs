//! Hosts, persons and host addresses (§6.1 `tsk_hosts`, `tsk_persons`,
//! `tsk_person_host_map`, `tsk_host_addresses` + usage/DNS maps).
//!
//! Grounded on `crate::blackboard`'s get-or-add lookup pattern, generalized
//! from artifact types to hosts and addresses, both of which are looked up
//! by a unique natural key (`name` / `(address_type, address)`) before
//! falling back to an insert.

use crate::backend::Backend;
use crate::domain::content::HostAddressRef;
use crate::domain::ObjectType;
use crate::error::Result;
use crate::objects::add_object;

#[derive(Debug, Clone)]
pub struct Host {
    pub host_id: i64,
    pub name: String,
    pub merged_into: Option<i64>,
}

pub async fn get_or_add_host(backend: &Backend, name: &str) -> Result<Host> {
    if let Some(host) = find_host(backend, name).await? {
        return Ok(host);
    }
    let host_id = match backend {
        Backend::Sqlite(pool) => {
            sqlx::query("INSERT INTO tsk_hosts (name) VALUES (?)").bind(name).execute(pool).await?.last_insert_rowid()
        }
        Backend::Postgres(pool) => {
            let row: (i64,) =
                sqlx::query_as("INSERT INTO tsk_hosts (name) VALUES ($1) RETURNING host_id").bind(name).fetch_one(pool).await?;
            row.0
        }
    };
    Ok(Host { host_id, name: name.to_string(), merged_into: None })
}

async fn find_host(backend: &Backend, name: &str) -> Result<Option<Host>> {
    let row: Option<(i64, String, Option<i64>)> = match backend {
        Backend::Sqlite(pool) => {
            sqlx::query_as("SELECT host_id, name, merged_into FROM tsk_hosts WHERE name = ?").bind(name).fetch_optional(pool).await?
        }
        Backend::Postgres(pool) => {
            sqlx::query_as("SELECT host_id, name, merged_into FROM tsk_hosts WHERE name = $1").bind(name).fetch_optional(pool).await?
        }
    };
    Ok(row.map(|(host_id, name, merged_into)| Host { host_id, name, merged_into }))
}

/// Merge `source` into `destination`: every row is kept, `source` simply
/// points at `destination` through `merged_into` (mirrors the OS-account
/// merge model in `crate::os_account::merge_accounts`, applied one level
/// up at the host granularity).
pub async fn merge_hosts(backend: &Backend, source_host_id: i64, destination_host_id: i64) -> Result<()> {
    match backend {
        Backend::Sqlite(pool) => {
            sqlx::query("UPDATE tsk_hosts SET merged_into = ? WHERE host_id = ?")
                .bind(destination_host_id)
                .bind(source_host_id)
                .execute(pool)
                .await?;
        }
        Backend::Postgres(pool) => {
            sqlx::query("UPDATE tsk_hosts SET merged_into = $1 WHERE host_id = $2")
                .bind(destination_host_id)
                .bind(source_host_id)
                .execute(pool)
                .await?;
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostAddressType {
    Ipv4,
    Ipv6,
    Hostname,
    Dns,
}

impl HostAddressType {
    fn db_code(self) -> i32 {
        match self {
            HostAddressType::Ipv4 => 0,
            HostAddressType::Ipv6 => 1,
            HostAddressType::Hostname => 2,
            HostAddressType::Dns => 3,
        }
    }

    fn from_db(v: i32) -> Option<Self> {
        match v {
            0 => Some(HostAddressType::Ipv4),
            1 => Some(HostAddressType::Ipv6),
            2 => Some(HostAddressType::Hostname),
            3 => Some(HostAddressType::Dns),
            _ => None,
        }
    }
}

pub async fn get_or_add_host_address(backend: &Backend, address_type: HostAddressType, address: &str) -> Result<HostAddressRef> {
    let code = address_type.db_code();
    if let Some(obj_id) = find_host_address(backend, code, address).await? {
        return Ok(HostAddressRef { obj_id });
    }
    let obj_id = match backend {
        Backend::Sqlite(pool) => {
            sqlx::query("INSERT INTO tsk_host_addresses (address_type, address) VALUES (?, ?)")
                .bind(code)
                .bind(address)
                .execute(pool)
                .await?
                .last_insert_rowid()
        }
        Backend::Postgres(pool) => {
            let row: (i64,) = sqlx::query_as(
                "INSERT INTO tsk_host_addresses (address_type, address) VALUES ($1, $2) RETURNING id",
            )
            .bind(code)
            .bind(address)
            .fetch_one(pool)
            .await?;
            row.0
        }
    };
    Ok(HostAddressRef { obj_id })
}

async fn find_host_address(backend: &Backend, address_type: i32, address: &str) -> Result<Option<i64>> {
    match backend {
        Backend::Sqlite(pool) => Ok(sqlx::query_scalar(
            "SELECT id FROM tsk_host_addresses WHERE address_type = ? AND address = ?",
        )
        .bind(address_type)
        .bind(address)
        .fetch_optional(pool)
        .await?),
        Backend::Postgres(pool) => Ok(sqlx::query_scalar(
            "SELECT id FROM tsk_host_addresses WHERE address_type = $1 AND address = $2",
        )
        .bind(address_type)
        .bind(address)
        .fetch_optional(pool)
        .await?),
    }
}

/// Record that `host_id` used `addr_obj_id` at `time` (discovered via
/// `source_obj_id`, typically a data source or artifact).
pub async fn add_host_address_usage(
    backend: &Backend,
    host_id: i64,
    addr_obj_id: i64,
    source_obj_id: Option<i64>,
    time: Option<i64>,
) -> Result<()> {
    match backend {
        Backend::Sqlite(pool) => {
            sqlx::query("INSERT INTO tsk_host_address_map (host_id, addr_obj_id, source_obj_id, time) VALUES (?, ?, ?, ?)")
                .bind(host_id)
                .bind(addr_obj_id)
                .bind(source_obj_id)
                .bind(time)
                .execute(pool)
                .await?;
        }
        Backend::Postgres(pool) => {
            sqlx::query("INSERT INTO tsk_host_address_map (host_id, addr_obj_id, source_obj_id, time) VALUES ($1, $2, $3, $4)")
                .bind(host_id)
                .bind(addr_obj_id)
                .bind(source_obj_id)
                .bind(time)
                .execute(pool)
                .await?;
        }
    }
    Ok(())
}

/// `tsk_host_address_usage` ties an address to the object (file, artifact,
/// ...) that referenced it, independent of `tsk_host_address_map`'s
/// host-level bookkeeping.
pub async fn add_host_address_object_usage(backend: &Backend, addr_obj_id: i64, obj_id: i64) -> Result<()> {
    match backend {
        Backend::Sqlite(pool) => {
            sqlx::query("INSERT INTO tsk_host_address_usage (addr_obj_id, obj_id) VALUES (?, ?)")
                .bind(addr_obj_id)
                .bind(obj_id)
                .execute(pool)
                .await?;
        }
        Backend::Postgres(pool) => {
            sqlx::query("INSERT INTO tsk_host_address_usage (addr_obj_id, obj_id) VALUES ($1, $2)")
                .bind(addr_obj_id)
                .bind(obj_id)
                .execute(pool)
                .await?;
        }
    }
    Ok(())
}

/// Create the `tsk_objects` row for a new host address and return its
/// object id, ahead of `get_or_add_host_address` populating the detail row.
pub async fn new_host_address_object(backend: &Backend) -> Result<i64> {
    add_object(backend, None, ObjectType::HostAddress, None).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_type_round_trips_through_db_code() {
        for ty in [HostAddressType::Ipv4, HostAddressType::Ipv6, HostAddressType::Hostname, HostAddressType::Dns] {
            assert_eq!(HostAddressType::from_db(ty.db_code()), Some(ty));
        }
        assert_eq!(HostAddressType::from_db(99), None);
    }
}
