//! 8.6 → 9.0: add the analysis-result side-table, aggregate-score table,
//! `tsk_file_attributes`, hosts, persons, OS-account realms/accounts/
//! instances/attributes, data-artifacts, host-addresses + DNS/IP/usage
//! maps; seed hosts by device-id.

use super::{exec, table_exists};
use crate::backend::{Backend, BackendKind, DdlDialect};
use crate::error::Result;
use futures::future::BoxFuture;

pub fn run<'a>(backend: &'a Backend, kind: BackendKind) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let bigint = kind.bigint();
        let pk = kind.autoincrement_pk();
        let blob = kind.blob();

        if !table_exists(backend, "tsk_analysis_results").await? {
            exec(
                backend,
                &format!(
                    "CREATE TABLE tsk_analysis_results (\
                        artifact_obj_id {bigint} PRIMARY KEY, conclusion TEXT, \
                        significance {bigint} NOT NULL, method_category {bigint} NOT NULL, \
                        configuration TEXT, justification TEXT, ignore_score {bigint} DEFAULT 0, \
                        FOREIGN KEY(artifact_obj_id) REFERENCES blackboard_artifacts(artifact_obj_id))"
                ),
            )
            .await?;
        }

        if !table_exists(backend, "tsk_aggregate_score").await? {
            exec(
                backend,
                &format!(
                    "CREATE TABLE tsk_aggregate_score (\
                        obj_id {bigint} PRIMARY KEY, data_source_obj_id {bigint}, \
                        significance {bigint} NOT NULL, priority {bigint} NOT NULL, \
                        FOREIGN KEY(obj_id) REFERENCES tsk_objects(obj_id))"
                ),
            )
            .await?;
            exec(
                backend,
                "CREATE INDEX tsk_aggregate_score_data_source ON tsk_aggregate_score(data_source_obj_id)",
            )
            .await?;
        }

        if !table_exists(backend, "tsk_data_artifacts").await? {
            exec(
                backend,
                &format!(
                    "CREATE TABLE tsk_data_artifacts (\
                        artifact_obj_id {bigint} PRIMARY KEY, os_account_obj_id {bigint}, \
                        FOREIGN KEY(artifact_obj_id) REFERENCES blackboard_artifacts(artifact_obj_id))"
                ),
            )
            .await?;
        }

        if !table_exists(backend, "tsk_file_attributes").await? {
            exec(
                backend,
                &format!(
                    "CREATE TABLE tsk_file_attributes (\
                        id {pk}, obj_id {bigint} NOT NULL, attribute_type_id {bigint} NOT NULL, \
                        value_type {bigint} NOT NULL, value_byte {blob}, value_text TEXT, \
                        value_int32 {bigint}, value_int64 {bigint}, value_double DOUBLE PRECISION, \
                        FOREIGN KEY(obj_id) REFERENCES tsk_objects(obj_id))"
                ),
            )
            .await?;
            exec(
                backend,
                "CREATE INDEX tsk_file_attributes_obj_id ON tsk_file_attributes(obj_id)",
            )
            .await?;
        }

        if !table_exists(backend, "tsk_hosts").await? {
            exec(
                backend,
                &format!(
                    "CREATE TABLE tsk_hosts (\
                        host_id {pk}, name TEXT NOT NULL UNIQUE, merged_into {bigint}, \
                        FOREIGN KEY(merged_into) REFERENCES tsk_hosts(host_id))"
                ),
            )
            .await?;
        }

        if !table_exists(backend, "tsk_persons").await? {
            exec(
                backend,
                &format!("CREATE TABLE tsk_persons ({pk_col} {pk}, name TEXT NOT NULL)", pk_col = "person_id"),
            )
            .await?;
        }
        if !table_exists(backend, "tsk_person_host_map").await? {
            exec(
                backend,
                &format!(
                    "CREATE TABLE tsk_person_host_map (\
                        person_id {bigint} NOT NULL, host_id {bigint} NOT NULL, \
                        FOREIGN KEY(person_id) REFERENCES tsk_persons(person_id), \
                        FOREIGN KEY(host_id) REFERENCES tsk_hosts(host_id))"
                ),
            )
            .await?;
        }

        if !table_exists(backend, "tsk_host_addresses").await? {
            exec(
                backend,
                &format!(
                    "CREATE TABLE tsk_host_addresses (\
                        id {pk}, address_type {bigint} NOT NULL, address TEXT NOT NULL)"
                ),
            )
            .await?;
            exec(
                backend,
                "CREATE UNIQUE INDEX tsk_host_addresses_unique ON tsk_host_addresses(address_type, address)",
            )
            .await?;
        }
        if !table_exists(backend, "tsk_host_address_map").await? {
            exec(
                backend,
                &format!(
                    "CREATE TABLE tsk_host_address_map (\
                        id {pk}, host_id {bigint} NOT NULL, addr_obj_id {bigint} NOT NULL, \
                        source_obj_id {bigint}, time {bigint}, \
                        FOREIGN KEY(host_id) REFERENCES tsk_hosts(host_id), \
                        FOREIGN KEY(addr_obj_id) REFERENCES tsk_host_addresses(id))"
                ),
            )
            .await?;
        }
        if !table_exists(backend, "tsk_host_address_dns_ip_map").await? {
            exec(
                backend,
                &format!(
                    "CREATE TABLE tsk_host_address_dns_ip_map (\
                        id {pk}, dns_address_id {bigint} NOT NULL, ip_address_id {bigint} NOT NULL, \
                        source_obj_id {bigint}, time {bigint}, \
                        FOREIGN KEY(dns_address_id) REFERENCES tsk_host_addresses(id), \
                        FOREIGN KEY(ip_address_id) REFERENCES tsk_host_addresses(id))"
                ),
            )
            .await?;
        }
        if !table_exists(backend, "tsk_host_address_usage").await? {
            exec(
                backend,
                &format!(
                    "CREATE TABLE tsk_host_address_usage (\
                        id {pk}, addr_obj_id {bigint} NOT NULL, obj_id {bigint} NOT NULL, \
                        FOREIGN KEY(addr_obj_id) REFERENCES tsk_host_addresses(id), \
                        FOREIGN KEY(obj_id) REFERENCES tsk_objects(obj_id))"
                ),
            )
            .await?;
        }

        if !table_exists(backend, "tsk_os_account_realms").await? {
            exec(
                backend,
                &format!(
                    "CREATE TABLE tsk_os_account_realms (\
                        id {pk}, realm_name TEXT, realm_addr TEXT, host_id {bigint}, scope {bigint} NOT NULL, \
                        FOREIGN KEY(host_id) REFERENCES tsk_hosts(host_id))"
                ),
            )
            .await?;
        }
        if !table_exists(backend, "tsk_os_accounts").await? {
            exec(
                backend,
                &format!(
                    "CREATE TABLE tsk_os_accounts (\
                        os_account_obj_id {bigint} PRIMARY KEY, realm_id {bigint}, login_name TEXT, \
                        full_name TEXT, addr TEXT, signature TEXT NOT NULL, status {bigint} NOT NULL, \
                        FOREIGN KEY(os_account_obj_id) REFERENCES tsk_objects(obj_id), \
                        FOREIGN KEY(realm_id) REFERENCES tsk_os_account_realms(id))"
                ),
            )
            .await?;
            exec(
                backend,
                "CREATE UNIQUE INDEX tsk_os_accounts_signature ON tsk_os_accounts(realm_id, signature)",
            )
            .await?;
        }
        if !table_exists(backend, "tsk_os_account_instances").await? {
            exec(
                backend,
                &format!(
                    "CREATE TABLE tsk_os_account_instances (\
                        id {pk}, os_account_obj_id {bigint} NOT NULL, data_source_obj_id {bigint} NOT NULL, \
                        instance_type {bigint} NOT NULL, \
                        FOREIGN KEY(os_account_obj_id) REFERENCES tsk_os_accounts(os_account_obj_id))"
                ),
            )
            .await?;
            exec(
                backend,
                "CREATE UNIQUE INDEX tsk_os_account_instances_unique ON tsk_os_account_instances(os_account_obj_id, data_source_obj_id)",
            )
            .await?;
        }
        if !table_exists(backend, "tsk_os_account_attributes").await? {
            exec(
                backend,
                &format!(
                    "CREATE TABLE tsk_os_account_attributes (\
                        id {pk}, os_account_obj_id {bigint} NOT NULL, source TEXT, attribute_type_id {bigint} NOT NULL, \
                        value_type {bigint} NOT NULL, value_byte {blob}, value_text TEXT, \
                        value_int32 {bigint}, value_int64 {bigint}, value_double DOUBLE PRECISION, \
                        data_source_obj_id {bigint}, host_id {bigint}, \
                        FOREIGN KEY(os_account_obj_id) REFERENCES tsk_os_accounts(os_account_obj_id))"
                ),
            )
            .await?;
        }

        seed_hosts_by_device_id(backend).await?;

        Ok(())
    })
}

/// Pre-9.0 installs identify a data source only by `device_id`; seed one
/// host row per distinct device-id so existing data sources gain a host
/// without the operator re-running ingest.
async fn seed_hosts_by_device_id(backend: &Backend) -> Result<()> {
    if !table_exists(backend, "data_source_info").await? {
        return Ok(());
    }
    let device_ids: Vec<String> = match backend {
        Backend::Sqlite(pool) => {
            sqlx::query_scalar("SELECT DISTINCT device_id FROM data_source_info")
                .fetch_all(pool)
                .await?
        }
        Backend::Postgres(pool) => {
            sqlx::query_scalar("SELECT DISTINCT device_id FROM data_source_info")
                .fetch_all(pool)
                .await?
        }
    };
    for device_id in device_ids {
        match backend {
            Backend::Sqlite(pool) => {
                sqlx::query("INSERT OR IGNORE INTO tsk_hosts (name) VALUES (?)")
                    .bind(&device_id)
                    .execute(pool)
                    .await?;
            }
            Backend::Postgres(pool) => {
                sqlx::query("INSERT INTO tsk_hosts (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
                    .bind(&device_id)
                    .execute(pool)
                    .await?;
            }
        }
    }
    Ok(())
}
