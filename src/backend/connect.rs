//! Connection URL construction and pool setup (§6.2), generalized from the
//! teacher's `Database::create`/`Database::open` (SQLite-only, hard-coded
//! PRAGMAs) into a dual-backend constructor.

use super::{classify::classify_sqlstate, Backend, ConnectError};
use crate::config::{BackendDescriptor, PoolConfig};
use crate::error::{Result, SkcdError};
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Build the reachability-probe URL (`.../postgres`) and the case URL
/// (`.../<db-name>`, URL-encoded) described in §6.2, and the three SSL
/// suffixes (verify-default, non-verify, custom-class).
fn postgres_url(
    host: &str,
    port: &str,
    username: &str,
    password: &str,
    database: &str,
    ssl_enabled: bool,
    ssl_verify: bool,
    ssl_custom_class: &Option<String>,
) -> String {
    let db = urlencoding_minimal(database);
    let scheme = "postgresql";
    let mut url = format!("{scheme}://{username}:{password}@{host}:{port}/{db}");
    if ssl_enabled {
        if let Some(class) = ssl_custom_class {
            url.push_str(&format!("?sslmode=verify-full&sslfactory={class}"));
        } else if ssl_verify {
            url.push_str("?sslmode=verify-full");
        } else {
            url.push_str("?sslmode=require");
        }
    }
    url
}

/// Percent-encode the handful of characters that matter in a database name
/// within a connection URL path segment; full RFC 3986 encoding is
/// unnecessary here since case/database names are analyst-chosen strings,
/// not untrusted input from outside the case.
fn urlencoding_minimal(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            ' ' => "%20".to_string(),
            '/' => "%2F".to_string(),
            other => other.to_string(),
        })
        .collect()
}

/// §5: reachability probe against `.../postgres` before attempting the real
/// case connection, used by callers that want an early, specific diagnosis.
pub async fn reachability_probe(
    host: &str,
    port: &str,
    username: &str,
    password: &str,
    ssl_enabled: bool,
) -> Result<()> {
    let url = postgres_url(
        host, port, username, password, "postgres", ssl_enabled, false, &None,
    );
    match sqlx::postgres::PgConnectOptions::from_str(&url) {
        Ok(opts) => {
            use sqlx::Connection;
            let mut conn = sqlx::postgres::PgConnection::connect_with(&opts)
                .await
                .map_err(|e| classify_connect_failure(&e, host, port, ssl_enabled))?;
            conn.close().await.ok();
            Ok(())
        }
        Err(e) => Err(SkcdError::Other(format!("invalid connection URL: {e}"))),
    }
}

fn classify_connect_failure(
    err: &sqlx::Error,
    host: &str,
    port: &str,
    ssl_enabled: bool,
) -> SkcdError {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            let kind = classify_sqlstate(&code, ssl_enabled);
            return kind.into_skcd_error(db_err.message().to_string());
        }
    }
    // No SQLState at all: refine with the TCP probe the way §6.3 describes.
    if !super::classify::tcp_reachable(host, port) {
        return ConnectError::Unreachable.into_skcd_error(err.to_string());
    }
    SkcdError::ConnectionUnknown(err.to_string())
}

/// Open (and migrate-ready, but not migrate) a case backend per its
/// descriptor. PRAGMA tuning for SQLite mirrors the teacher's
/// `Database::create`/`open`.
pub async fn connect(desc: &BackendDescriptor, pool_cfg: &PoolConfig) -> Result<Backend> {
    desc.validate()?;
    match desc {
        BackendDescriptor::Embedded { path } => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let opts = SqliteConnectOptions::from_str(&format!(
                "sqlite://{}?mode=rwc",
                path.display()
            ))
            .map_err(|e| SkcdError::Other(e.to_string()))?
            .busy_timeout(Duration::from_secs(5))
            .disable_statement_logging();

            let pool = SqlitePoolOptions::new()
                .min_connections(pool_cfg.min_connections)
                .max_connections(pool_cfg.max_connections)
                .connect_with(opts)
                .await?;

            for pragma in [
                "PRAGMA journal_mode=WAL",
                "PRAGMA synchronous=NORMAL",
                "PRAGMA foreign_keys=ON",
                "PRAGMA temp_store=MEMORY",
            ] {
                sqlx::query(pragma).execute(&pool).await?;
            }

            info!(path = %path.display(), "opened embedded case");
            Ok(Backend::Sqlite(pool))
        }
        BackendDescriptor::Networked {
            host,
            port,
            database,
            username,
            password,
            ssl_enabled,
            ssl_verify,
            ssl_custom_class,
        } => {
            let url = postgres_url(
                host,
                port,
                username,
                password,
                database,
                *ssl_enabled,
                *ssl_verify,
                ssl_custom_class,
            );
            let pool = PgPoolOptions::new()
                .min_connections(pool_cfg.min_connections)
                .max_connections(pool_cfg.max_connections)
                .connect(&url)
                .await
                .map_err(|e| classify_connect_failure(&e, host, port, *ssl_enabled))?;

            info!(host = %host, port = %port, database = %database, "opened networked case");
            Ok(Backend::Postgres(pool))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgres_url_shapes_ssl_suffixes() {
        let plain = postgres_url("h", "5432", "u", "p", "db", false, false, &None);
        assert!(!plain.contains("sslmode"));

        let require = postgres_url("h", "5432", "u", "p", "db", true, false, &None);
        assert!(require.contains("sslmode=require"));

        let verify = postgres_url("h", "5432", "u", "p", "db", true, true, &None);
        assert!(verify.contains("sslmode=verify-full"));

        let custom = postgres_url(
            "h",
            "5432",
            "u",
            "p",
            "db",
            true,
            false,
            &Some("MyValidator".to_string()),
        );
        assert!(custom.contains("sslfactory=MyValidator"));
    }

    #[test]
    fn database_name_with_space_is_encoded() {
        let url = postgres_url("h", "5432", "u", "p", "my case", false, false, &None);
        assert!(url.ends_with("/my%20case"));
    }
}
