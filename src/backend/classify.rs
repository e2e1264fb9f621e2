//! §6.3: map a networked engine's `SQLState` into the typed connection
//! errors a caller/CLI can localize.

use crate::error::SkcdError;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    Rejected,
    Ssl,
    Unreachable,
    Auth,
    Privilege,
    Resource,
    Limit,
    Internal,
    Unknown,
}

/// Classify a PostgreSQL `SQLState` per the table in §6.3. `ssl_enabled`
/// disambiguates `08006`, which only means "certificate verification
/// failed" when SSL was requested — otherwise it is a plain unreachable
/// host, same as any other `08…` code.
pub fn classify_sqlstate(sqlstate: &str, ssl_enabled: bool) -> ConnectError {
    match sqlstate {
        "08004" => ConnectError::Rejected,
        "08006" if ssl_enabled => ConnectError::Ssl,
        s if s.starts_with("08") => ConnectError::Unreachable,
        s if s.starts_with("28") => ConnectError::Auth,
        s if s.starts_with("42") => ConnectError::Privilege,
        s if s.starts_with("53") => ConnectError::Resource,
        s if s.starts_with("54") => ConnectError::Limit,
        s if s.starts_with("xx") || s.starts_with("XX") => ConnectError::Internal,
        _ => ConnectError::Unknown,
    }
}

impl ConnectError {
    pub fn into_skcd_error(self, detail: impl Into<String>) -> SkcdError {
        let detail = detail.into();
        match self {
            ConnectError::Rejected => SkcdError::ConnectionRejected(detail),
            ConnectError::Ssl => SkcdError::ConnectionSsl(detail),
            ConnectError::Unreachable => SkcdError::ConnectionUnreachable(detail),
            ConnectError::Auth => SkcdError::ConnectionAuth(detail),
            ConnectError::Privilege => SkcdError::ConnectionPrivilege(detail),
            ConnectError::Resource => SkcdError::ConnectionResource(detail),
            ConnectError::Limit => SkcdError::ConnectionLimit(detail),
            ConnectError::Internal => SkcdError::ConnectionInternal(detail),
            ConnectError::Unknown => SkcdError::ConnectionUnknown(detail),
        }
    }
}

/// §5: host-reachability probes use a 1-second TCP reachability timeout,
/// used to refine a bare `08…` SQLState into a more specific unreachable
/// diagnosis before surfacing it.
pub fn tcp_reachable(host: &str, port: &str) -> bool {
    let addr = format!("{host}:{port}");
    match addr.to_socket_addrs() {
        Ok(mut addrs) => match addrs.next() {
            Some(sock_addr) => {
                TcpStream::connect_timeout(&sock_addr, Duration::from_secs(1)).is_ok()
            }
            None => false,
        },
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_exact_and_prefix_codes() {
        assert_eq!(classify_sqlstate("08004", false), ConnectError::Rejected);
        assert_eq!(classify_sqlstate("08006", true), ConnectError::Ssl);
        assert_eq!(classify_sqlstate("08006", false), ConnectError::Unreachable);
        assert_eq!(classify_sqlstate("08001", false), ConnectError::Unreachable);
        assert_eq!(classify_sqlstate("28000", false), ConnectError::Auth);
        assert_eq!(classify_sqlstate("42501", false), ConnectError::Privilege);
        assert_eq!(classify_sqlstate("53100", false), ConnectError::Resource);
        assert_eq!(classify_sqlstate("54000", false), ConnectError::Limit);
        assert_eq!(classify_sqlstate("XX000", false), ConnectError::Internal);
        assert_eq!(classify_sqlstate("xx000", false), ConnectError::Internal);
        assert_eq!(classify_sqlstate("99999", false), ConnectError::Unknown);
    }

    #[test]
    fn unreachable_host_is_not_tcp_reachable() {
        // Port 0 never accepts connections; this should fail fast, not hang.
        assert!(!tcp_reachable("127.0.0.1", "0"));
    }
}
