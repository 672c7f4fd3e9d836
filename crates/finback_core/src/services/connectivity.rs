//! Database connectivity probing.
//!
//! A probe answers two questions in one round trip: can the server be
//! reached with these credentials, and does the configured schema exist.
//! Probes never return `Err`; every outcome, including transport failures,
//! is folded into a [`ProbeReport`] so callers can poll without error
//! plumbing.

use crate::error::FinbackError;
use crate::models::ConnectionProfile;

use mysql::prelude::Queryable;
use mysql::{Conn, OptsBuilder};
use serde::Serialize;

/// Outcome of a single connectivity probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    /// Whether the server accepted the connection and answered the query.
    pub success: bool,
    /// Whether the configured schema exists. `None` when the server could
    /// not be asked.
    pub db_exists: Option<bool>,
    /// Human-readable failure description.
    pub error_message: Option<String>,
}

impl ProbeReport {
    /// Successful probe; the server answered the schema lookup.
    pub fn ok(db_exists: bool) -> Self {
        Self { success: true, db_exists: Some(db_exists), error_message: None }
    }

    /// Failed probe with a description of what went wrong.
    pub fn failure(message: impl Into<String>) -> Self {
        Self { success: false, db_exists: None, error_message: Some(message.into()) }
    }

    /// Connected means reachable AND the schema exists.
    pub fn is_connected(&self) -> bool {
        self.success && self.db_exists == Some(true)
    }
}

/// A connectivity check against a MySQL server.
///
/// Implementations are synchronous; async callers run them on a blocking
/// thread.
pub trait ConnectivityProbe: Send + Sync {
    fn check(&self, profile: &ConnectionProfile) -> ProbeReport;
}

/// Probe that connects to the real server and looks the schema up in
/// `information_schema`.
pub struct MysqlProbe;

impl MysqlProbe {
    fn connect(profile: &ConnectionProfile) -> Result<Conn, FinbackError> {
        // Connect against information_schema so the probe works even when
        // the target schema does not exist yet.
        let opts = OptsBuilder::new()
            .ip_or_hostname(Some(profile.host.as_str()))
            .tcp_port(profile.port)
            .user(Some(profile.username.as_str()))
            .pass(Some(profile.password.as_str()))
            .db_name(Some("information_schema"));

        Ok(Conn::new(opts)?)
    }
}

impl ConnectivityProbe for MysqlProbe {
    fn check(&self, profile: &ConnectionProfile) -> ProbeReport {
        if profile.database.trim().is_empty() {
            return ProbeReport::failure("No database name configured");
        }

        let mut conn = match Self::connect(profile) {
            Ok(conn) => conn,
            Err(e) => {
                tracing::debug!(host = %profile.host, port = profile.port, error = %e, "Probe connection failed");
                return ProbeReport::failure(e.to_string());
            }
        };

        let count: Result<Option<u64>, mysql::Error> = conn.exec_first(
            "SELECT COUNT(*) FROM information_schema.SCHEMATA WHERE SCHEMA_NAME = ?",
            (profile.database.as_str(),),
        );

        match count {
            Ok(count) => {
                let db_exists = count.unwrap_or(0) > 0;
                tracing::debug!(database = %profile.database, db_exists, "Probe succeeded");
                ProbeReport::ok(db_exists)
            }
            Err(e) => {
                let err = FinbackError::from(e);
                tracing::debug!(database = %profile.database, error = %err, "Probe query failed");
                ProbeReport::failure(err.to_string())
            }
        }
    }
}
