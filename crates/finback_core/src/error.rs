//! Error types for the Finback backup agent.
//!
//! Provides a single error enum covering configuration, connectivity,
//! storage, and engine failures, with actionable hints where we can give them.

use thiserror::Error;

/// Main error type for the Finback agent.
#[derive(Debug, Error)]
pub enum FinbackError {
    /// Required configuration is missing or malformed.
    #[error("Config error: {message}")]
    Config {
        /// Human-readable error message.
        message: String,
    },

    /// The MySQL server could not be reached or rejected the credentials.
    #[error("Connectivity error: {message}")]
    Connectivity {
        /// Human-readable error message.
        message: String,
        /// Actionable hint for the user.
        hint: Option<String>,
        /// Optional underlying error source.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A server-side lookup failed after the connection was established.
    #[error("Query error: {message}")]
    Query {
        /// Human-readable error message.
        message: String,
        /// MySQL server error code, when the server reported one.
        code: Option<u16>,
    },

    /// The backup engine was unavailable or the dump itself failed.
    #[error("Engine error: {message}")]
    Engine {
        /// Human-readable error message.
        message: String,
        /// Optional underlying error source.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Local settings persistence error.
    #[error("Storage error: {message}")]
    Storage {
        /// Human-readable error message.
        message: String,
        /// Actionable hint for the user.
        hint: Option<String>,
        /// Optional underlying error source.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A stored value could not be deobfuscated.
    ///
    /// Always recovered close to where it occurs; callers substitute a safe
    /// default instead of propagating this past the settings layer.
    #[error("Decryption error: {message}")]
    Decryption {
        /// Human-readable error message.
        message: String,
    },

    /// Login item registration error.
    #[error("Autostart error: {message}")]
    Autostart {
        /// Human-readable error message.
        message: String,
    },

    /// Unexpected internal error.
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable error message.
        message: String,
        /// Optional underlying error source.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl FinbackError {
    // ========== Constructors ==========

    /// Create a new config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create a new connectivity error.
    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::Connectivity { message: message.into(), hint: None, source: None }
    }

    /// Create a new connectivity error with a hint.
    pub fn connectivity_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::Connectivity { message: message.into(), hint: Some(hint.into()), source: None }
    }

    /// Create a new connectivity error with source.
    pub fn connectivity_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connectivity {
            message: message.into(),
            hint: None,
            source: Some(Box::new(source)),
        }
    }

    /// Create a new query error.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query { message: message.into(), code: None }
    }

    /// Create a new query error with the server error code.
    pub fn query_with_code(message: impl Into<String>, code: u16) -> Self {
        Self::Query { message: message.into(), code: Some(code) }
    }

    /// Create a new engine error.
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine { message: message.into(), source: None }
    }

    /// Create a new engine error with source.
    pub fn engine_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Engine { message: message.into(), source: Some(Box::new(source)) }
    }

    /// Create a new storage error.
    pub fn storage(message: impl Into<String>, hint: Option<&str>) -> Self {
        Self::Storage { message: message.into(), hint: hint.map(String::from), source: None }
    }

    /// Create a new storage error with source.
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage { message: message.into(), hint: None, source: Some(Box::new(source)) }
    }

    /// Create a new decryption error.
    pub fn decryption(message: impl Into<String>) -> Self {
        Self::Decryption { message: message.into() }
    }

    /// Create a new autostart error.
    pub fn autostart(message: impl Into<String>) -> Self {
        Self::Autostart { message: message.into() }
    }

    /// Create a new internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Create a new internal error with source.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Internal { message: message.into(), source: Some(Box::new(source)) }
    }

    // ========== Methods ==========

    /// Get the error category name.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config { .. } => "Config",
            Self::Connectivity { .. } => "Connectivity",
            Self::Query { .. } => "Query",
            Self::Engine { .. } => "Engine",
            Self::Storage { .. } => "Storage",
            Self::Decryption { .. } => "Decryption",
            Self::Autostart { .. } => "Autostart",
            Self::Internal { .. } => "Internal",
        }
    }

    /// Get actionable hint for the user.
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::Config { .. } => Some("Review the connection and backup settings"),
            Self::Connectivity { hint, .. } => hint.as_deref(),
            Self::Query { .. } => None,
            Self::Engine { .. } => Some("Check that a dump engine is installed and reachable"),
            Self::Storage { hint, .. } => hint.as_deref(),
            Self::Decryption { .. } => Some("Re-enter the affected credential"),
            Self::Autostart { .. } => Some("Check login item permissions in system settings"),
            Self::Internal { .. } => Some("Please report this issue"),
        }
    }

    /// Get the MySQL server error code (if applicable).
    pub fn server_code(&self) -> Option<u16> {
        match self {
            Self::Query { code, .. } => *code,
            _ => None,
        }
    }
}

// ========== Error Conversions ==========

/// Convert from mysql::Error, classifying server codes.
///
/// Access-denied codes become connectivity errors with a credential hint;
/// other server-reported errors are query errors carrying the code;
/// transport-level failures are connectivity errors.
impl From<mysql::Error> for FinbackError {
    fn from(err: mysql::Error) -> Self {
        match err {
            mysql::Error::MySqlError(server_err) => match server_err.code {
                // ER_ACCESS_DENIED_ERROR / ER_DBACCESS_DENIED_ERROR
                1045 | 1044 => FinbackError::Connectivity {
                    message: server_err.message.clone(),
                    hint: Some("Check username and password".to_string()),
                    source: Some(Box::new(mysql::Error::MySqlError(server_err))),
                },
                // ER_BAD_DB_ERROR
                1049 => FinbackError::Connectivity {
                    message: server_err.message.clone(),
                    hint: Some("Check the database name".to_string()),
                    source: Some(Box::new(mysql::Error::MySqlError(server_err))),
                },
                code => FinbackError::Query { message: server_err.message, code: Some(code) },
            },
            other => FinbackError::Connectivity {
                message: other.to_string(),
                hint: Some("Check that the MySQL server is running".to_string()),
                source: Some(Box::new(other)),
            },
        }
    }
}

/// Convert from rusqlite::Error to FinbackError.
impl From<rusqlite::Error> for FinbackError {
    fn from(err: rusqlite::Error) -> Self {
        let hint = match &err {
            rusqlite::Error::SqliteFailure(ffi_err, _) => match ffi_err.code {
                rusqlite::ffi::ErrorCode::DatabaseBusy => {
                    Some("The settings database is busy. Try again in a moment.".to_string())
                }
                rusqlite::ffi::ErrorCode::DiskFull => {
                    Some("Disk is full. Free up space and try again.".to_string())
                }
                rusqlite::ffi::ErrorCode::ReadOnly => {
                    Some("Settings database is read-only. Check file permissions.".to_string())
                }
                rusqlite::ffi::ErrorCode::DatabaseCorrupt => {
                    Some("The settings database may be corrupted.".to_string())
                }
                _ => None,
            },
            _ => None,
        };

        FinbackError::Storage { message: err.to_string(), hint, source: Some(Box::new(err)) }
    }
}

/// Convert from std::io::Error to FinbackError.
impl From<std::io::Error> for FinbackError {
    fn from(err: std::io::Error) -> Self {
        FinbackError::Storage {
            message: err.to_string(),
            hint: Some("Check file permissions and disk space".to_string()),
            source: Some(Box::new(err)),
        }
    }
}

/// Convert from serde_json::Error to FinbackError.
impl From<serde_json::Error> for FinbackError {
    fn from(err: serde_json::Error) -> Self {
        FinbackError::Storage {
            message: format!("JSON error: {err}"),
            hint: Some("Stored data may be corrupted".to_string()),
            source: Some(Box::new(err)),
        }
    }
}

/// Convert from a joined-task failure to FinbackError.
impl From<tokio::task::JoinError> for FinbackError {
    fn from(err: tokio::task::JoinError) -> Self {
        FinbackError::Internal {
            message: format!("background task failed: {err}"),
            source: Some(Box::new(err)),
        }
    }
}
