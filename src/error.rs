//! Error types for the MySQL query lane.
//!
//! `DbError` is what every future and internal operation resolves to.
//! `ServiceError` is the distinguished error raised by the blocking API edge
//! (`query_sync`, `update_sync`, `transmit_sync`).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "42S02" for unknown table
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u64,
    },

    #[error("Connection is closed")]
    ConnectionClosed,

    #[error("Connection is not established")]
    NotEstablished,

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Row mapping failed: {message}")]
    Mapping { message: String },

    #[error("Statement failed after {attempts} attempt(s): {source}")]
    Execution {
        attempts: u32,
        #[source]
        source: Box<DbError>,
    },

    #[error("Transaction error: {message} (transaction: {transaction_id})")]
    Transaction {
        message: String,
        transaction_id: String,
        #[source]
        source: Option<Box<DbError>>,
    },

    #[error(transparent)]
    Service(Box<ServiceError>),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a row mapping error.
    pub fn mapping(message: impl Into<String>) -> Self {
        Self::Mapping {
            message: message.into(),
        }
    }

    /// Wrap the last failure of a statement that ran `attempts` times.
    pub fn execution(attempts: u32, source: DbError) -> Self {
        Self::Execution {
            attempts,
            source: Box::new(source),
        }
    }

    /// Create a transaction error.
    pub fn transaction(
        message: impl Into<String>,
        transaction_id: impl Into<String>,
        source: Option<DbError>,
    ) -> Self {
        Self::Transaction {
            message: message.into(),
            transaction_id: transaction_id.into(),
            source: source.map(Box::new),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Database { suggestion, .. } => Some(suggestion),
            Self::Execution { source, .. } => source.suggestion(),
            _ => None,
        }
    }

    /// Precondition violations are rejected before any statement runs and are
    /// never retried.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed | Self::NotEstablished | Self::InvalidInput { .. }
        )
    }

    /// Check if this error (or the failure it wraps) is timeout-class.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Execution { source, .. } => source.is_timeout(),
            _ => false,
        }
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection properties and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::database(
                    db_err.message(),
                    code,
                    "Check the SQL syntax and referenced objects",
                )
            }
            sqlx::Error::RowNotFound => DbError::database(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            sqlx::Error::Io(io_err) if io_err.kind() == std::io::ErrorKind::TimedOut => {
                DbError::timeout(format!("I/O ({})", io_err), 0)
            }
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnNotFound(col) => {
                DbError::mapping(format!("Column not found: {}", col))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => DbError::mapping(format!(
                "Column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::mapping(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::mapping(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

impl From<ServiceError> for DbError {
    fn from(err: ServiceError) -> Self {
        DbError::Service(Box::new(err))
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Failure raised by the blocking API edge.
///
/// Converting a `DbError` that already carries a `ServiceError` unwraps it
/// instead of nesting a second layer.
#[derive(Error, Debug)]
#[error("MySQL service failure: {source}")]
pub struct ServiceError {
    #[source]
    source: DbError,
}

impl ServiceError {
    pub fn new(source: DbError) -> Self {
        Self { source }
    }

    /// The failure this error wraps.
    pub fn cause(&self) -> &DbError {
        &self.source
    }

    pub fn into_cause(self) -> DbError {
        self.source
    }
}

impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Service(inner) => *inner,
            // A mapper that raised a ServiceError keeps it through the retry wrapper
            DbError::Execution { source, .. } if matches!(*source, DbError::Service(_)) => {
                ServiceError::from(*source)
            }
            other => ServiceError::new(other),
        }
    }
}
