use thiserror::Error;

/// A backend handle could not be opened or failed its liveness probe.
///
/// The message is forwarded to the client verbatim.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectError {
    #[error("invalid port: {0}")]
    InvalidPort(String),
    #[error("{0}")]
    Connect(String),
    #[error("{0}")]
    Probe(String),
    #[error("TLS setup failed: {0}")]
    Tls(String),
}

/// A statement failed during execution or row materialization.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct BackendError {
    message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(feature = "postgres")]
impl From<tokio_postgres::Error> for BackendError {
    fn from(err: tokio_postgres::Error) -> Self {
        // Server-side errors carry their own severity and text; everything
        // else (I/O, closed connection) falls back to the driver's wording.
        match err.as_db_error() {
            Some(db) => Self::new(db.to_string()),
            None => Self::new(err.to_string()),
        }
    }
}
