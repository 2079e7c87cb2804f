use std::future::Future;

use crate::{BackendError, ConnectError, ConnectionDescriptor, Value};

/// Column metadata as the backend reports it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    /// Uppercase backend type tag, e.g. `INT4` or `TIMESTAMP`.
    pub type_name: String,
    pub reported_length: u32,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, reported_length: u32) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            reported_length,
        }
    }
}

/// A fully materialized result set.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RowSet {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExecSummary {
    pub affected: u64,
    /// PostgreSQL has no last-insert-id; adapters report 0.
    pub insert_id: u64,
}

/// A live handle to one backend database.
///
/// Handles are shared between concurrent requests, so every method takes
/// `&self`; serializing access (or not) is up to the driver.
pub trait Backend: Send + Sync + 'static {
    /// Lightweight liveness check run once before a handle is cached.
    fn ping(&self) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Runs a row-returning statement and materializes every row.
    fn query(&self, sql: &str) -> impl Future<Output = Result<RowSet, BackendError>> + Send;

    /// Runs a statement that reports an affected-row count.
    fn execute(&self, sql: &str) -> impl Future<Output = Result<ExecSummary, BackendError>> + Send;

    /// The server's `server_version_num` setting.
    fn server_version(&self) -> impl Future<Output = Result<String, BackendError>> + Send;

    /// True once the underlying connection is gone for good.
    fn is_closed(&self) -> bool;
}

/// Opens backend handles for the registry.
pub trait Connector: Send + Sync + 'static {
    type Conn: Backend;

    fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> impl Future<Output = Result<Self::Conn, ConnectError>> + Send;
}
