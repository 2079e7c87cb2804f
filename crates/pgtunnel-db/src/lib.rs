//! Backend access for pgtunnel: connection descriptors, the process-wide
//! connection registry, and the adapter that turns backend rows into
//! [`Value`]s.

mod backend;
mod descriptor;
mod error;
#[cfg(any(test, feature = "memory"))]
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
mod registry;
mod value;

pub use backend::{Backend, ColumnMeta, Connector, ExecSummary, RowSet};
pub use descriptor::{ConnectionDescriptor, TlsMode};
pub use error::{BackendError, ConnectError};
pub use registry::Registry;
pub use value::Value;
