//! Scriptable in-process backend.
//!
//! Statements are matched by their trimmed text against a script; anything
//! unscripted fails the way a backend rejects unknown SQL. Used to drive the
//! dispatcher, the response assembler and the HTTP surface without a live
//! PostgreSQL server.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::{
    Backend, BackendError, ConnectError, ConnectionDescriptor, Connector, ExecSummary, RowSet,
};

#[derive(Clone, Debug)]
enum Scripted {
    Rows(RowSet),
    Affected(u64),
    Fail(String),
}

#[derive(Clone, Debug)]
pub struct MemoryScript {
    statements: HashMap<String, Scripted>,
    server_version: Result<String, String>,
    ping: Result<(), String>,
}

impl Default for MemoryScript {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryScript {
    pub fn new() -> Self {
        Self {
            statements: HashMap::new(),
            server_version: Ok("160002".to_string()),
            ping: Ok(()),
        }
    }

    pub fn rows(mut self, sql: &str, rows: RowSet) -> Self {
        self.statements.insert(sql.trim().to_string(), Scripted::Rows(rows));
        self
    }

    pub fn affected(mut self, sql: &str, count: u64) -> Self {
        self.statements
            .insert(sql.trim().to_string(), Scripted::Affected(count));
        self
    }

    pub fn failure(mut self, sql: &str, message: &str) -> Self {
        self.statements
            .insert(sql.trim().to_string(), Scripted::Fail(message.to_string()));
        self
    }

    pub fn server_version(mut self, version: &str) -> Self {
        self.server_version = Ok(version.to_string());
        self
    }

    pub fn failing_server_version(mut self, message: &str) -> Self {
        self.server_version = Err(message.to_string());
        self
    }

    pub fn failing_ping(mut self, message: &str) -> Self {
        self.ping = Err(message.to_string());
        self
    }

    fn lookup(&self, sql: &str) -> Result<&Scripted, BackendError> {
        self.statements.get(sql.trim()).ok_or_else(|| {
            BackendError::new(format!("ERROR: no scripted result for statement: {sql}"))
        })
    }
}

/// Counters shared by a connector and every handle it opened.
#[derive(Debug, Default)]
pub struct MemoryStats {
    connects: AtomicUsize,
    closed: AtomicUsize,
    statements: Mutex<Vec<String>>,
}

impl MemoryStats {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Every statement run through `query` or `execute`, in arrival order.
    pub fn statements(&self) -> Vec<String> {
        self.statements
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    fn record(&self, sql: &str) {
        if let Ok(mut guard) = self.statements.lock() {
            guard.push(sql.to_string());
        }
    }
}

pub struct MemoryConnector {
    script: Arc<MemoryScript>,
    stats: Arc<MemoryStats>,
    unreachable: HashSet<String>,
}

impl MemoryConnector {
    pub fn new(script: MemoryScript) -> Self {
        Self {
            script: Arc::new(script),
            stats: Arc::new(MemoryStats::default()),
            unreachable: HashSet::new(),
        }
    }

    /// Connections to `host` fail as if nothing listens there.
    pub fn unreachable(mut self, host: &str) -> Self {
        self.unreachable.insert(host.to_string());
        self
    }

    pub fn stats(&self) -> Arc<MemoryStats> {
        Arc::clone(&self.stats)
    }
}

impl Connector for MemoryConnector {
    type Conn = MemoryConn;

    async fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<MemoryConn, ConnectError> {
        self.stats.connects.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.contains(&descriptor.host) {
            return Err(ConnectError::Connect(format!(
                "error connecting to server: Connection refused (os error 111) ({})",
                descriptor.address()
            )));
        }
        Ok(MemoryConn {
            script: Arc::clone(&self.script),
            stats: Arc::clone(&self.stats),
            closed: AtomicBool::new(false),
        })
    }
}

pub struct MemoryConn {
    script: Arc<MemoryScript>,
    stats: Arc<MemoryStats>,
    closed: AtomicBool,
}

impl MemoryConn {
    /// Simulates the backend dropping the connection.
    pub fn mark_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl Backend for MemoryConn {
    async fn ping(&self) -> Result<(), BackendError> {
        self.script.ping.clone().map_err(BackendError::new)
    }

    async fn query(&self, sql: &str) -> Result<RowSet, BackendError> {
        self.stats.record(sql);
        match self.script.lookup(sql)? {
            Scripted::Rows(rows) => Ok(rows.clone()),
            Scripted::Affected(_) => Ok(RowSet::default()),
            Scripted::Fail(message) => Err(BackendError::new(message.clone())),
        }
    }

    async fn execute(&self, sql: &str) -> Result<ExecSummary, BackendError> {
        self.stats.record(sql);
        match self.script.lookup(sql)? {
            Scripted::Rows(rows) => Ok(ExecSummary {
                affected: rows.rows.len() as u64,
                insert_id: 0,
            }),
            Scripted::Affected(count) => Ok(ExecSummary {
                affected: *count,
                insert_id: 0,
            }),
            Scripted::Fail(message) => Err(BackendError::new(message.clone())),
        }
    }

    async fn server_version(&self) -> Result<String, BackendError> {
        self.script.server_version.clone().map_err(BackendError::new)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for MemoryConn {
    fn drop(&mut self) {
        self.stats.closed.fetch_add(1, Ordering::SeqCst);
    }
}
