//! Runs the requested action against a resolved backend handle.

use pgtunnel_db::{Backend, BackendError, ConnectionDescriptor, RowSet};
use tracing::debug;

/// Protocol version reported by the connection-info action.
pub const PROTOCOL_VERSION: &str = "3";
/// Result code for a statement the backend rejected.
pub const STATEMENT_ERROR_CODE: u32 = 500;

#[derive(Clone, Debug, PartialEq)]
pub struct ConnectionInfo {
    pub address: String,
    pub protocol_version: &'static str,
    pub server_version: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StatementOutcome {
    Rows(RowSet),
    Affected { count: u64, insert_id: u64 },
    Failure { code: u32, message: String },
}

impl StatementOutcome {
    fn failure(err: BackendError) -> Self {
        StatementOutcome::Failure {
            code: STATEMENT_ERROR_CODE,
            message: err.message().to_string(),
        }
    }
}

/// One executed statement and whether it sits at the last batch position.
#[derive(Clone, Debug, PartialEq)]
pub struct DispatchedStatement {
    pub position: usize,
    pub last: bool,
    pub outcome: StatementOutcome,
}

/// `UPDATE` and `DELETE` report affected rows; everything else returns rows.
pub fn is_exec_statement(sql: &str) -> bool {
    let sql = sql.trim_start();
    ["update", "delete"].iter().any(|keyword| {
        sql.get(..keyword.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(keyword))
    })
}

pub async fn connection_info<B: Backend>(
    backend: &B,
    descriptor: &ConnectionDescriptor,
) -> Result<ConnectionInfo, BackendError> {
    let server_version = backend.server_version().await?;
    Ok(ConnectionInfo {
        address: descriptor.address(),
        protocol_version: PROTOCOL_VERSION,
        server_version,
    })
}

/// Executes `batch` in order.
///
/// Empty statements produce no outcome, but positions (and so the final
/// delimiter) are counted over the whole batch as submitted. A failing
/// statement does not stop the batch.
pub async fn execute_batch<B: Backend>(backend: &B, batch: &[String]) -> Vec<DispatchedStatement> {
    let mut dispatched = Vec::with_capacity(batch.len());
    let last_position = batch.len().saturating_sub(1);
    for (position, sql) in batch.iter().enumerate() {
        if sql.is_empty() {
            continue;
        }
        debug!(position, sql = %sql, "executing statement");
        let outcome = execute_statement(backend, sql).await;
        dispatched.push(DispatchedStatement {
            position,
            last: position == last_position,
            outcome,
        });
    }
    dispatched
}

async fn execute_statement<B: Backend>(backend: &B, sql: &str) -> StatementOutcome {
    if is_exec_statement(sql) {
        match backend.execute(sql).await {
            Ok(summary) => StatementOutcome::Affected {
                count: summary.affected,
                insert_id: summary.insert_id,
            },
            Err(err) => StatementOutcome::failure(err),
        }
    } else {
        match backend.query(sql).await {
            Ok(rows) => StatementOutcome::Rows(rows),
            Err(err) => StatementOutcome::failure(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgtunnel_db::memory::{MemoryConnector, MemoryScript};
    use pgtunnel_db::{ColumnMeta, Connector, Value};

    async fn backend(script: MemoryScript) -> pgtunnel_db::memory::MemoryConn {
        let descriptor = ConnectionDescriptor::new("h", "5432", "u", "p", "d");
        MemoryConnector::new(script)
            .connect(&descriptor)
            .await
            .expect("connect")
    }

    fn one_column(name: &str, value: i64) -> RowSet {
        RowSet {
            columns: vec![ColumnMeta::new(name, "INT4", 0)],
            rows: vec![vec![Value::Int(value)]],
        }
    }

    #[test]
    fn exec_classification() {
        for sql in ["  UPDATE t SET x=1", "delete from t", "Delete\tfrom t", "\nupdate t"] {
            assert!(is_exec_statement(sql), "{sql:?}");
        }
        for sql in ["select 1", "  SELECT * FROM t", "insert into t values (1)", "", "upd"] {
            assert!(!is_exec_statement(sql), "{sql:?}");
        }
    }

    #[test]
    fn exec_classification_survives_multibyte_prefix() {
        assert!(!is_exec_statement("ééé select"));
    }

    #[tokio::test]
    async fn failure_in_the_middle_keeps_order() {
        let script = MemoryScript::new()
            .rows("select 1 as a", one_column("a", 1))
            .failure("select broken", "ERROR: column \"broken\" does not exist")
            .affected("delete from t", 3);
        let conn = backend(script).await;
        let batch: Vec<String> = ["select 1 as a", "select broken", "delete from t"]
            .map(String::from)
            .to_vec();
        let dispatched = execute_batch(&conn, &batch).await;

        assert_eq!(dispatched.len(), 3);
        assert_eq!(dispatched[0].outcome, StatementOutcome::Rows(one_column("a", 1)));
        assert_eq!(
            dispatched[1].outcome,
            StatementOutcome::Failure {
                code: STATEMENT_ERROR_CODE,
                message: "ERROR: column \"broken\" does not exist".into()
            }
        );
        assert_eq!(
            dispatched[2].outcome,
            StatementOutcome::Affected { count: 3, insert_id: 0 }
        );
        let lasts: Vec<bool> = dispatched.iter().map(|d| d.last).collect();
        assert_eq!(lasts, vec![false, false, true]);
    }

    #[tokio::test]
    async fn empty_statements_are_skipped_but_keep_positions() {
        let script = MemoryScript::new().rows("select 1 as a", one_column("a", 1));
        let conn = backend(script).await;
        let batch: Vec<String> = ["", "select 1 as a", ""].map(String::from).to_vec();
        let dispatched = execute_batch(&conn, &batch).await;
        assert_eq!(dispatched.len(), 1);
        assert_eq!(dispatched[0].position, 1);
        // The trailing blank owns the last position, so nothing ends the batch.
        assert!(!dispatched[0].last);
    }

    #[tokio::test]
    async fn exec_statements_use_execute() {
        let script = MemoryScript::new().affected("UPDATE t SET x = 1", 2);
        let conn = backend(script).await;
        let dispatched = execute_batch(&conn, &["UPDATE t SET x = 1".to_string()]).await;
        assert_eq!(
            dispatched[0].outcome,
            StatementOutcome::Affected { count: 2, insert_id: 0 }
        );
        assert!(dispatched[0].last);
    }

    #[tokio::test]
    async fn connection_info_reports_version() {
        let conn = backend(MemoryScript::new().server_version("150004")).await;
        let descriptor = ConnectionDescriptor::new("db.internal", "5432", "u", "p", "d");
        let info = connection_info(&conn, &descriptor).await.expect("info");
        assert_eq!(
            info,
            ConnectionInfo {
                address: "db.internal:5432".into(),
                protocol_version: "3",
                server_version: "150004".into(),
            }
        );
    }
}
