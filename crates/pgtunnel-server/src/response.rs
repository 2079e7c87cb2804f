//! Assembles the binary response body.
//!
//! Layout, in order:
//!
//! ```text
//! header      long 1111, short 201, long code, 6 x 0x00 [, block message]
//! conn info   block address, block "3", block server_version
//! per result  long code, long affected, long insert_id,
//!             long columns, long rows, 12 x 0x00
//!             block error | block "" | fields + rows
//!             byte 0x01 (more follow) | 0x00 (end of batch)
//! field       block name, block "", long type_code, long 0, long length
//! cell        0xFF | block text
//! ```

use std::borrow::Cow;

use bytes::Bytes;
use pgtunnel_db::{ColumnMeta, Connector, Registry, Value};
use pgtunnel_wire::{WireWriter, map_type};
use tracing::{error, warn};

use crate::dispatch::{self, ConnectionInfo, DispatchedStatement, StatementOutcome};
use crate::request::{Action, TunnelRequest};

pub const HEADER_MAGIC: u32 = 1111;
pub const PROTOCOL_REVISION: u16 = 201;
pub const CONNECTION_ERROR_CODE: u32 = 28000;
pub const MORE_RESULTS: u8 = 0x01;
pub const END_OF_BATCH: u8 = 0x00;

const HEADER_PADDING: usize = 6;
const RESULT_HEADER_PADDING: usize = 12;
const TIMESTAMP_OUTPUT: &str = "%Y-%m-%d %H:%M:%S";

/// Resolves a handle, runs the action and encodes the whole response.
pub async fn respond<C: Connector>(registry: &Registry<C>, request: &TunnelRequest) -> Bytes {
    let mut out = WireWriter::with_capacity(1024);
    let backend = match registry.resolve(&request.descriptor).await {
        Ok(backend) => backend,
        Err(err) => {
            warn!(address = %request.descriptor.address(), "backend connection failed: {err}");
            write_header(&mut out, CONNECTION_ERROR_CODE, Some(&err.to_string()));
            return out.finish();
        }
    };

    write_header(&mut out, 0, None);
    match &request.action {
        Action::ConnectionInfo => {
            match dispatch::connection_info(&*backend, &request.descriptor).await {
                Ok(info) => write_connection_info(&mut out, &info),
                Err(err) => error!("server version query failed: {err}"),
            }
        }
        Action::Query => {
            let results = dispatch::execute_batch(&*backend, &request.statements).await;
            for result in &results {
                write_statement(&mut out, result);
            }
        }
        Action::Other(action) => {
            warn!(action = %action, "unknown action, sending header only");
        }
    }
    out.finish()
}

pub fn write_header(out: &mut WireWriter, code: u32, message: Option<&str>) {
    out.long(HEADER_MAGIC)
        .short(PROTOCOL_REVISION)
        .long(code)
        .dummy(HEADER_PADDING);
    if let Some(message) = message {
        out.block(message);
    }
}

pub fn write_connection_info(out: &mut WireWriter, info: &ConnectionInfo) {
    out.block(&info.address)
        .block(info.protocol_version)
        .block(&info.server_version);
}

/// Encodes one statement result followed by its batch delimiter.
pub fn write_statement(out: &mut WireWriter, statement: &DispatchedStatement) {
    match &statement.outcome {
        StatementOutcome::Failure { code, message } => {
            write_result_header(out, *code, 0, 0, 0, 0);
            out.block(message);
        }
        StatementOutcome::Affected { count, insert_id } => {
            write_result_header(out, 0, *count, *insert_id, 0, 0);
            out.block("");
        }
        StatementOutcome::Rows(set) => {
            write_result_header(out, 0, 0, 0, set.columns.len() as u64, set.rows.len() as u64);
            if set.columns.is_empty() {
                out.block("");
            } else {
                write_fields(out, &set.columns);
                for row in &set.rows {
                    write_row(out, row);
                }
            }
        }
    }
    out.byte(if statement.last { END_OF_BATCH } else { MORE_RESULTS });
}

fn write_result_header(
    out: &mut WireWriter,
    code: u32,
    affected: u64,
    insert_id: u64,
    columns: u64,
    rows: u64,
) {
    out.long(code)
        .long(saturate(affected))
        .long(saturate(insert_id))
        .long(saturate(columns))
        .long(saturate(rows))
        .dummy(RESULT_HEADER_PADDING);
}

fn saturate(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

fn write_fields(out: &mut WireWriter, columns: &[ColumnMeta]) {
    for column in columns {
        let (type_code, length) = map_type(&column.type_name, column.reported_length);
        out.block(&column.name)
            .block("")
            .long(type_code)
            .long(0)
            .long(length);
    }
}

fn write_row(out: &mut WireWriter, row: &[Value]) {
    for value in row {
        match wire_text(value) {
            Some(text) => out.block(text),
            None => out.null(),
        };
    }
}

/// Text form of a cell as the client expects it; `None` for NULL.
pub fn wire_text(value: &Value) -> Option<Cow<'_, [u8]>> {
    let text = match value {
        Value::Null => return None,
        Value::Bool(true) => Cow::Borrowed(&b"t"[..]),
        Value::Bool(false) => Cow::Borrowed(&b"f"[..]),
        Value::Int(n) => Cow::Owned(n.to_string().into_bytes()),
        Value::Float(f) => Cow::Owned(float_text(*f).into_bytes()),
        Value::Binary(bytes) => Cow::Borrowed(bytes.as_slice()),
        Value::Timestamp(ts) => Cow::Owned(ts.format(TIMESTAMP_OUTPUT).to_string().into_bytes()),
        Value::Text(text) => match escape_text(text) {
            Cow::Borrowed(text) => Cow::Borrowed(text.as_bytes()),
            Cow::Owned(text) => Cow::Owned(text.into_bytes()),
        },
    };
    Some(text)
}

/// Doubles backslashes and single quotes. Carriage returns and newlines pass
/// through unchanged.
fn float_text(value: f64) -> String {
    if value.is_infinite() {
        return if value > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }
    format!("{value:.6}")
}

fn escape_text(text: &str) -> Cow<'_, str> {
    if !text.contains(['\\', '\'']) {
        return Cow::Borrowed(text);
    }
    let mut escaped = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("''"),
            other => escaped.push(other),
        }
    }
    Cow::Owned(escaped)
}
