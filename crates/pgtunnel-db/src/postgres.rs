//! PostgreSQL backend over tokio-postgres.

use std::path::PathBuf;
use std::sync::Arc;

use rustls::{ClientConfig, RootCertStore};
use tokio_postgres::config::SslMode;
use tokio_postgres::{Client, Config, NoTls, SimpleQueryMessage};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{error, warn};

use crate::{
    Backend, BackendError, ColumnMeta, ConnectError, ConnectionDescriptor, Connector,
    ExecSummary, RowSet, TlsMode, Value,
};

const PROBE_SQL: &str = "SELECT 1";
const SERVER_VERSION_SQL: &str = "SELECT current_setting('server_version_num')";

/// Opens [`PgConn`]s. Holds the TLS trust settings shared by every backend.
#[derive(Clone, Debug, Default)]
pub struct PgConnector {
    ssl_root_cert: Option<PathBuf>,
}

impl PgConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extra PEM bundle trusted in addition to the platform roots.
    pub fn with_ssl_root_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.ssl_root_cert = Some(path.into());
        self
    }

    fn pg_config(descriptor: &ConnectionDescriptor) -> Result<Config, ConnectError> {
        let port: u16 = descriptor
            .port
            .trim()
            .parse()
            .map_err(|_| ConnectError::InvalidPort(descriptor.port.clone()))?;
        let mut config = Config::new();
        config
            .host(&descriptor.host)
            .port(port)
            .user(&descriptor.user)
            .password(&descriptor.password)
            .dbname(&descriptor.database)
            .ssl_mode(match descriptor.tls {
                TlsMode::Disable => SslMode::Disable,
                TlsMode::Prefer => SslMode::Prefer,
                TlsMode::Require => SslMode::Require,
            });
        Ok(config)
    }
}

impl Connector for PgConnector {
    type Conn = PgConn;

    async fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<PgConn, ConnectError> {
        let pg_config = Self::pg_config(descriptor)?;
        let address = descriptor.address();
        let client = if descriptor.tls == TlsMode::Disable {
            let (client, connection) = pg_config
                .connect(NoTls)
                .await
                .map_err(|err| ConnectError::Connect(err.to_string()))?;
            tokio::spawn(async move {
                if let Err(err) = connection.await {
                    error!(%address, "postgres connection error: {err}");
                }
            });
            client
        } else {
            let tls = build_tls_connector(self.ssl_root_cert.as_ref())?;
            let (client, connection) = pg_config
                .connect(tls)
                .await
                .map_err(|err| ConnectError::Connect(err.to_string()))?;
            tokio::spawn(async move {
                if let Err(err) = connection.await {
                    error!(%address, "postgres connection error: {err}");
                }
            });
            client
        };
        Ok(PgConn { client })
    }
}

pub struct PgConn {
    client: Client,
}

impl PgConn {
    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl Backend for PgConn {
    async fn ping(&self) -> Result<(), BackendError> {
        self.client.simple_query(PROBE_SQL).await?;
        Ok(())
    }

    async fn query(&self, sql: &str) -> Result<RowSet, BackendError> {
        // Describe first for column types, then run through the simple
        // protocol so every value arrives in its text form.
        let statement = self.client.prepare(sql).await?;
        let columns: Vec<ColumnMeta> = statement
            .columns()
            .iter()
            .map(|column| {
                let type_name = column.type_().name();
                ColumnMeta::new(
                    column.name(),
                    type_name.to_ascii_uppercase(),
                    display_length(type_name, column.type_modifier()),
                )
            })
            .collect();
        drop(statement);

        let messages = self.client.simple_query(sql).await?;
        let mut rows = Vec::new();
        for message in messages {
            let SimpleQueryMessage::Row(row) = message else {
                continue;
            };
            if row.len() != columns.len() {
                return Err(BackendError::new(format!(
                    "row has {} columns, statement described {}",
                    row.len(),
                    columns.len()
                )));
            }
            let mut values = Vec::with_capacity(columns.len());
            for (idx, column) in columns.iter().enumerate() {
                values.push(Value::from_text(&column.type_name, row.try_get(idx)?));
            }
            rows.push(values);
        }
        Ok(RowSet { columns, rows })
    }

    async fn execute(&self, sql: &str) -> Result<ExecSummary, BackendError> {
        // Simple protocol, so one entry may hold several `;`-separated commands.
        let messages = self.client.simple_query(sql).await?;
        let affected = affected_rows(&messages);
        Ok(ExecSummary {
            affected,
            insert_id: 0,
        })
    }

    async fn server_version(&self) -> Result<String, BackendError> {
        let row = self.client.query_opt(SERVER_VERSION_SQL, &[]).await?;
        match row {
            Some(row) => Ok(row.try_get::<_, String>(0)?),
            None => Ok("0".to_string()),
        }
    }

    fn is_closed(&self) -> bool {
        self.client.is_closed()
    }
}

/// Rows touched by every command in a simple-protocol exchange.
fn affected_rows(messages: &[SimpleQueryMessage]) -> u64 {
    messages
        .iter()
        .map(|message| match message {
            SimpleQueryMessage::CommandComplete(rows) => *rows,
            _ => 0,
        })
        .sum()
}

/// Column width as the tunnel client expects it.
///
/// Character types report their declared length (`typmod` minus the 4-byte
/// varlena header), unbounded `text`/`bytea` report the widest value, and
/// every other type reports 0. The subtraction wraps for an undeclared
/// length (`typmod` -1), which is what the client has always received.
fn display_length(type_name: &str, type_modifier: i32) -> u32 {
    const VARLENA_HEADER: i64 = 4;
    match type_name {
        "varchar" | "bpchar" => (i64::from(type_modifier) - VARLENA_HEADER) as u32,
        "text" | "bytea" => u32::MAX,
        _ => 0,
    }
}

fn build_tls_connector(extra_roots: Option<&PathBuf>) -> Result<MakeRustlsConnect, ConnectError> {
    let mut roots = RootCertStore::empty();
    let native = rustls_native_certs::load_native_certs();
    for err in &native.errors {
        warn!("failed to load a native root certificate: {err}");
    }
    for cert in native.certs {
        roots
            .add(cert)
            .map_err(|err| ConnectError::Tls(err.to_string()))?;
    }
    if let Some(path) = extra_roots {
        let pem = std::fs::read(path)
            .map_err(|err| ConnectError::Tls(format!("{}: {err}", path.display())))?;
        let mut cursor = std::io::Cursor::new(pem);
        let certs = rustls_pemfile::certs(&mut cursor)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| ConnectError::Tls(err.to_string()))?;
        for cert in certs {
            roots
                .add(cert)
                .map_err(|err| ConnectError::Tls(err.to_string()))?;
        }
    }
    if roots.is_empty() {
        return Err(ConnectError::Tls(
            "no root certificates available for TLS".to_string(),
        ));
    }
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let tls_config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|err| ConnectError::Tls(err.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(MakeRustlsConnect::new(tls_config))
}
