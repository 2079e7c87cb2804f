//! Decoding of the form-encoded tunnel request.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use pgtunnel_db::{ConnectionDescriptor, TlsMode};
use tracing::warn;

const STATEMENT_FIELD: &str = "q[]";

/// What the client asked the tunnel to do (`actn`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// `C`: report address, protocol version and server version.
    ConnectionInfo,
    /// `Q`: run the statement batch.
    Query,
    /// Anything else; answered with the bare success header.
    Other(String),
}

impl Action {
    fn parse(value: &str) -> Self {
        match value {
            "C" => Action::ConnectionInfo,
            "Q" => Action::Query,
            other => Action::Other(other.to_string()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TunnelRequest {
    pub descriptor: ConnectionDescriptor,
    pub action: Action,
    /// Statements in submission order. Blank entries are kept so that
    /// delimiter positions match what the client sent.
    pub statements: Vec<String>,
}

impl TunnelRequest {
    /// Parses an `application/x-www-form-urlencoded` body.
    ///
    /// Scalar fields take their first occurrence; missing fields are empty.
    pub fn from_form(body: &[u8], tls: TlsMode) -> Self {
        let mut login = None;
        let mut password = None;
        let mut host = None;
        let mut port = None;
        let mut db = None;
        let mut actn = None;
        let mut encode_base64 = None;
        let mut raw_statements = Vec::new();

        for (key, value) in form_urlencoded::parse(body) {
            let slot = match key.as_ref() {
                STATEMENT_FIELD => {
                    raw_statements.push(value.into_owned());
                    continue;
                }
                "login" => &mut login,
                "password" => &mut password,
                "host" => &mut host,
                "port" => &mut port,
                "db" => &mut db,
                "actn" => &mut actn,
                "encodeBase64" => &mut encode_base64,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }

        let base64_statements = encode_base64.as_deref() == Some("1");
        let statements = if base64_statements {
            raw_statements
                .iter()
                .filter_map(|raw| decode_statement(raw))
                .collect()
        } else {
            raw_statements
        };

        let descriptor = ConnectionDescriptor::new(
            host.unwrap_or_default(),
            port.unwrap_or_default(),
            login.unwrap_or_default(),
            password.unwrap_or_default(),
            db.unwrap_or_default(),
        )
        .with_tls(tls);

        Self {
            descriptor,
            action: Action::parse(actn.as_deref().unwrap_or_default()),
            statements,
        }
    }
}

/// Base64-decodes one statement, restoring stripped `=` padding first.
/// Undecodable statements are dropped from the batch.
pub fn decode_statement(raw: &str) -> Option<String> {
    let mut padded = raw.to_string();
    let missing = (4 - raw.len() % 4) % 4;
    padded.extend(std::iter::repeat_n('=', missing));
    match BASE64.decode(padded.as_bytes()) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(err) => {
            warn!("dropping statement that is not valid base64: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_fields_are_read() {
        let body = b"login=app&password=p%40ss&host=db.internal&port=5432&db=orders&actn=Q";
        let request = TunnelRequest::from_form(body, TlsMode::Disable);
        assert_eq!(request.descriptor.user, "app");
        assert_eq!(request.descriptor.password, "p@ss");
        assert_eq!(request.descriptor.host, "db.internal");
        assert_eq!(request.descriptor.port, "5432");
        assert_eq!(request.descriptor.database, "orders");
        assert_eq!(request.action, Action::Query);
        assert!(request.statements.is_empty());
    }

    #[test]
    fn first_scalar_occurrence_wins() {
        let request = TunnelRequest::from_form(b"host=a&host=b&actn=C&actn=Q", TlsMode::Disable);
        assert_eq!(request.descriptor.host, "a");
        assert_eq!(request.action, Action::ConnectionInfo);
    }

    #[test]
    fn statements_keep_order_and_blanks() {
        let body = b"actn=Q&q%5B%5D=select+1&q%5B%5D=&q%5B%5D=select+2";
        let request = TunnelRequest::from_form(body, TlsMode::Disable);
        assert_eq!(request.statements, vec!["select 1", "", "select 2"]);
    }

    #[test]
    fn base64_statements_are_decoded_with_padding_repaired() {
        // "select 1" -> c2VsZWN0IDE= ; sent without its padding.
        let body = b"actn=Q&encodeBase64=1&q%5B%5D=c2VsZWN0IDE&q%5B%5D=c2VsZWN0IDE%3D";
        let request = TunnelRequest::from_form(body, TlsMode::Disable);
        assert_eq!(request.statements, vec!["select 1", "select 1"]);
    }

    #[test]
    fn invalid_base64_statement_is_dropped() {
        let body = b"actn=Q&encodeBase64=1&q%5B%5D=%21%21%21%21&q%5B%5D=c2VsZWN0IDE";
        let request = TunnelRequest::from_form(body, TlsMode::Disable);
        assert_eq!(request.statements, vec!["select 1"]);
    }

    #[test]
    fn base64_only_when_flag_is_one() {
        let body = b"actn=Q&encodeBase64=0&q%5B%5D=c2VsZWN0IDE";
        let request = TunnelRequest::from_form(body, TlsMode::Disable);
        assert_eq!(request.statements, vec!["c2VsZWN0IDE"]);
    }

    #[test]
    fn missing_fields_are_empty() {
        let request = TunnelRequest::from_form(b"", TlsMode::Require);
        assert_eq!(request.descriptor.host, "");
        assert_eq!(request.descriptor.tls, TlsMode::Require);
        assert_eq!(request.action, Action::Other(String::new()));
    }
}
