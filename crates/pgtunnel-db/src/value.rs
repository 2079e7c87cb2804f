use chrono::NaiveDateTime;

/// One cell of a materialized row.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Character data and anything without a dedicated variant.
    Text(String),
    /// Bytes passed through untouched (`bytea`, `numeric`, `oid`).
    Binary(Vec<u8>),
    Timestamp(NaiveDateTime),
}

const TIMESTAMP_INPUT: &str = "%Y-%m-%d %H:%M:%S%.f";

impl Value {
    /// Builds a value from the backend's text representation.
    ///
    /// `type_tag` is the uppercase backend type name. A typed column whose
    /// text does not parse (`infinity` timestamps, for instance) degrades to
    /// [`Value::Text`] rather than failing the statement.
    pub fn from_text(type_tag: &str, text: Option<&str>) -> Value {
        let Some(text) = text else {
            return Value::Null;
        };
        let parsed = match type_tag {
            "BOOL" | "BOOLEAN" => match text {
                "t" | "true" => Some(Value::Bool(true)),
                "f" | "false" => Some(Value::Bool(false)),
                _ => None,
            },
            "INT2" | "INT4" | "INT8" | "BIGINT" | "INTEGER" => text.parse().ok().map(Value::Int),
            "FLOAT4" | "FLOAT8" => text.parse().ok().map(Value::Float),
            "OID" | "NUMERIC" => Some(Value::Binary(text.as_bytes().to_vec())),
            "BYTEA" => Some(Value::Binary(decode_bytea(text))),
            "TIMESTAMP" => NaiveDateTime::parse_from_str(text, TIMESTAMP_INPUT)
                .ok()
                .map(Value::Timestamp),
            _ => None,
        };
        parsed.unwrap_or_else(|| Value::Text(text.to_string()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// Decodes `bytea` output in hex format (`\x4869`). Escape-format output is
/// returned as-is.
fn decode_bytea(text: &str) -> Vec<u8> {
    let Some(hex) = text.strip_prefix("\\x") else {
        return text.as_bytes().to_vec();
    };
    let digits = hex.as_bytes();
    if digits.len() % 2 != 0 {
        return text.as_bytes().to_vec();
    }
    let mut out = Vec::with_capacity(digits.len() / 2);
    for pair in digits.chunks_exact(2) {
        match (hex_digit(pair[0]), hex_digit(pair[1])) {
            (Some(hi), Some(lo)) => out.push(hi << 4 | lo),
            _ => return text.as_bytes().to_vec(),
        }
    }
    out
}

fn hex_digit(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
