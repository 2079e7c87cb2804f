//! Backend type name to protocol type code.
//!
//! The codes are what the client expects to see in a field header, so this
//! table is a compatibility contract: every entry is listed explicitly and
//! nothing is derived from the backend's own OIDs.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Code reported for any type the table does not know.
pub const UNKNOWN_TYPE_CODE: u32 = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TypeRecord {
    pub code: u32,
    /// Display length that replaces whatever the backend reported.
    pub fixed_length: Option<u32>,
}

const fn code(code: u32) -> TypeRecord {
    TypeRecord {
        code,
        fixed_length: None,
    }
}

const fn sized(code: u32, length: u32) -> TypeRecord {
    TypeRecord {
        code,
        fixed_length: Some(length),
    }
}

const TYPE_TABLE: &[(&str, TypeRecord)] = &[
    ("bool", sized(16, 1)),
    ("boolean", sized(16, 1)),
    // Binary columns are announced as text; the client shows them verbatim.
    ("bytea", code(25)),
    ("bit", code(1560)),
    ("varbit", code(1562)),
    ("char", code(18)),
    ("name", code(19)),
    ("int2vector", code(22)),
    ("oidvector", code(30)),
    ("int8", code(20)),
    ("tid", code(27)),
    ("int2", code(21)),
    ("int4", code(23)),
    ("oid", sized(26, 4)),
    ("xid", code(28)),
    ("cid", code(29)),
    ("text", code(25)),
    ("money", code(790)),
    ("numeric", code(1700)),
    ("point", code(600)),
    ("lseg", code(601)),
    ("path", code(602)),
    ("box", code(603)),
    ("polygon", code(604)),
    ("line", code(628)),
    ("circle", code(718)),
    ("float4", code(700)),
    ("float8", code(701)),
    ("abstime", code(702)),
    ("tinterval", code(704)),
    ("timestamp", code(1114)),
    ("timestamptz", code(1184)),
    ("interval", code(1186)),
    ("timetz", code(1266)),
    ("unknown", code(705)),
    ("macaddr", code(829)),
    ("inet", code(869)),
    ("cidr", code(650)),
    ("bpchar", code(1042)),
    ("varchar", code(1043)),
    ("date", code(1082)),
    ("time", code(1083)),
    ("regproc", code(24)),
    ("refcursor", code(1790)),
    ("regprocedure", code(2202)),
    ("regoper", code(2203)),
    ("regoperator", code(2204)),
    ("regclass", code(2205)),
    ("regtype", code(2206)),
];

static TYPES: Lazy<HashMap<&'static str, TypeRecord>> =
    Lazy::new(|| TYPE_TABLE.iter().copied().collect());

/// Looks up a backend type name, ignoring ASCII case.
pub fn lookup(type_name: &str) -> Option<TypeRecord> {
    TYPES.get(type_name.to_ascii_lowercase().as_str()).copied()
}

/// Returns `(protocol_code, display_length)` for a column.
pub fn map_type(type_name: &str, reported_length: u32) -> (u32, u32) {
    match lookup(type_name) {
        Some(record) => (
            record.code,
            record.fixed_length.unwrap_or(reported_length),
        ),
        None => (UNKNOWN_TYPE_CODE, reported_length),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_forces_length_one() {
        assert_eq!(map_type("bool", 0), (16, 1));
        assert_eq!(map_type("BOOLEAN", 77), (16, 1));
    }

    #[test]
    fn oid_forces_length_four() {
        assert_eq!(map_type("OID", 0), (26, 4));
        assert_eq!(map_type("oid", 1024), (26, 4));
    }

    #[test]
    fn unknown_type_keeps_reported_length() {
        assert_eq!(map_type("jsonb", 12), (UNKNOWN_TYPE_CODE, 12));
        assert_eq!(map_type("_int4", 0), (UNKNOWN_TYPE_CODE, 0));
        assert_eq!(map_type("", 3), (UNKNOWN_TYPE_CODE, 3));
    }

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(map_type("VarChar", 255), (1043, 255));
        assert_eq!(map_type("INT8", 0), (20, 0));
        assert_eq!(map_type("TimestampTZ", 8), (1184, 8));
    }

    #[test]
    fn bytea_is_announced_as_text() {
        assert_eq!(lookup("bytea"), lookup("text"));
    }

    #[test]
    fn table_has_no_duplicate_names() {
        assert_eq!(TYPES.len(), TYPE_TABLE.len());
    }
}
