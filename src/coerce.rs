//! Value coercion (C3): turning raw wire values (bytes, query strings) into the
//! primitive and structured types a provider declares.
//!
//! Grounded in the teacher's `extractors/query.rs`, which turns a parsed
//! `HashMap<String, String>` into a target type via a `serde_json::Value` round trip;
//! the scalar coercions here (int/float/bool) are the piece the teacher leaves to
//! serde's own (lenient) string-to-number deserialization, made strict per the
//! boolean/number rules pinned in the data model.

use serde::de::DeserializeOwned;

use crate::error::Envelope;

/// A coercion failure, with enough context to build a `422`-class [`Envelope`]. This
/// is always a type mismatch against an otherwise-present value; a value that's
/// simply absent never reaches coercion and stays a `400` (see `provider::source`'s
/// own `missing` helper).
#[derive(Debug)]
pub enum CoercionError {
    /// The raw bytes were not valid text under the configured encoding.
    InvalidEncoding,
    /// A string value didn't parse as the requested scalar type.
    InvalidScalar { value: String, expected: &'static str },
    /// A list element at `index` failed to coerce; `source` carries the inner error.
    InvalidElement {
        index: usize,
        source: Box<CoercionError>,
    },
    /// The raw bytes were not valid JSON, or didn't match the target shape.
    InvalidJson(String),
}

/// Generic fallback conversion for call sites that have no parameter name or source
/// tag to attach (e.g. a provider coercing a value outside the parameter-source
/// providers). Call sites that do have that context build their own
/// [`Envelope::validation`] naming it instead of going through this impl — see
/// `provider::source`.
impl From<CoercionError> for Envelope {
    fn from(err: CoercionError) -> Self {
        Envelope::validation(err.to_string())
    }
}

impl std::fmt::Display for CoercionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoercionError::InvalidEncoding => write!(f, "body is not valid text"),
            CoercionError::InvalidScalar { value, expected } => {
                write!(f, "'{value}' is not a valid {expected}")
            }
            CoercionError::InvalidElement { index, source } => {
                write!(f, "element {index}: {source}")
            }
            CoercionError::InvalidJson(msg) => write!(f, "invalid json: {msg}"),
        }
    }
}

/// Decodes raw body bytes to a `String` under the given encoding. Only UTF-8 is
/// supported today (§6's `Encoding`), but the signature leaves room for more.
pub fn bytes_to_string(bytes: &[u8], encoding: crate::config::Encoding) -> Result<String, CoercionError> {
    match encoding {
        crate::config::Encoding::Utf8 => {
            std::str::from_utf8(bytes)
                .map(str::to_owned)
                .map_err(|_| CoercionError::InvalidEncoding)
        }
    }
}

/// Strict boolean coercion: exactly `{true,false,1,0,yes,no}`, case-insensitive.
pub fn to_bool(value: &str) -> Result<bool, CoercionError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(CoercionError::InvalidScalar {
            value: value.to_string(),
            expected: "bool",
        }),
    }
}

pub fn to_i64(value: &str) -> Result<i64, CoercionError> {
    value.trim().parse::<i64>().map_err(|_| CoercionError::InvalidScalar {
        value: value.to_string(),
        expected: "integer",
    })
}

pub fn to_f64(value: &str) -> Result<f64, CoercionError> {
    value.trim().parse::<f64>().map_err(|_| CoercionError::InvalidScalar {
        value: value.to_string(),
        expected: "float",
    })
}

/// Coerces each element of `values` with `elem`, stopping at the first failure and
/// wrapping it with its index so callers can report which element was bad.
pub fn to_list<T>(
    values: &[String],
    elem: impl Fn(&str) -> Result<T, CoercionError>,
) -> Result<Vec<T>, CoercionError> {
    values
        .iter()
        .enumerate()
        .map(|(index, value)| {
            elem(value).map_err(|source| CoercionError::InvalidElement {
                index,
                source: Box::new(source),
            })
        })
        .collect()
}

/// Deserializes raw JSON bytes into `T` via serde, the same round trip the teacher's
/// `Json<T>` extractor performs.
pub fn json_to<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CoercionError> {
    serde_json::from_slice(bytes).map_err(|e| CoercionError::InvalidJson(e.to_string()))
}

/// Coerces a flat string map (as produced by query-string or form parsing) into `T`
/// via a `serde_json::Value` round trip, matching the teacher's `Query<T>` extractor.
pub fn map_to<T: DeserializeOwned>(
    map: &std::collections::HashMap<String, String>,
) -> Result<T, CoercionError> {
    let value = serde_json::to_value(map).map_err(|e| CoercionError::InvalidJson(e.to_string()))?;
    serde_json::from_value(value).map_err(|e| CoercionError::InvalidJson(e.to_string()))
}
