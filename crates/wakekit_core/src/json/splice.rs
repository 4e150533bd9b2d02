//! Copy already-serialized JSON into a [`JsonWriter`].
//!
//! The writer only appends tokens; it cannot take a chunk of pre-built
//! JSON text. Splicing parses the text and replays it token by token.
//!
//! Numbers are normalized on the way through: a number whose fractional
//! part is zero (and that fits an `i64`) is written as an integer, anything
//! else as a float. `1.0` therefore comes out as `1` and `1e3` as `1000`;
//! the output is equivalent JSON, not a byte-for-byte copy.

use super::writer::JsonWriter;
use crate::error::CoreResult;
use serde_json::{Number, Value};

/// Parses `src` and replays it into `writer`.
///
/// # Errors
///
/// Returns an error if `src` is not valid JSON. Nothing is written in that
/// case.
pub fn splice_str(src: &str, writer: &mut JsonWriter) -> CoreResult<()> {
    let value: Value = serde_json::from_str(src)?;
    splice_value(&value, writer);
    Ok(())
}

/// Replays a parsed value into `writer`.
pub fn splice_value(value: &Value, writer: &mut JsonWriter) {
    match value {
        Value::Null => {
            writer.null_value();
        }
        Value::Bool(b) => {
            writer.value(b);
        }
        Value::Number(n) => splice_number(n, writer),
        Value::String(s) => {
            writer.value(s.as_str());
        }
        Value::Array(items) => {
            writer.begin_array();
            for item in items {
                splice_value(item, writer);
            }
            writer.end_array();
        }
        Value::Object(map) => {
            writer.begin_object();
            for (key, item) in map {
                writer.name(key);
                splice_value(item, writer);
            }
            writer.end_object();
        }
    }
}

/// Renders a value to a standalone string with the same normalization.
#[must_use]
pub fn normalized(value: &Value) -> String {
    let mut writer = JsonWriter::unbounded();
    splice_value(value, &mut writer);
    writer.into_string()
}

// i64 bounds as exactly representable f64s
const I64_MIN_F64: f64 = -9_223_372_036_854_775_808.0;
const I64_LIMIT_F64: f64 = 9_223_372_036_854_775_808.0;

fn splice_number(n: &Number, writer: &mut JsonWriter) {
    if let Some(i) = n.as_i64() {
        writer.value(&i);
    } else if let Some(u) = n.as_u64() {
        writer.value(&u);
    } else if let Some(f) = n.as_f64() {
        if f.is_finite() && f.fract() == 0.0 && (I64_MIN_F64..I64_LIMIT_F64).contains(&f) {
            #[allow(clippy::cast_possible_truncation)]
            let i = f as i64;
            writer.value(&i);
        } else {
            writer.value(&f);
        }
    } else {
        writer.null_value();
    }
}
