//! Wire-to-value decoding.
//!
//! A wire column value is a union with one optional field per scalar kind.
//! Decoding picks the first set field in a fixed priority order (string,
//! bool, byte, i16, i32, i64, double), so a value that erroneously carries
//! several fields always decodes the same way.

use crate::error::{HiveError, Result};
use crate::rpc::{RawColumnValue, RawRow};
use crate::value::{Row, Value};

/// Decodes one wire column value.
pub fn decode_value(raw: &RawColumnValue) -> Result<Value> {
    if let Some(s) = &raw.string_val {
        return Ok(Value::String(s.clone()));
    }
    if let Some(b) = raw.bool_val {
        return Ok(Value::Bool(b));
    }
    if let Some(b) = raw.byte_val {
        return Ok(Value::I64(i64::from(b)));
    }
    if let Some(i) = raw.i16_val {
        return Ok(Value::I16(i));
    }
    if let Some(i) = raw.i32_val {
        return Ok(Value::I32(i));
    }
    if let Some(i) = raw.i64_val {
        return Ok(Value::I64(i));
    }
    if let Some(d) = raw.double_val {
        return Ok(Value::Double(d));
    }
    Err(HiveError::decode("no value set"))
}

/// Decodes a wire row positionally, checking its width first.
pub fn decode_row(raw: &RawRow, column_count: usize) -> Result<Row> {
    if raw.values.len() != column_count {
        return Err(HiveError::decode(format!(
            "Returned row has {} values, but the result has {} columns",
            raw.values.len(),
            column_count
        )));
    }

    raw.values
        .iter()
        .enumerate()
        .map(|(i, col)| {
            decode_value(col).map_err(|e| match e {
                HiveError::Decode(msg) => {
                    HiveError::decode(format!("Error converting column {i}: {msg}"))
                }
                other => other,
            })
        })
        .collect()
}
