//! Decoded values as JSON
//!
//! Map keys come out sorted (`serde_json::Map` is ordered by key), which
//! keeps exported and printed output stable between runs.

use serde_json::{json, Map, Value};

use crate::data_section::DataValue;

/// Render a decoded value as JSON
///
/// `uint128` values that do not fit in 64 bits are rendered as decimal
/// strings. Non-finite floats become `null`.
pub fn to_json(data: &DataValue) -> Value {
    match data {
        DataValue::String(s) => json!(s),
        DataValue::Double(d) => json!(d),
        DataValue::Bytes(b) => json!(b),
        DataValue::Uint16(u) => json!(u),
        DataValue::Uint32(u) => json!(u),
        DataValue::Uint64(u) => json!(u),
        DataValue::Uint128(u) => match u64::try_from(*u) {
            Ok(small) => json!(small),
            Err(_) => json!(u.to_string()),
        },
        DataValue::Int32(i) => json!(i),
        DataValue::Bool(b) => json!(b),
        DataValue::Float(f) => json!(f),
        DataValue::Map(entries) => Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), to_json(v)))
                .collect::<Map<_, _>>(),
        ),
        DataValue::Array(items) => Value::Array(items.iter().map(to_json).collect()),
    }
}
