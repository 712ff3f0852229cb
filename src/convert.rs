//! Document value conversion
//!
//! Maps dynamically-typed JSON values onto the small set of kinds the
//! database stores. The conversion is total: every JSON value has a
//! storable form.
//!
//! | JSON                         | Stored as                 |
//! |------------------------------|---------------------------|
//! | `null`                       | empty text                |
//! | string                       | text                      |
//! | `true` / `false`             | boolean                   |
//! | integer in `i32` range       | int32                     |
//! | integer in `(i32::MAX, u32::MAX]` | uint32               |
//! | any other number             | float (64-bit)            |
//! | object                       | map (converted recursively) |
//! | array                        | list (order preserved)    |

use std::collections::HashMap;

use serde_json::{Map, Number, Value};

use crate::data_section::DataValue;

/// Dynamically-typed document value
pub type DocumentValue = Value;

/// Value kinds that can be written to the database
#[derive(Debug, Clone, PartialEq)]
pub enum StorableValue {
    /// UTF-8 text
    Text(String),
    /// Boolean
    Boolean(bool),
    /// 64-bit float
    Float(f64),
    /// Signed 32-bit integer
    Int32(i32),
    /// Unsigned 32-bit integer
    UInt32(u32),
    /// Text-keyed map
    Map(HashMap<String, StorableValue>),
    /// Ordered list
    List(Vec<StorableValue>),
}

/// Convert one document value
pub fn convert(value: &DocumentValue) -> StorableValue {
    match value {
        // The database has no null; an empty string stands in for it
        Value::Null => StorableValue::Text(String::new()),
        Value::String(s) => StorableValue::Text(s.clone()),
        Value::Bool(b) => StorableValue::Boolean(*b),
        Value::Number(n) => convert_number(n),
        Value::Object(map) => StorableValue::Map(convert_fields(map)),
        Value::Array(items) => StorableValue::List(items.iter().map(convert).collect()),
    }
}

/// Convert a document entry's field mapping into a map record
pub fn convert_record(fields: &Map<String, DocumentValue>) -> StorableValue {
    StorableValue::Map(convert_fields(fields))
}

fn convert_fields(fields: &Map<String, DocumentValue>) -> HashMap<String, StorableValue> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), convert(v)))
        .collect()
}

fn convert_number(n: &Number) -> StorableValue {
    // Integral literals parse as i64/u64; anything with a fraction or
    // exponent parses as f64
    if let Some(i) = n.as_i64() {
        if let Ok(small) = i32::try_from(i) {
            return StorableValue::Int32(small);
        }
        if let Ok(unsigned) = u32::try_from(i) {
            return StorableValue::UInt32(unsigned);
        }
        return StorableValue::Float(i as f64);
    }
    if let Some(u) = n.as_u64() {
        return StorableValue::Float(u as f64);
    }
    match n.as_f64() {
        Some(f) => StorableValue::Float(f),
        None => StorableValue::Text(n.to_string()),
    }
}

impl From<StorableValue> for DataValue {
    fn from(value: StorableValue) -> Self {
        match value {
            StorableValue::Text(s) => DataValue::String(s),
            StorableValue::Boolean(b) => DataValue::Bool(b),
            StorableValue::Float(f) => DataValue::Double(f),
            StorableValue::Int32(i) => DataValue::Int32(i),
            StorableValue::UInt32(u) => DataValue::Uint32(u),
            StorableValue::Map(m) => {
                DataValue::Map(m.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
            StorableValue::List(items) => {
                DataValue::Array(items.into_iter().map(DataValue::from).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_scalars() {
        assert_eq!(convert(&json!(null)), StorableValue::Text(String::new()));
        assert_eq!(convert(&json!("hi")), StorableValue::Text("hi".to_string()));
        assert_eq!(convert(&json!(true)), StorableValue::Boolean(true));
        assert_eq!(convert(&json!(3.5)), StorableValue::Float(3.5));
    }

    #[test]
    fn test_integer_boundaries() {
        assert_eq!(convert(&json!(90)), StorableValue::Int32(90));
        assert_eq!(convert(&json!(-5)), StorableValue::Int32(-5));
        assert_eq!(convert(&json!(2147483647)), StorableValue::Int32(i32::MAX));
        assert_eq!(convert(&json!(2147483648u64)), StorableValue::UInt32(2147483648));
        assert_eq!(convert(&json!(4294967295u64)), StorableValue::UInt32(u32::MAX));
        assert_eq!(
            convert(&json!(4294967296u64)),
            StorableValue::Float(4294967296.0)
        );
        assert_eq!(
            convert(&json!(-2147483649i64)),
            StorableValue::Float(-2147483649.0)
        );
        assert_eq!(
            convert(&json!(u64::MAX)),
            StorableValue::Float(u64::MAX as f64)
        );
    }

    #[test]
    fn test_fractional_literal_stays_float() {
        let v: Value = serde_json::from_str("1.0").unwrap();
        assert_eq!(convert(&v), StorableValue::Float(1.0));
        let e: Value = serde_json::from_str("1e3").unwrap();
        assert_eq!(convert(&e), StorableValue::Float(1000.0));
    }

    #[test]
    fn test_nested_structure() {
        let v = json!({
            "is_proxy": "true",
            "threat_score": 90,
            "location": {"country": "US", "confidence": 0.75},
            "tags": ["vpn", null, 1]
        });

        let StorableValue::Map(map) = convert(&v) else {
            panic!("expected map");
        };
        assert_eq!(map["threat_score"], StorableValue::Int32(90));
        assert_eq!(
            map["tags"],
            StorableValue::List(vec![
                StorableValue::Text("vpn".to_string()),
                StorableValue::Text(String::new()),
                StorableValue::Int32(1),
            ])
        );
        let StorableValue::Map(location) = &map["location"] else {
            panic!("expected nested map");
        };
        assert_eq!(location["confidence"], StorableValue::Float(0.75));
    }

    #[test]
    fn test_into_data_value() {
        let stored = convert(&json!({"a": [1, 2.5, "x", false]}));
        let data: DataValue = stored.into();
        let mut expected = HashMap::new();
        expected.insert(
            "a".to_string(),
            DataValue::Array(vec![
                DataValue::Int32(1),
                DataValue::Double(2.5),
                DataValue::String("x".to_string()),
                DataValue::Bool(false),
            ]),
        );
        assert_eq!(data, DataValue::Map(expected));
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|i| json!(i)),
            any::<u64>().prop_map(|u| json!(u)),
            (-1e12f64..1e12f64).prop_map(|f| json!(f)),
            "[a-z]{0,8}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 32, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::hash_map("[a-z]{1,4}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    fn same_shape(doc: &Value, stored: &StorableValue) -> bool {
        match (doc, stored) {
            (Value::Null, StorableValue::Text(s)) => s.is_empty(),
            (Value::String(a), StorableValue::Text(b)) => a == b,
            (Value::Bool(a), StorableValue::Boolean(b)) => a == b,
            (Value::Number(_), StorableValue::Int32(_))
            | (Value::Number(_), StorableValue::UInt32(_))
            | (Value::Number(_), StorableValue::Float(_)) => true,
            (Value::Array(a), StorableValue::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| same_shape(x, y))
            }
            (Value::Object(a), StorableValue::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).map(|s| same_shape(v, s)).unwrap_or(false))
            }
            _ => false,
        }
    }

    proptest! {
        #[test]
        fn prop_conversion_preserves_shape(doc in arb_json()) {
            let stored = convert(&doc);
            prop_assert!(same_shape(&doc, &stored));
        }

        #[test]
        fn prop_integral_values_round_trip_exactly(i in any::<i32>()) {
            prop_assert_eq!(convert(&json!(i)), StorableValue::Int32(i));
        }
    }
}
