//! Record schema inference
//!
//! Flattens one decoded record into leaf paths and the type stored at each:
//! nested map keys are joined with `.`, array elements are addressed as
//! `name[i]`.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::data_section::DataValue;

/// Leaf path -> type name, sorted by path
pub type Schema = BTreeMap<String, &'static str>;

/// Collect the leaf paths of a record
///
/// Empty maps and arrays contribute no leaves.
pub fn infer(record: &DataValue) -> Schema {
    let mut schema = Schema::new();
    explore(String::new(), record, &mut schema);
    schema
}

fn explore(prefix: String, value: &DataValue, schema: &mut Schema) {
    match value {
        DataValue::Map(entries) => {
            for (key, child) in entries {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                explore(path, child, schema);
            }
        }
        DataValue::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                explore(format!("{}[{}]", prefix, i), child, schema);
            }
        }
        leaf => {
            schema.insert(prefix, leaf.type_name());
        }
    }
}

/// Schema as a JSON object
pub fn to_json(schema: &Schema) -> Value {
    Value::Object(
        schema
            .iter()
            .map(|(path, ty)| (path.clone(), Value::String((*ty).to_string())))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_flatten() {
        let mut country = HashMap::new();
        country.insert("iso_code".to_string(), DataValue::String("DE".into()));
        country.insert("confidence".to_string(), DataValue::Double(0.5));
        let mut root = HashMap::new();
        root.insert("country".to_string(), DataValue::Map(country));
        root.insert(
            "tags".to_string(),
            DataValue::Array(vec![DataValue::String("vpn".into()), DataValue::Uint32(3)]),
        );
        root.insert("proxy".to_string(), DataValue::Bool(false));
        root.insert("empty".to_string(), DataValue::Map(HashMap::new()));

        let schema = infer(&DataValue::Map(root));
        let expected: Schema = [
            ("country.confidence", "double"),
            ("country.iso_code", "utf8_string"),
            ("proxy", "boolean"),
            ("tags[0]", "utf8_string"),
            ("tags[1]", "uint32"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        assert_eq!(schema, expected);
    }

    #[test]
    fn test_scalar_record() {
        let schema = infer(&DataValue::Int32(4));
        assert_eq!(schema.get(""), Some(&"int32"));
        assert_eq!(to_json(&schema), serde_json::json!({"": "int32"}));
    }
}
