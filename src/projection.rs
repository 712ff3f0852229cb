//! Field paths and record projection
//!
//! A field path such as `location.country.name` selects a value inside a
//! decoded record by descending one map key per segment. Paths that do not
//! resolve yield `None` rather than an error; projecting a record onto a
//! list of paths maps every path to its value or `null`.
//!
//! Batch lookups (`read --input`, `read --range`) share the same rendering:
//! every input maps to the record (or its projection), `null` when no
//! network contains the address, `"invalid_ip"` when the input is not an
//! address, or `"lookup_error: ..."` when the lookup failed.

use std::convert::Infallible;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use log::warn;
use serde_json::{Map, Value};

use crate::data_section::DataValue;
use crate::database::Database;
use crate::error::Result;
use crate::json::to_json;
use crate::network::{expand, parse_cidr};

/// Largest number of addresses a range lookup expands to
pub const MAX_RANGE_ADDRESSES: u128 = 1 << 20;

/// Marker for batch inputs that are not IP addresses
pub const INVALID_IP: &str = "invalid_ip";

/// Dot-separated path of map keys
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    text: String,
    segments: Vec<String>,
}

impl FieldPath {
    /// Split a path on `.`
    pub fn parse(text: &str) -> Self {
        Self {
            text: text.to_string(),
            segments: text.split('.').map(str::to_string).collect(),
        }
    }

    /// The path as written
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Map keys in descent order
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Follow the path through nested maps
    pub fn resolve<'a>(&self, value: &'a DataValue) -> Option<&'a DataValue> {
        self.segments
            .iter()
            .try_fold(value, |current, key| current.as_map()?.get(key))
    }
}

impl FromStr for FieldPath {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(FieldPath::parse(s))
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// `{path: value | null}` for every requested path
pub fn project(value: &DataValue, paths: &[FieldPath]) -> Value {
    let fields = paths
        .iter()
        .map(|path| {
            let resolved = path.resolve(value).map(to_json).unwrap_or(Value::Null);
            (path.as_str().to_string(), resolved)
        })
        .collect::<Map<_, _>>();
    Value::Object(fields)
}

/// The record itself when no paths are requested, its projection otherwise
pub fn render(value: &DataValue, paths: &[FieldPath]) -> Value {
    if paths.is_empty() {
        to_json(value)
    } else {
        project(value, paths)
    }
}

/// Result of looking up one batch input
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    /// A network contains the address
    Found(DataValue),
    /// No network contains the address
    NotFound,
    /// The input is not an IP address
    InvalidInput,
    /// The database could not answer
    LookupError(String),
}

impl LookupOutcome {
    /// JSON rendering used in batch output
    pub fn to_json(&self, paths: &[FieldPath]) -> Value {
        match self {
            LookupOutcome::Found(value) => render(value, paths),
            LookupOutcome::NotFound => Value::Null,
            LookupOutcome::InvalidInput => Value::String(INVALID_IP.to_string()),
            LookupOutcome::LookupError(msg) => Value::String(format!("lookup_error: {}", msg)),
        }
    }
}

/// Look up one textual input
pub fn lookup_input(db: &Database, input: &str) -> LookupOutcome {
    let Ok(ip) = input.trim().parse::<IpAddr>() else {
        return LookupOutcome::InvalidInput;
    };
    lookup_addr(db, ip)
}

/// Look up one address
pub fn lookup_addr(db: &Database, ip: IpAddr) -> LookupOutcome {
    match db.lookup(ip) {
        Ok(Some(value)) => LookupOutcome::Found(value),
        Ok(None) => LookupOutcome::NotFound,
        Err(e) => {
            warn!("lookup of {} failed: {}", ip, e);
            LookupOutcome::LookupError(e.to_string())
        }
    }
}

/// Look up every input; one failing entry never stops the batch
pub fn lookup_batch<I, S>(db: &Database, inputs: I, paths: &[FieldPath]) -> Map<String, Value>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    inputs
        .into_iter()
        .map(|input| {
            let input = input.as_ref();
            (input.to_string(), lookup_input(db, input).to_json(paths))
        })
        .collect()
}

/// Every address of a CIDR block, for range lookups
pub fn range_addresses(cidr: &str) -> Result<Vec<IpAddr>> {
    let network = parse_cidr(cidr)?;
    expand(&network, MAX_RANGE_ADDRESSES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{DatabaseWriter, WriterOptions};
    use serde_json::json;
    use std::collections::HashMap;

    fn record() -> DataValue {
        let mut names = HashMap::new();
        names.insert("name".to_string(), DataValue::String("Germany".into()));
        let mut location = HashMap::new();
        location.insert("country".to_string(), DataValue::Map(names));
        location.insert("tags".to_string(), DataValue::Array(vec![DataValue::Uint32(1)]));
        let mut root = HashMap::new();
        root.insert("location".to_string(), DataValue::Map(location));
        root.insert("score".to_string(), DataValue::Int32(5));
        DataValue::Map(root)
    }

    #[test]
    fn test_resolve() {
        let rec = record();
        assert_eq!(
            FieldPath::parse("location.country.name").resolve(&rec),
            Some(&DataValue::String("Germany".into()))
        );
        assert_eq!(FieldPath::parse("score").resolve(&rec), Some(&DataValue::Int32(5)));
        assert_eq!(FieldPath::parse("location.city").resolve(&rec), None);
        // Descending through a scalar
        assert_eq!(FieldPath::parse("score.value").resolve(&rec), None);
        // No sequence indexing
        assert_eq!(FieldPath::parse("location.tags.0").resolve(&rec), None);
        assert_eq!(FieldPath::parse("").resolve(&rec), None);
    }

    #[test]
    fn test_project() {
        let paths: Vec<FieldPath> = ["score", "location.country.name", "nope"]
            .iter()
            .map(|p| p.parse().unwrap())
            .collect();
        assert_eq!(
            project(&record(), &paths),
            json!({"score": 5, "location.country.name": "Germany", "nope": null})
        );
        assert_eq!(render(&DataValue::Uint32(3), &[]), json!(3));
    }

    #[test]
    fn test_outcome_rendering() {
        assert_eq!(LookupOutcome::NotFound.to_json(&[]), Value::Null);
        assert_eq!(LookupOutcome::InvalidInput.to_json(&[]), json!("invalid_ip"));
        assert_eq!(
            LookupOutcome::LookupError("boom".into()).to_json(&[]),
            json!("lookup_error: boom")
        );
    }

    #[test]
    fn test_batch() {
        let mut writer = DatabaseWriter::new(
            WriterOptions::default()
                .with_ip_version(crate::mmdb::IpVersion::V4)
                .with_build_epoch(0),
        )
        .unwrap();
        writer
            .insert_network("1.2.3.0/24".parse().unwrap(), &record())
            .unwrap();
        let db = Database::from_bytes(writer.build().unwrap()).unwrap();

        let paths = vec![FieldPath::parse("score")];
        let out = lookup_batch(&db, ["1.2.3.4", "5.5.5.5", "bogus", "::1"], &paths);
        assert_eq!(out["1.2.3.4"], json!({"score": 5}));
        assert_eq!(out["5.5.5.5"], Value::Null);
        assert_eq!(out["bogus"], json!("invalid_ip"));
        assert!(out["::1"].as_str().unwrap().starts_with("lookup_error: "));
    }

    #[test]
    fn test_range_addresses() {
        let addrs = range_addresses("10.0.0.5/30").unwrap();
        assert_eq!(addrs.len(), 4);
        assert_eq!(addrs[0], "10.0.0.4".parse::<IpAddr>().unwrap());

        assert!(range_addresses("10.0.0.0/11").is_err());
        assert!(range_addresses("not a cidr").is_err());
    }
}
