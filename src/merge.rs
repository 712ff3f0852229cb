//! Merge strategies for overlapping inserts
//!
//! When a network is inserted over addresses that already carry a value,
//! the strategy decides what the covered addresses end up with.

use std::fmt;
use std::str::FromStr;

use crate::data_section::DataValue;
use crate::error::MmdbioError;

/// How a new value combines with an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeStrategy {
    /// The new value replaces the old one
    #[default]
    Replace,
    /// Maps are combined one level deep; keys from the new value win
    TopLevel,
    /// Maps are combined recursively and arrays element by element
    Recurse,
}

impl MergeStrategy {
    /// Combine `existing` (if any) with `new`
    pub fn merge(self, existing: Option<&DataValue>, new: &DataValue) -> DataValue {
        let Some(existing) = existing else {
            return new.clone();
        };

        match self {
            MergeStrategy::Replace => new.clone(),
            MergeStrategy::TopLevel => match (existing, new) {
                (DataValue::Map(old), DataValue::Map(incoming)) => {
                    let mut merged = old.clone();
                    for (k, v) in incoming {
                        merged.insert(k.clone(), v.clone());
                    }
                    DataValue::Map(merged)
                }
                _ => new.clone(),
            },
            MergeStrategy::Recurse => deep_merge(existing, new),
        }
    }
}

fn deep_merge(existing: &DataValue, new: &DataValue) -> DataValue {
    match (existing, new) {
        (DataValue::Map(old), DataValue::Map(incoming)) => {
            let mut merged = old.clone();
            for (k, v) in incoming {
                let value = match old.get(k) {
                    Some(prev) => deep_merge(prev, v),
                    None => v.clone(),
                };
                merged.insert(k.clone(), value);
            }
            DataValue::Map(merged)
        }
        (DataValue::Array(old), DataValue::Array(incoming)) => {
            let len = old.len().max(incoming.len());
            let merged = (0..len)
                .filter_map(|i| match (old.get(i), incoming.get(i)) {
                    (Some(a), Some(b)) => Some(deep_merge(a, b)),
                    (Some(v), None) | (None, Some(v)) => Some(v.clone()),
                    (None, None) => None,
                })
                .collect();
            DataValue::Array(merged)
        }
        _ => new.clone(),
    }
}

impl FromStr for MergeStrategy {
    type Err = MmdbioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "replace" => Ok(MergeStrategy::Replace),
            "toplevel" | "shallow" => Ok(MergeStrategy::TopLevel),
            "recurse" | "deep" => Ok(MergeStrategy::Recurse),
            _ => Err(MmdbioError::Config(
                "--merge must be one of: none, toplevel, recurse".to_string(),
            )),
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MergeStrategy::Replace => "none",
            MergeStrategy::TopLevel => "toplevel",
            MergeStrategy::Recurse => "recurse",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn map(pairs: &[(&str, DataValue)]) -> DataValue {
        DataValue::Map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<HashMap<_, _>>(),
        )
    }

    fn s(v: &str) -> DataValue {
        DataValue::String(v.to_string())
    }

    #[test]
    fn test_parse_strategy_names() {
        assert_eq!("none".parse::<MergeStrategy>().unwrap(), MergeStrategy::Replace);
        assert_eq!("toplevel".parse::<MergeStrategy>().unwrap(), MergeStrategy::TopLevel);
        assert_eq!("Recurse".parse::<MergeStrategy>().unwrap(), MergeStrategy::Recurse);
        let err = "sideways".parse::<MergeStrategy>().unwrap_err();
        assert!(err.to_string().contains("none, toplevel, recurse"));
    }

    #[test]
    fn test_replace() {
        let old = map(&[("a", s("1"))]);
        let new = map(&[("b", s("2"))]);
        assert_eq!(MergeStrategy::Replace.merge(Some(&old), &new), new);
    }

    #[test]
    fn test_top_level_keeps_old_keys() {
        let old = map(&[("a", s("1")), ("nested", map(&[("x", s("old"))]))]);
        let new = map(&[("b", s("2")), ("nested", map(&[("y", s("new"))]))]);
        let merged = MergeStrategy::TopLevel.merge(Some(&old), &new);
        assert_eq!(
            merged,
            map(&[("a", s("1")), ("b", s("2")), ("nested", map(&[("y", s("new"))]))])
        );
    }

    #[test]
    fn test_recurse_merges_nested_maps_and_arrays() {
        let old = map(&[
            ("nested", map(&[("x", s("old"))])),
            ("list", DataValue::Array(vec![s("a"), s("b"), s("c")])),
        ]);
        let new = map(&[
            ("nested", map(&[("y", s("new"))])),
            ("list", DataValue::Array(vec![s("z")])),
        ]);
        let merged = MergeStrategy::Recurse.merge(Some(&old), &new);
        assert_eq!(
            merged,
            map(&[
                ("nested", map(&[("x", s("old")), ("y", s("new"))])),
                ("list", DataValue::Array(vec![s("z"), s("b"), s("c")])),
            ])
        );
    }

    #[test]
    fn test_no_existing_value() {
        let new = s("v");
        for strategy in [MergeStrategy::Replace, MergeStrategy::TopLevel, MergeStrategy::Recurse] {
            assert_eq!(strategy.merge(None, &new), new);
        }
    }
}
