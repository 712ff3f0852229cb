//! Database comparison
//!
//! A [`Snapshot`] is the whole content of a database keyed by canonical
//! network string. Two snapshots are compared network by network; values
//! are compared structurally, with no type coercion between value kinds.

use std::collections::BTreeMap;

use log::warn;
use serde_json::{json, Map, Value};

use crate::data_section::DataValue;
use crate::database::Database;
use crate::json::to_json;

/// Every network of a database with its decoded value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Canonical network (`address/prefix`) -> value
    pub records: BTreeMap<String, DataValue>,
    /// Iteration and decode errors hit while building the snapshot
    pub warnings: usize,
}

impl Snapshot {
    /// Build a snapshot with one full iteration of the database
    ///
    /// A record that fails to decode is logged, counted and skipped. A
    /// search tree error stops the walk; whatever was read before it is kept.
    pub fn from_database(db: &Database) -> Self {
        let mut snapshot = Snapshot::default();
        for item in db.networks() {
            match item {
                Ok(entry) => match entry.data {
                    Ok(value) => {
                        snapshot.records.insert(entry.network.to_string(), value);
                    }
                    Err(e) => {
                        warn!("{}: {}", entry.network, e);
                        snapshot.warnings += 1;
                    }
                },
                Err(e) => {
                    warn!("error reading database: {}", e);
                    snapshot.warnings += 1;
                    break;
                }
            }
        }
        snapshot
    }

    /// Number of networks captured
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no network was captured
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<(String, DataValue)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, DataValue)>>(iter: I) -> Self {
        Snapshot {
            records: iter.into_iter().collect(),
            warnings: 0,
        }
    }
}

/// A network present in both snapshots with different values
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    /// Value in the old snapshot
    pub old: DataValue,
    /// Value in the new snapshot
    pub new: DataValue,
}

/// Differences between two snapshots
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatabaseDiff {
    /// Networks only in the new snapshot
    pub added: BTreeMap<String, DataValue>,
    /// Networks only in the old snapshot
    pub removed: BTreeMap<String, DataValue>,
    /// Networks in both whose values differ
    pub modified: BTreeMap<String, Change>,
    /// Networks in both with equal values
    pub unchanged: usize,
}

impl DatabaseDiff {
    /// `Added: a | Removed: r | Modified: m`
    pub fn summary(&self) -> String {
        format!(
            "Added: {} | Removed: {} | Modified: {}",
            self.added.len(),
            self.removed.len(),
            self.modified.len()
        )
    }

    /// True when nothing was added, removed or modified
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// `{"added": {...}, "removed": {...}, "modified": {net: {"old", "new"}}}`
    pub fn to_json(&self) -> Value {
        let values = |side: &BTreeMap<String, DataValue>| {
            side.iter()
                .map(|(net, v)| (net.clone(), to_json(v)))
                .collect::<Map<_, _>>()
        };
        let modified = self
            .modified
            .iter()
            .map(|(net, change)| {
                (
                    net.clone(),
                    json!({"old": to_json(&change.old), "new": to_json(&change.new)}),
                )
            })
            .collect::<Map<_, _>>();

        json!({
            "added": values(&self.added),
            "removed": values(&self.removed),
            "modified": modified,
        })
    }
}

/// Compare two snapshots
pub fn diff(old: &Snapshot, new: &Snapshot) -> DatabaseDiff {
    let mut result = DatabaseDiff::default();

    for (network, old_value) in &old.records {
        match new.records.get(network) {
            None => {
                result.removed.insert(network.clone(), old_value.clone());
            }
            Some(new_value) if new_value != old_value => {
                result.modified.insert(
                    network.clone(),
                    Change {
                        old: old_value.clone(),
                        new: new_value.clone(),
                    },
                );
            }
            Some(_) => result.unchanged += 1,
        }
    }

    for (network, new_value) in &new.records {
        if !old.records.contains_key(network) {
            result.added.insert(network.clone(), new_value.clone());
        }
    }

    result
}
