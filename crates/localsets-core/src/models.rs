//! Data models for cached set data.
//!
//! Records are kept as semi-structured JSON because their shape varies by
//! generation, by source, and by whether usage statistics were merged in.
//! The only field the cache itself manipulates is `stats`, which gets a
//! typed view in [`UsageStats`].
//!
//! - `Dataset`: ordered creature key → `Record` mapping for one format
//! - `Record`: one creature's attribute bag
//! - `UsageStats`: probability tables attached under `stats`

use std::collections::HashMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::names::normalize;

/// Field under which usage statistics are attached to a record
pub const STATS_FIELD: &str = "stats";

// ============================================================================
// Record
// ============================================================================

/// Attribute bag for one creature (level, abilities, items, moves, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Build a record from a JSON value; anything but an object is rejected
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Usage statistics merged in during sync, if any
    pub fn stats(&self) -> Option<UsageStats> {
        match self.0.get(STATS_FIELD) {
            Some(Value::Object(table)) => Some(UsageStats(table.clone())),
            _ => None,
        }
    }

    pub fn has_stats(&self) -> bool {
        matches!(self.0.get(STATS_FIELD), Some(Value::Object(_)))
    }

    pub fn set_stats(&mut self, stats: UsageStats) {
        self.0.insert(STATS_FIELD.to_string(), Value::Object(stats.0));
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

// ============================================================================
// Usage statistics
// ============================================================================

/// Probability tables for one creature.
///
/// Top-level fields such as `abilities`, `items` or `moves` map a value to
/// the probability of seeing it. `roles` maps a role name to a nested table
/// with a `weight` and its own per-field probabilities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsageStats(Map<String, Value>);

const ROLES_FIELD: &str = "roles";
const WEIGHT_FIELD: &str = "weight";

impl UsageStats {
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(table) => Some(Self(table)),
            _ => None,
        }
    }

    /// Names of the fields present, in document order
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Probability table for one field, most likely first.
    /// Non-numeric entries are skipped.
    pub fn probabilities(&self, field: &str) -> Vec<(String, f64)> {
        match self.0.get(field) {
            Some(Value::Object(table)) => sorted_probabilities(table),
            _ => Vec::new(),
        }
    }

    pub fn roles(&self) -> Vec<RoleStats> {
        let Some(Value::Object(roles)) = self.0.get(ROLES_FIELD) else {
            return Vec::new();
        };
        roles
            .iter()
            .filter_map(|(name, table)| match table {
                Value::Object(table) => Some(RoleStats {
                    name: name.clone(),
                    weight: table.get(WEIGHT_FIELD).and_then(Value::as_f64).unwrap_or(1.0),
                    table: table.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

/// Statistics for one role a creature can be generated with
#[derive(Debug, Clone, PartialEq)]
pub struct RoleStats {
    pub name: String,
    pub weight: f64,
    table: Map<String, Value>,
}

impl RoleStats {
    pub fn probabilities(&self, field: &str) -> Vec<(String, f64)> {
        match self.table.get(field) {
            Some(Value::Object(table)) => sorted_probabilities(table),
            _ => Vec::new(),
        }
    }
}

fn sorted_probabilities(table: &Map<String, Value>) -> Vec<(String, f64)> {
    let mut entries: Vec<(String, f64)> = table
        .iter()
        .filter_map(|(value, prob)| prob.as_f64().map(|p| (value.clone(), p)))
        .collect();
    entries.sort_by(|a, b| b.1.total_cmp(&a.1));
    entries
}

// ============================================================================
// Dataset
// ============================================================================

/// All records for one format, in the document's declared key order.
///
/// Keys are also indexed by their normalized form when the dataset is built,
/// so a lookup by any spelling is a hash probe. A key already in canonical
/// form always answers for its normalized name; otherwise, when several keys
/// normalize to the same form, the first one in declared order does.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    entries: Vec<(String, Record)>,
    by_key: HashMap<String, usize>,
    by_normalized: HashMap<String, usize>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record. Re-inserting a key replaces the record in place.
    pub fn insert(&mut self, key: impl Into<String>, record: Record) {
        let key = key.into();
        if let Some(&idx) = self.by_key.get(&key) {
            self.entries[idx].1 = record;
            return;
        }
        let idx = self.entries.len();
        self.by_normalized.entry(normalize(&key)).or_insert(idx);
        self.by_key.insert(key.clone(), idx);
        self.entries.push((key, record));
    }

    /// Normalize `name`, then try it as an exact key before falling back to
    /// keys that only match once normalized
    pub fn lookup(&self, name: &str) -> Option<&Record> {
        let key = normalize(name);
        self.by_key
            .get(&key)
            .or_else(|| self.by_normalized.get(&key))
            .map(|&idx| &self.entries[idx].1)
    }

    pub fn get(&self, key: &str) -> Option<&Record> {
        self.by_key.get(key).map(|&idx| &self.entries[idx].1)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Record> {
        match self.by_key.get(key) {
            Some(&idx) => Some(&mut self.entries[idx].1),
            None => None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Record)> {
        self.entries.iter().map(|(k, r)| (k.as_str(), r))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PartialEq for Dataset {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<K: Into<String>> FromIterator<(K, Record)> for Dataset {
    fn from_iter<I: IntoIterator<Item = (K, Record)>>(iter: I) -> Self {
        let mut dataset = Dataset::new();
        for (key, record) in iter {
            dataset.insert(key, record);
        }
        dataset
    }
}

impl Serialize for Dataset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, record) in &self.entries {
            map.serialize_entry(key, record)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Dataset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DatasetVisitor;

        impl<'de> Visitor<'de> for DatasetVisitor {
            type Value = Dataset;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping creature keys to records")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Dataset, A::Error> {
                let mut dataset = Dataset::new();
                while let Some((key, record)) = access.next_entry::<String, Record>()? {
                    dataset.insert(key, record);
                }
                Ok(dataset)
            }
        }

        deserializer.deserialize_map(DatasetVisitor)
    }
}
