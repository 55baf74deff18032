//! In-memory tables loaded from a TOML seed file

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};
use vuestock_core::{Level, QueryError, Rack, Slot, TableNames, TableQuery};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to read seed file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid seed file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to encode row: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("duplicate id {id} in table {table}")]
    DuplicateId { table: String, id: i64 },
}

/// Layout of the seed file: `[[racks]]`, `[[levels]]` and `[[slots]]` arrays
#[derive(Debug, Default, Deserialize)]
struct Seed {
    #[serde(default)]
    racks: Vec<Rack>,
    #[serde(default)]
    levels: Vec<Level>,
    #[serde(default)]
    slots: Vec<Slot>,
}

/// Rows of each table as JSON objects
#[derive(Debug, Default)]
pub struct TableStore {
    tables: HashMap<String, Vec<Value>>,
    loaded_at: DateTime<Utc>,
}

impl TableStore {
    /// Empty tables under the configured names
    pub fn empty(names: &TableNames) -> Self {
        let tables = [&names.racks, &names.levels, &names.slots]
            .into_iter()
            .map(|name| (name.clone(), Vec::new()))
            .collect();
        Self {
            tables,
            loaded_at: Utc::now(),
        }
    }

    pub fn from_seed_str(names: &TableNames, content: &str) -> Result<Self, StoreError> {
        let seed: Seed = toml::from_str(content)?;

        let mut store = Self::empty(names);
        store.insert_rows(&names.racks, &seed.racks, |r| r.id.0)?;
        store.insert_rows(&names.levels, &seed.levels, |l| l.id.0)?;
        store.insert_rows(&names.slots, &seed.slots, |s| s.id.0)?;
        Ok(store)
    }

    /// Load the seed file. A missing file gives empty tables.
    pub fn load(names: &TableNames, path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            warn!(path = %path.display(), "Seed file not found, serving empty tables");
            return Ok(Self::empty(names));
        }
        let content = std::fs::read_to_string(path)?;
        let store = Self::from_seed_str(names, &content)?;
        info!(
            path = %path.display(),
            racks = store.row_count(&names.racks),
            levels = store.row_count(&names.levels),
            slots = store.row_count(&names.slots),
            "Loaded seed"
        );
        Ok(store)
    }

    fn insert_rows<T: serde::Serialize>(
        &mut self,
        table: &str,
        records: &[T],
        id: impl Fn(&T) -> i64,
    ) -> Result<(), StoreError> {
        let mut seen = HashSet::new();
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            if !seen.insert(id(record)) {
                return Err(StoreError::DuplicateId {
                    table: table.to_string(),
                    id: id(record),
                });
            }
            rows.push(serde_json::to_value(record)?);
        }
        self.tables.insert(table.to_string(), rows);
        Ok(())
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables.get(table).map(Vec::len).unwrap_or(0)
    }

    /// Evaluate a query: filter, order, then project the selected columns
    pub fn query(&self, query: &TableQuery) -> Result<Vec<Value>, QueryError> {
        let rows = self
            .tables
            .get(&query.table)
            .ok_or_else(|| QueryError::UnknownTable(query.table.clone()))?;

        let selected = query.apply(rows);
        if query.select.trim() == "*" {
            return Ok(selected);
        }

        let columns: Vec<&str> = query.select.split(',').map(str::trim).collect();
        Ok(selected
            .into_iter()
            .map(|row| {
                let projected: Map<String, Value> = columns
                    .iter()
                    .filter_map(|c| row.get(*c).map(|v| (c.to_string(), v.clone())))
                    .collect();
                Value::Object(projected)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vuestock_core::RackId;

    const SEED: &str = r#"
[[racks]]
id = 1
rack_code = "A1"
position_x = 100.0
position_y = 50.0
rotation = 90.0

[[racks]]
id = 2
rack_code = "A2"

[[levels]]
id = 10
rack_id = 1
display_order = 1

[[levels]]
id = 11
rack_id = 1
display_order = 0

[[levels]]
id = 12
rack_id = 1
display_order = 2
is_active = false

[[slots]]
id = 100
level_id = 11
status = "free"
"#;

    #[test]
    fn test_levels_query_on_seed() {
        let names = TableNames::default();
        let store = TableStore::from_seed_str(&names, SEED).unwrap();
        assert_eq!(store.row_count("w_vuestock_racks"), 2);

        let rows = store.query(&names.levels_query(RackId(1))).unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![11, 10]);
    }

    #[test]
    fn test_unknown_table() {
        let store = TableStore::empty(&TableNames::default());
        let err = store.query(&TableQuery::select_all("users")).unwrap_err();
        assert_eq!(err, QueryError::UnknownTable("users".to_string()));
    }

    #[test]
    fn test_select_projection() {
        let names = TableNames::default();
        let store = TableStore::from_seed_str(&names, SEED).unwrap();
        let query = TableQuery::parse(&names.racks, "select=id,rack_code&order=rack_code.desc").unwrap();
        let rows = store.query(&query).unwrap();
        assert_eq!(rows[0], serde_json::json!({"id": 2, "rack_code": "A2"}));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let seed = "[[racks]]\nid = 1\nrack_code = \"A\"\n[[racks]]\nid = 1\nrack_code = \"B\"\n";
        let err = TableStore::from_seed_str(&TableNames::default(), seed).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId { id: 1, .. }));
    }

    #[test]
    fn test_missing_seed_is_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let names = TableNames::default();
        let store = TableStore::load(&names, &dir.path().join("none.toml")).unwrap();
        assert_eq!(store.row_count(&names.racks), 0);
        assert!(store.query(&names.racks_query()).unwrap().is_empty());
    }
}
