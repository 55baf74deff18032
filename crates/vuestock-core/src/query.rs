//! Table query model in PostgREST query-string syntax
//!
//! The viewer builds these to request rows from the hosted backend, and the
//! development daemon parses and evaluates the same strings against its
//! in-memory tables, e.g.
//! `select=*&rack_id=eq.1&is_active=eq.true&order=display_order.asc`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

use crate::error::QueryError;
use crate::records::{LevelId, RackId};

/// Comparison operator of a column filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Neq,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Neq => "neq",
        }
    }

    fn parse(op: &str) -> Result<Self, QueryError> {
        match op {
            "eq" => Ok(FilterOp::Eq),
            "neq" => Ok(FilterOp::Neq),
            other => Err(QueryError::UnsupportedOperator(other.to_string())),
        }
    }
}

/// `column op value` restriction on the returned rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: String,
}

impl Filter {
    /// Check a JSON row against this filter. Missing columns compare as null.
    pub fn matches(&self, row: &Value) -> bool {
        let cell = row.get(&self.column).unwrap_or(&Value::Null);
        let equal = cell_equals(cell, &self.value);
        match self.op {
            FilterOp::Eq => equal,
            FilterOp::Neq => !equal,
        }
    }
}

fn cell_equals(cell: &Value, expected: &str) -> bool {
    match cell {
        Value::Null => expected == "null",
        Value::Bool(b) => expected.parse::<bool>().map(|e| e == *b).unwrap_or(false),
        // 100 and 100.0 are the same column value
        Value::Number(n) => match (n.as_f64(), expected.parse::<f64>()) {
            (Some(actual), Ok(wanted)) => actual == wanted,
            _ => n.to_string() == expected,
        },
        Value::String(s) => s == expected,
        other => other.to_string() == expected,
    }
}

/// Sort key of a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub ascending: bool,
}

impl OrderBy {
    /// Compare two rows. Nulls sort last in both directions.
    fn compare(&self, a: &Value, b: &Value) -> Ordering {
        let left = a.get(&self.column).unwrap_or(&Value::Null);
        let right = b.get(&self.column).unwrap_or(&Value::Null);
        match (left.is_null(), right.is_null()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            (false, false) => {}
        }
        let ordering = match (left, right) {
            (Value::Number(x), Value::Number(y)) => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
            (Value::String(x), Value::String(y)) => x.cmp(y),
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            _ => Ordering::Equal,
        };
        if self.ascending {
            ordering
        } else {
            ordering.reverse()
        }
    }
}

/// A read query against one backend table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableQuery {
    pub table: String,
    pub select: String,
    pub filters: Vec<Filter>,
    pub order: Option<OrderBy>,
}

impl TableQuery {
    /// `select * from <table>`
    pub fn select_all(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            select: "*".to_string(),
            filters: Vec::new(),
            order: None,
        }
    }

    /// Add a `column = value` filter
    pub fn eq(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filters.push(Filter {
            column: column.into(),
            op: FilterOp::Eq,
            value: value.to_string(),
        });
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(OrderBy {
            column: column.into(),
            ascending,
        });
        self
    }

    /// Render as a query string (without the leading `?`)
    pub fn to_query_string(&self) -> String {
        let mut parts = vec![format!("select={}", self.select)];
        for filter in &self.filters {
            parts.push(format!(
                "{}={}.{}",
                filter.column,
                filter.op.as_str(),
                urlencoding::encode(&filter.value)
            ));
        }
        if let Some(order) = &self.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            parts.push(format!("order={}.{}", order.column, direction));
        }
        parts.join("&")
    }

    /// Parse a query string for the given table
    pub fn parse(table: impl Into<String>, query: &str) -> Result<Self, QueryError> {
        let mut parsed = Self::select_all(table);

        for pair in query.trim_start_matches('?').split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| QueryError::Malformed(pair.to_string()))?;
            let key = decode_component(key, pair)?;
            let value = decode_component(value, pair)?;
            let value = value.as_str();

            match key.as_str() {
                "select" => parsed.select = value.to_string(),
                "order" => {
                    let mut parts = value.split('.');
                    let column = parts.next().unwrap_or_default();
                    if column.is_empty() {
                        return Err(QueryError::Malformed(pair.to_string()));
                    }
                    // Trailing modifiers such as `nullslast` are accepted and ignored
                    let ascending = match parts.next() {
                        None | Some("asc") => true,
                        Some("desc") => false,
                        Some(_) => return Err(QueryError::Malformed(pair.to_string())),
                    };
                    parsed.order = Some(OrderBy {
                        column: column.to_string(),
                        ascending,
                    });
                }
                column => {
                    let (op, operand) = value
                        .split_once('.')
                        .ok_or_else(|| QueryError::Malformed(pair.to_string()))?;
                    parsed.filters.push(Filter {
                        column: column.to_string(),
                        op: FilterOp::parse(op)?,
                        value: operand.to_string(),
                    });
                }
            }
        }

        Ok(parsed)
    }

    /// Evaluate against a table's rows: filter, then stable sort
    pub fn apply(&self, rows: &[Value]) -> Vec<Value> {
        let mut selected: Vec<Value> = rows
            .iter()
            .filter(|row| self.filters.iter().all(|f| f.matches(row)))
            .cloned()
            .collect();
        if let Some(order) = &self.order {
            selected.sort_by(|a, b| order.compare(a, b));
        }
        selected
    }
}

/// Percent-decode one key or value; `+` is a space as in form encoding
fn decode_component(raw: &str, pair: &str) -> Result<String, QueryError> {
    urlencoding::decode(&raw.replace('+', " "))
        .map(|decoded| decoded.into_owned())
        .map_err(|_| QueryError::Malformed(pair.to_string()))
}

fn default_racks_table() -> String {
    "w_vuestock_racks".to_string()
}

fn default_levels_table() -> String {
    "w_vuestock_levels".to_string()
}

fn default_slots_table() -> String {
    "w_vuestock_slots".to_string()
}

/// Names of the backend tables holding spatial records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableNames {
    #[serde(default = "default_racks_table")]
    pub racks: String,
    #[serde(default = "default_levels_table")]
    pub levels: String,
    #[serde(default = "default_slots_table")]
    pub slots: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            racks: default_racks_table(),
            levels: default_levels_table(),
            slots: default_slots_table(),
        }
    }
}

impl TableNames {
    /// `select * from <racks>`
    pub fn racks_query(&self) -> TableQuery {
        TableQuery::select_all(&self.racks)
    }

    /// Active levels of one rack in display order
    pub fn levels_query(&self, rack_id: RackId) -> TableQuery {
        TableQuery::select_all(&self.levels)
            .eq("rack_id", rack_id)
            .eq("is_active", true)
            .order_by("display_order", true)
    }

    /// Active slots of one level in display order
    pub fn slots_query(&self, level_id: LevelId) -> TableQuery {
        TableQuery::select_all(&self.slots)
            .eq("level_id", level_id)
            .eq("is_active", true)
            .order_by("display_order", true)
    }

    pub fn contains(&self, table: &str) -> bool {
        table == self.racks || table == self.levels || table == self.slots
    }
}
