//! Row filters
//!
//! A small filter vocabulary understood by both backends: rendered as
//! PostgREST query parameters by the REST backend and evaluated directly
//! against JSON rows by the memory backend.

use serde_json::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    /// Column equals value
    Eq(Value),
    /// Column equals one of the values
    In(Vec<Value>),
    /// Case-insensitive substring match
    ILike(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub op: FilterOp,
}

/// Conjunction of conditions with optional ordering and limit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub conditions: Vec<Condition>,
    /// (column, ascending)
    pub order: Option<(String, bool)>,
    pub limit: Option<usize>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition {
            column: column.into(),
            op: FilterOp::Eq(value.into()),
        });
        self
    }

    pub fn is_in<V: Into<Value>>(
        mut self,
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.conditions.push(Condition {
            column: column.into(),
            op: FilterOp::In(values.into_iter().map(Into::into).collect()),
        });
        self
    }

    pub fn ilike(mut self, column: impl Into<String>, needle: impl Into<String>) -> Self {
        self.conditions.push(Condition {
            column: column.into(),
            op: FilterOp::ILike(needle.into()),
        });
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some((column.into(), ascending));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// PostgREST query parameters
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("select".to_string(), "*".to_string())];

        for condition in &self.conditions {
            let rendered = match &condition.op {
                FilterOp::Eq(value) => format!("eq.{}", render_scalar(value)),
                FilterOp::In(values) => {
                    let list: Vec<String> = values.iter().map(render_list_item).collect();
                    format!("in.({})", list.join(","))
                }
                FilterOp::ILike(needle) => format!("ilike.*{}*", needle.replace('*', "")),
            };
            pairs.push((condition.column.clone(), rendered));
        }

        if let Some((column, ascending)) = &self.order {
            let direction = if *ascending { "asc" } else { "desc" };
            pairs.push(("order".to_string(), format!("{column}.{direction}")));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        pairs
    }

    /// Whether a JSON row satisfies every condition
    pub fn matches(&self, row: &Value) -> bool {
        self.conditions.iter().all(|condition| {
            let field = row.get(&condition.column).unwrap_or(&Value::Null);
            match &condition.op {
                FilterOp::Eq(value) => values_equal(field, value),
                FilterOp::In(values) => values.iter().any(|v| values_equal(field, v)),
                FilterOp::ILike(needle) => field
                    .as_str()
                    .is_some_and(|s| s.to_lowercase().contains(&needle.to_lowercase())),
            }
        })
    }

    /// Apply to an in-memory row set: filter, order, limit
    pub fn apply(&self, rows: &[Value]) -> Vec<Value> {
        let mut selected: Vec<Value> = rows.iter().filter(|r| self.matches(r)).cloned().collect();

        if let Some((column, ascending)) = &self.order {
            selected.sort_by(|a, b| {
                let ord = compare_values(
                    a.get(column).unwrap_or(&Value::Null),
                    b.get(column).unwrap_or(&Value::Null),
                );
                if *ascending { ord } else { ord.reverse() }
            });
        }
        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn render_list_item(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s.replace('"', "")),
        other => render_scalar(other),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::String(x), Value::String(y)) => x == y,
        _ => a == b,
    }
}

/// Ordering used by `order_by`: nulls first, numbers numerically,
/// strings lexicographically (RFC 3339 timestamps sort chronologically)
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .unwrap_or(0.0)
            .total_cmp(&y.as_f64().unwrap_or(0.0)),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}
