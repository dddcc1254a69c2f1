use std::cmp::Ordering;

use serde_json::Value;

/// A single column predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(String, Value),
    Gte(String, Value),
    Lt(String, Value),
}

/// Conjunction of column predicates, the only filter shape the row-store
/// contract supports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for the `user_id = principal` scope every query carries.
    pub fn user(user_id: &str) -> Self {
        Self::new().eq("user_id", user_id)
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Eq(column.to_string(), value.into()));
        self
    }

    pub fn gte(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Gte(column.to_string(), value.into()));
        self
    }

    pub fn lt(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Lt(column.to_string(), value.into()));
        self
    }

    /// Evaluate the filter against a JSON row. Used by the local backends.
    pub fn matches(&self, row: &Value) -> bool {
        self.conditions.iter().all(|c| match c {
            Condition::Eq(col, expected) => {
                let actual = row.get(col).unwrap_or(&Value::Null);
                compare(actual, expected) == Some(Ordering::Equal)
            }
            Condition::Gte(col, bound) => matches!(
                row.get(col).and_then(|v| compare(v, bound)),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Condition::Lt(col, bound) => matches!(
                row.get(col).and_then(|v| compare(v, bound)),
                Some(Ordering::Less)
            ),
        })
    }

    /// Render as PostgREST query pairs (`column=op.value`).
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        self.conditions
            .iter()
            .map(|c| match c {
                Condition::Eq(col, Value::Null) => (col.clone(), "is.null".to_string()),
                Condition::Eq(col, v) => (col.clone(), format!("eq.{}", render(v))),
                Condition::Gte(col, v) => (col.clone(), format!("gte.{}", render(v))),
                Condition::Lt(col, v) => (col.clone(), format!("lt.{}", render(v))),
            })
            .collect()
    }
}

/// A filtered select with optional ordering and row limit.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filter: Filter,
    pub order_by: Option<(String, bool)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order_by = Some((column.to_string(), ascending));
        self
    }

    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("select".to_string(), "*".to_string())];
        pairs.extend(self.filter.to_query_pairs());
        if let Some((col, asc)) = &self.order_by {
            let dir = if *asc { "asc" } else { "desc" };
            pairs.push(("order".to_string(), format!("{}.{}", col, dir)));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        pairs
    }

    /// Apply ordering and limit to rows that already passed the filter.
    pub fn finish(&self, mut rows: Vec<Value>) -> Vec<Value> {
        if let Some((col, asc)) = &self.order_by {
            rows.sort_by(|a, b| {
                let ord = compare(
                    a.get(col).unwrap_or(&Value::Null),
                    b.get(col).unwrap_or(&Value::Null),
                )
                .unwrap_or(Ordering::Equal);
                if *asc {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }
        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }
        rows
    }
}

fn render(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        // numeric columns may come back as strings from some backends
        (Value::String(x), Value::Number(y)) => x.parse::<f64>().ok()?.partial_cmp(&y.as_f64()?),
        (Value::Number(x), Value::String(y)) => x.as_f64()?.partial_cmp(&y.parse::<f64>().ok()?),
        _ => None,
    }
}
