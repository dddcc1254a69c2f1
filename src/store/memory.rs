use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use super::backend::RowStore;
use super::filter::{Filter, Query};
use super::{StoreError, StoreResult};

/// Which store call a fault applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOp {
    Select,
    Insert,
    Patch,
}

/// A rule that makes matching store calls fail.
///
/// For inserts the filter is applied to each inserted row, for patches to
/// the `changes` body, for selects it is ignored.
#[derive(Debug, Clone)]
struct Fault {
    table: String,
    op: FaultOp,
    filter: Filter,
}

/// In-process row store. Tables are created on first write; rows keep
/// insertion order.
#[derive(Default)]
pub struct MemoryStore {
    tables: DashMap<String, Vec<Value>>,
    faults: Mutex<Vec<Fault>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a table without going through the fault rules.
    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        let mut entry = self.tables.entry(table.to_string()).or_default();
        for row in rows {
            entry.push(with_defaults(row));
        }
    }

    /// Snapshot every row of a table.
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .get(table)
            .map(|rows| rows.value().clone())
            .unwrap_or_default()
    }

    /// Make every call of `op` on `table` fail.
    pub fn fail(&self, table: &str, op: FaultOp) {
        self.fail_when(table, op, Filter::new());
    }

    /// Make calls of `op` on `table` fail when the filter matches (see [`Fault`]).
    pub fn fail_when(&self, table: &str, op: FaultOp, filter: Filter) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.push(Fault {
                table: table.to_string(),
                op,
                filter,
            });
        }
    }

    pub fn clear_faults(&self) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.clear();
        }
    }

    fn check(&self, table: &str, op: FaultOp, bodies: &[&Value]) -> StoreResult<()> {
        let faults = self
            .faults
            .lock()
            .map_err(|_| StoreError::Unavailable("fault registry poisoned".to_string()))?;
        let tripped = faults.iter().any(|f| {
            f.table == table
                && f.op == op
                && (op == FaultOp::Select || bodies.iter().any(|b| f.filter.matches(b)))
        });
        if !tripped {
            return Ok(());
        }
        Err(match op {
            FaultOp::Select => StoreError::Unavailable(format!("{} is unreachable", table)),
            FaultOp::Insert | FaultOp::Patch => StoreError::Rejected {
                table: table.to_string(),
                reason: "injected failure".to_string(),
            },
        })
    }
}

fn with_defaults(mut row: Value) -> Value {
    if let Some(obj) = row.as_object_mut() {
        if !obj.get("id").is_some_and(|v| !v.is_null()) {
            obj.insert(
                "id".to_string(),
                Value::String(uuid::Uuid::new_v4().to_string()),
            );
        }
    }
    row
}

#[async_trait]
impl RowStore for MemoryStore {
    async fn select(&self, table: &str, query: &Query) -> StoreResult<Vec<Value>> {
        self.check(table, FaultOp::Select, &[])?;
        let rows = self
            .tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|r| query.filter.matches(r))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(query.finish(rows))
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> StoreResult<Vec<Value>> {
        self.check(table, FaultOp::Insert, &rows.iter().collect::<Vec<_>>())?;
        let rows: Vec<Value> = rows.into_iter().map(with_defaults).collect();
        self.tables
            .entry(table.to_string())
            .or_default()
            .extend(rows.iter().cloned());
        Ok(rows)
    }

    async fn patch(&self, table: &str, filter: &Filter, changes: Value) -> StoreResult<()> {
        self.check(table, FaultOp::Patch, &[&changes])?;
        let Some(changes) = changes.as_object() else {
            return Err(StoreError::Rejected {
                table: table.to_string(),
                reason: "patch body must be an object".to_string(),
            });
        };
        if let Some(mut rows) = self.tables.get_mut(table) {
            for row in rows.iter_mut().filter(|r| filter.matches(r)) {
                if let Some(obj) = row.as_object_mut() {
                    for (k, v) in changes {
                        obj.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        Ok(())
    }
}
