use async_trait::async_trait;
use serde_json::{json, Value};

use cloudkeep::auth::Principal;
use cloudkeep::automation::{enforcer, queue};
use cloudkeep::store::memory::{FaultOp, MemoryStore};
use cloudkeep::store::models::{activity, job_status};
use cloudkeep::store::schema::table;
use cloudkeep::store::{Filter, Query, RowStore, StoreResult};

/// Memory store that hands control back to the runtime after every select,
/// so two drains running on one task interleave between load and patch.
struct YieldingStore(MemoryStore);

#[async_trait]
impl RowStore for YieldingStore {
    async fn select(&self, table: &str, query: &Query) -> StoreResult<Vec<Value>> {
        let rows = self.0.select(table, query).await?;
        tokio::task::yield_now().await;
        Ok(rows)
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> StoreResult<Vec<Value>> {
        self.0.insert(table, rows).await
    }

    async fn patch(&self, table: &str, filter: &Filter, changes: Value) -> StoreResult<()> {
        self.0.patch(table, filter, changes).await
    }
}

fn principal(user: &str) -> Principal {
    Principal {
        user_id: user.to_string(),
    }
}

fn queued_op(id: &str, user: &str, operation: &str) -> Value {
    json!({
        "id": id,
        "user_id": user,
        "resource_id": format!("res-{}", id),
        "operation": operation,
        "params": {},
        "status": "queued"
    })
}

#[tokio::test]
async fn test_drain_marks_operations_successful() {
    let store = MemoryStore::new();
    store.seed(
        table::OPERATIONS,
        vec![
            queued_op("o1", "u1", "stop"),
            queued_op("o2", "u1", "frobnicate"),
            queued_op("o3", "u2", "stop"),
            json!({"id": "o4", "user_id": "u1", "operation": "start", "status": "success"}),
        ],
    );

    let summary = queue::drain(&store, &principal("u1"), queue::DEFAULT_MAX)
        .await
        .unwrap();
    assert_eq!(summary.operations_processed, 2);
    assert_eq!(summary.recommendation_actions_processed, 0);

    let ops = store.rows(table::OPERATIONS);
    assert_eq!(ops[0]["status"], job_status::SUCCESS);
    assert_eq!(ops[0]["result"], json!({"ok": true, "details": "Resource stopped"}));
    assert_eq!(ops[1]["status"], job_status::SUCCESS);
    assert_eq!(ops[1]["result"]["details"], "No-op");
    // another user's queue is untouched
    assert_eq!(ops[2]["status"], job_status::QUEUED);
    assert!(ops[3].get("result").is_none());

    let log = store.rows(table::ACTIVITY_LOG);
    assert_eq!(log.iter().filter(|e| e["type"] == activity::OPERATION).count(), 2);
    assert_eq!(log.last().unwrap()["type"], activity::QUEUE_RUN);

    // a second pass finds nothing left and does not revert anything
    let again = queue::drain(&store, &principal("u1"), queue::DEFAULT_MAX)
        .await
        .unwrap();
    assert_eq!(again.operations_processed, 0);
    assert_eq!(store.rows(table::OPERATIONS)[0]["status"], job_status::SUCCESS);
}

#[tokio::test]
async fn test_drain_budgets_each_table_separately() {
    let store = MemoryStore::new();
    store.seed(
        table::OPERATIONS,
        (0..5)
            .map(|i| queued_op(&format!("o{}", i), "u1", "start"))
            .collect(),
    );
    store.seed(
        table::RECOMMENDATION_ACTIONS,
        (0..3)
            .map(|i| json!({"id": format!("a{}", i), "user_id": "u1", "recommendation_id": format!("rec-{}", i), "status": "queued"}))
            .collect(),
    );

    let summary = queue::drain(&store, &principal("u1"), 2).await.unwrap();
    assert_eq!(summary.operations_processed, 2);
    assert_eq!(summary.recommendation_actions_processed, 2);

    let still_queued = store
        .rows(table::OPERATIONS)
        .iter()
        .filter(|o| o["status"] == job_status::QUEUED)
        .count();
    assert_eq!(still_queued, 3);

    let actions = store.rows(table::RECOMMENDATION_ACTIONS);
    assert_eq!(actions[0]["status"], job_status::SUCCESS);
    assert_eq!(actions[0]["result"]["message"], "Applied recommendation rec-0");
    assert_eq!(actions[2]["status"], job_status::QUEUED);
}

#[tokio::test]
async fn test_failed_write_leaves_row_running_and_stops() {
    let store = MemoryStore::new();
    store.seed(
        table::OPERATIONS,
        vec![queued_op("o1", "u1", "stop"), queued_op("o2", "u1", "stop")],
    );
    store.fail_when(
        table::OPERATIONS,
        FaultOp::Patch,
        Filter::new().eq("status", job_status::SUCCESS),
    );

    let result = queue::drain(&store, &principal("u1"), queue::DEFAULT_MAX).await;
    assert!(result.is_err());

    let ops = store.rows(table::OPERATIONS);
    assert_eq!(ops[0]["status"], job_status::RUNNING);
    assert_eq!(ops[1]["status"], job_status::QUEUED);
    assert!(store
        .rows(table::ACTIVITY_LOG)
        .iter()
        .all(|e| e["type"] != activity::QUEUE_RUN));
}

#[tokio::test]
async fn test_enforce_then_drain() {
    let store = MemoryStore::new();
    store.seed(
        table::RESOURCES,
        vec![
            json!({"id": "r1", "user_id": "u1", "type": "vm", "tags": {"env": "dev"}}),
            json!({"id": "r2", "user_id": "u1", "type": "vm", "tags": {"env": "prod"}}),
        ],
    );
    store.seed(
        table::AUTOMATION_RULES,
        vec![json!({"id": "rule-1", "user_id": "u1", "name": "stop dev vms", "match": "type=vm AND tags.env=dev", "action": "stop", "status": "enabled"})],
    );

    let enforced = enforcer::enforce(&store, &principal("u1")).await.unwrap();
    assert_eq!(enforced.queued_total, 1);

    let drained = queue::drain(&store, &principal("u1"), queue::DEFAULT_MAX)
        .await
        .unwrap();
    assert_eq!(drained.operations_processed, 1);

    let ops = store.rows(table::OPERATIONS);
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0]["resource_id"], "r1");
    assert_eq!(ops[0]["operation"], "stop");
    assert_eq!(ops[0]["status"], job_status::SUCCESS);
    assert_eq!(ops[0]["result"]["details"], "Resource stopped");
    assert!(ops.iter().all(|o| o["resource_id"] != "r2"));
}

#[tokio::test]
async fn test_drain_resumes_after_store_recovers() {
    let store = MemoryStore::new();
    store.seed(table::OPERATIONS, vec![queued_op("o1", "u1", "start")]);
    store.fail(table::OPERATIONS, FaultOp::Select);
    assert!(queue::drain(&store, &principal("u1"), queue::DEFAULT_MAX)
        .await
        .is_err());
    assert_eq!(store.rows(table::OPERATIONS)[0]["status"], job_status::QUEUED);

    store.clear_faults();
    let summary = queue::drain(&store, &principal("u1"), queue::DEFAULT_MAX)
        .await
        .unwrap();
    assert_eq!(summary.operations_processed, 1);
    assert_eq!(store.rows(table::OPERATIONS)[0]["result"]["details"], "Resource started");
}

#[tokio::test]
async fn test_concurrent_drains_both_execute_the_same_row() {
    let store = YieldingStore(MemoryStore::new());
    store
        .0
        .seed(table::OPERATIONS, vec![queued_op("o1", "u1", "stop")]);

    let p = principal("u1");
    let (a, b) = tokio::join!(
        queue::drain(&store, &p, queue::DEFAULT_MAX),
        queue::drain(&store, &p, queue::DEFAULT_MAX)
    );
    // without a claim step each pass loads o1 while it is still queued
    assert_eq!(a.unwrap().operations_processed, 1);
    assert_eq!(b.unwrap().operations_processed, 1);

    let executed: Vec<Value> = store
        .0
        .rows(table::ACTIVITY_LOG)
        .into_iter()
        .filter(|e| e["type"] == activity::OPERATION)
        .collect();
    assert_eq!(executed.len(), 2);
    assert!(executed
        .iter()
        .all(|e| e["summary"] == "Executed stop on resource res-o1"));
    assert_eq!(store.0.rows(table::OPERATIONS)[0]["status"], job_status::SUCCESS);
}
