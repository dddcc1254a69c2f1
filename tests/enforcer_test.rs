use serde_json::{json, Value};

use cloudkeep::auth::Principal;
use cloudkeep::automation::enforcer;
use cloudkeep::store::memory::{FaultOp, MemoryStore};
use cloudkeep::store::models::{activity, job_status, outcome, rule_status};
use cloudkeep::store::schema::table;
use cloudkeep::store::Filter;

fn principal(user: &str) -> Principal {
    Principal {
        user_id: user.to_string(),
    }
}

fn seed_resources(store: &MemoryStore) {
    store.seed(
        table::RESOURCES,
        vec![
            json!({"id": "r1", "user_id": "u1", "type": "vm", "tags": {"env": "dev"}, "state": "running"}),
            json!({"id": "r2", "user_id": "u1", "type": "db", "tags": {"env": "prod"}, "state": "running"}),
            json!({"id": "r3", "user_id": "u2", "type": "vm", "tags": {"env": "dev"}, "state": "running"}),
        ],
    );
}

fn of_type<'a>(rows: &'a [Value], entry_type: &str) -> Vec<&'a Value> {
    rows.iter().filter(|r| r["type"] == entry_type).collect()
}

#[tokio::test]
async fn test_no_rules_writes_single_activity_entry() {
    let store = MemoryStore::new();
    seed_resources(&store);
    store.seed(
        table::AUTOMATION_RULES,
        vec![json!({"id": "off", "user_id": "u1", "name": "paused", "match": "", "action": "stop", "status": rule_status::DISABLED})],
    );

    let summary = enforcer::enforce(&store, &principal("u1")).await.unwrap();
    assert_eq!(summary.rules_evaluated, 0);
    assert_eq!(summary.queued_total, 0);
    assert!(summary.runs.is_empty());

    assert!(store.rows(table::OPERATIONS).is_empty());
    assert!(store.rows(table::AUTOMATION_RULE_RUNS).is_empty());
    let log = store.rows(table::ACTIVITY_LOG);
    assert_eq!(log.len(), 1);
    assert_eq!(log[0]["type"], activity::AUTOMATION_RUN);
    assert_eq!(log[0]["actor"], "u1");
}

#[tokio::test]
async fn test_rules_queue_operations_for_matching_resources() {
    let store = MemoryStore::new();
    seed_resources(&store);
    store.seed(
        table::AUTOMATION_RULES,
        vec![
            json!({"id": "rule-stop", "user_id": "u1", "name": "stop dev", "match": "tags.env=dev", "action": "stop", "status": "enabled"}),
            json!({"id": "rule-scale", "user_id": "u1", "name": "scale all", "match": null, "action": "scale", "status": "enabled"}),
        ],
    );

    let summary = enforcer::enforce(&store, &principal("u1")).await.unwrap();
    assert_eq!(summary.rules_evaluated, 2);
    assert_eq!(summary.queued_total, 3);
    assert_eq!(summary.runs[0].count, 1);
    assert_eq!(summary.runs[1].count, 2);

    let ops = store.rows(table::OPERATIONS);
    assert_eq!(ops.len(), 3);
    // only resources of the principal are touched
    assert!(ops.iter().all(|o| o["user_id"] == "u1" && o["resource_id"] != "r3"));
    assert!(ops.iter().all(|o| o["status"] == job_status::QUEUED));

    let stop = &ops[0];
    assert_eq!(stop["operation"], "stop");
    assert_eq!(stop["resource_id"], "r1");
    assert_eq!(stop["params"], json!({"rule_id": "rule-stop"}));

    let scale: Vec<&Value> = ops.iter().filter(|o| o["operation"] == "scale").collect();
    assert_eq!(scale.len(), 2);
    assert_eq!(scale[0]["params"], json!({"size": "medium", "rule_id": "rule-scale"}));

    let runs = store.rows(table::AUTOMATION_RULE_RUNS);
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().all(|r| r["status"] == outcome::SUCCESS));
    assert_eq!(runs[1]["details"]["queued"], 2);

    let log = store.rows(table::ACTIVITY_LOG);
    assert_eq!(of_type(&log, activity::AUTOMATION_RULE).len(), 2);
    assert_eq!(of_type(&log, activity::AUTOMATION_RUN).len(), 1);
}

#[tokio::test]
async fn test_rule_without_matches_succeeds_with_zero() {
    let store = MemoryStore::new();
    seed_resources(&store);
    store.seed(
        table::AUTOMATION_RULES,
        vec![json!({"id": "rule-x", "user_id": "u1", "name": "nothing", "match": "type=bucket", "action": "stop", "status": "enabled"})],
    );

    let summary = enforcer::enforce(&store, &principal("u1")).await.unwrap();
    assert_eq!(summary.runs[0].status, outcome::SUCCESS);
    assert_eq!(summary.runs[0].count, 0);
    assert!(store.rows(table::OPERATIONS).is_empty());
    assert_eq!(store.rows(table::AUTOMATION_RULE_RUNS).len(), 1);
}

#[tokio::test]
async fn test_failed_insert_is_isolated_to_its_rule() {
    let store = MemoryStore::new();
    seed_resources(&store);
    store.seed(
        table::AUTOMATION_RULES,
        vec![
            json!({"id": "rule-start", "user_id": "u1", "name": "start dev", "match": "tags.env=dev", "action": "start", "status": "enabled"}),
            json!({"id": "rule-stop", "user_id": "u1", "name": "stop prod", "match": "tags.env=prod", "action": "stop", "status": "enabled"}),
        ],
    );
    store.fail_when(
        table::OPERATIONS,
        FaultOp::Insert,
        Filter::new().eq("operation", "start"),
    );

    let summary = enforcer::enforce(&store, &principal("u1")).await.unwrap();
    assert_eq!(summary.rules_evaluated, 2);
    assert_eq!(summary.queued_total, 1);

    let failed = &summary.runs[0];
    assert_eq!(failed.rule_id, "rule-start");
    assert_eq!(failed.status, outcome::ERROR);
    assert_eq!(failed.count, 0);
    assert!(failed.error.is_some());

    let ok = &summary.runs[1];
    assert_eq!(ok.status, outcome::SUCCESS);
    assert_eq!(ok.count, 1);

    let ops = store.rows(table::OPERATIONS);
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0]["resource_id"], "r2");

    let runs = store.rows(table::AUTOMATION_RULE_RUNS);
    assert_eq!(runs[0]["status"], outcome::ERROR);
    assert!(runs[0]["details"]["error"].is_string());

    let log = store.rows(table::ACTIVITY_LOG);
    let rule_entries = of_type(&log, activity::AUTOMATION_RULE);
    assert_eq!(rule_entries[0]["status"], outcome::ERROR);
    assert_eq!(rule_entries[1]["status"], outcome::SUCCESS);
}

#[tokio::test]
async fn test_unreadable_rules_abort_the_pass() {
    let store = MemoryStore::new();
    store.fail(table::AUTOMATION_RULES, FaultOp::Select);
    assert!(enforcer::enforce(&store, &principal("u1")).await.is_err());
    assert!(store.rows(table::ACTIVITY_LOG).is_empty());
}

#[tokio::test]
async fn test_activity_log_failures_do_not_fail_enforcement() {
    let store = MemoryStore::new();
    seed_resources(&store);
    store.seed(
        table::AUTOMATION_RULES,
        vec![json!({"id": "rule-stop", "user_id": "u1", "name": "stop dev", "match": "tags.env=dev", "action": "stop", "status": "enabled"})],
    );
    store.fail(table::ACTIVITY_LOG, FaultOp::Insert);
    store.fail(table::AUTOMATION_RULE_RUNS, FaultOp::Insert);

    let summary = enforcer::enforce(&store, &principal("u1")).await.unwrap();
    assert_eq!(summary.queued_total, 1);
    assert_eq!(store.rows(table::OPERATIONS).len(), 1);
}

#[tokio::test]
async fn test_repeated_enforcement_queues_duplicates() {
    let store = MemoryStore::new();
    seed_resources(&store);
    store.seed(
        table::AUTOMATION_RULES,
        vec![json!({"id": "rule-stop", "user_id": "u1", "name": "stop dev", "match": "tags.env=dev", "action": "stop", "status": rule_status::ENABLED})],
    );

    enforcer::enforce(&store, &principal("u1")).await.unwrap();
    let second = enforcer::enforce(&store, &principal("u1")).await.unwrap();
    assert_eq!(second.queued_total, 1);

    // no dedup against already queued work
    let ops = store.rows(table::OPERATIONS);
    assert_eq!(ops.len(), 2);
    assert!(ops
        .iter()
        .all(|o| o["resource_id"] == "r1" && o["status"] == job_status::QUEUED));
    assert_ne!(ops[0]["id"], ops[1]["id"]);
    assert_eq!(store.rows(table::AUTOMATION_RULE_RUNS).len(), 2);
}
