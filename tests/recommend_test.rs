use chrono::NaiveDate;
use serde_json::json;

use cloudkeep::auth::Principal;
use cloudkeep::insights::recommend::{self, Mode};
use cloudkeep::store::memory::{FaultOp, MemoryStore};
use cloudkeep::store::models::activity;
use cloudkeep::store::schema::table;

fn principal() -> Principal {
    Principal {
        user_id: "u1".to_string(),
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
}

fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.seed(
        table::RESOURCES,
        vec![
            json!({"id": "idle-1", "user_id": "u1", "name": "old-box", "type": "vm", "provider": "AWS", "state": "stopped", "cost_daily": 1.0}),
            json!({"id": "big-1", "user_id": "u1", "type": "ec2", "provider": "AWS", "state": "running", "cost_daily": 20.0, "cost_monthly": 600.0, "metadata": {"cpu_utilization": 55}}),
            json!({"id": "fine-1", "user_id": "u1", "type": "vm", "provider": "Azure", "state": "running", "cost_daily": 3.0, "metadata": {"cpu_avg": 40}}),
            json!({"id": "other", "user_id": "u2", "type": "vm", "state": "stopped", "cost_daily": 9.0}),
        ],
    );
    store.seed(
        table::COSTS_BREAKDOWN,
        vec![
            json!({"user_id": "u1", "service": "s3", "provider": "AWS", "cost": 100.0, "date": "2024-02-10"}),
            json!({"user_id": "u1", "service": "s3", "provider": "AWS", "cost": 180.0, "date": "2024-03-02"}),
            json!({"user_id": "u1", "service": "s3", "provider": "AWS", "cost": 20.0, "date": "2024-03-09"}),
            json!({"user_id": "u1", "service": "ec2", "provider": "AWS", "cost": 300.0, "date": "2024-02-01"}),
            json!({"user_id": "u1", "service": "ec2", "provider": "AWS", "cost": 320.0, "date": "2024-03-01"}),
            // outside both windows
            json!({"user_id": "u1", "service": "ec2", "provider": "AWS", "cost": 9000.0, "date": "2024-01-31"}),
        ],
    );
    store
}

#[tokio::test]
async fn test_generate_all_modes() {
    let store = seeded_store();

    let summary = recommend::generate(&store, &principal(), &Mode::ALL, today())
        .await
        .unwrap();
    assert_eq!(summary.inserted, 3);
    assert_eq!(
        summary.per_mode,
        vec![(Mode::Idle, 1), (Mode::Rightsizing, 1), (Mode::Anomaly, 1)]
    );

    let recs = store.rows(table::RECOMMENDATIONS);
    assert_eq!(recs.len(), 3);
    assert!(recs.iter().all(|r| r["user_id"] == "u1"));

    let idle = &recs[0];
    assert_eq!(idle["resource_id"], "idle-1");
    assert_eq!(idle["priority"], 2);
    assert_eq!(idle["impact"], 18.0);
    assert_eq!(idle["title"], "Shut down idle resource old-box");

    let rightsize = &recs[1];
    assert_eq!(rightsize["resource_id"], "big-1");
    assert_eq!(rightsize["priority"], 3);
    assert_eq!(rightsize["impact"], 210.0);

    let anomaly = &recs[2];
    assert!(anomaly["resource_id"].is_null());
    assert_eq!(anomaly["priority"], 1);
    assert_eq!(anomaly["impact"], 100.0);
    assert_eq!(anomaly["provider"], "AWS");
    assert_eq!(anomaly["metadata"]["service"], "s3");

    let log = store.rows(table::ACTIVITY_LOG);
    assert_eq!(log.len(), 1);
    assert_eq!(log[0]["type"], activity::RECOMMENDATIONS);
}

#[tokio::test]
async fn test_generate_selected_modes_only() {
    let store = seeded_store();

    let summary = recommend::generate(&store, &principal(), &[Mode::Anomaly], today())
        .await
        .unwrap();
    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.modes, vec![Mode::Anomaly]);
    assert_eq!(store.rows(table::RECOMMENDATIONS).len(), 1);
}

#[tokio::test]
async fn test_nothing_to_recommend_skips_insert() {
    let store = MemoryStore::new();
    // any insert into recommendations would fail
    store.fail(table::RECOMMENDATIONS, FaultOp::Insert);

    let summary = recommend::generate(&store, &principal(), &Mode::ALL, today())
        .await
        .unwrap();
    assert_eq!(summary.inserted, 0);
    assert!(summary.per_mode.iter().all(|(_, n)| *n == 0));
    assert_eq!(store.rows(table::ACTIVITY_LOG).len(), 1);
}

#[tokio::test]
async fn test_insert_failure_is_reported() {
    let store = seeded_store();
    store.fail(table::RECOMMENDATIONS, FaultOp::Insert);

    let result = recommend::generate(&store, &principal(), &Mode::ALL, today()).await;
    assert!(result.is_err());
    assert!(store.rows(table::RECOMMENDATIONS).is_empty());
}
