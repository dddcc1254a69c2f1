use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::enforcer::DEFAULT_SCALE_SIZE;
use crate::audit;
use crate::auth::Principal;
use crate::store::models::{activity, job_status, now, Operation, RecommendationAction};
use crate::store::schema::table;
use crate::store::{select_as, Filter, Query, RowStore, StoreResult};

/// Default number of rows drained per table and invocation.
pub const DEFAULT_MAX: usize = 20;

/// Upper bound on the per-table batch a caller may request.
pub const MAX_BATCH: usize = 100;

/// Resolve a caller-supplied batch size: absent or non-positive means `default`.
pub fn batch_size(requested: Option<i64>, default: usize) -> usize {
    match requested {
        Some(n) if n > 0 => (n as usize).min(MAX_BATCH),
        _ => default.clamp(1, MAX_BATCH),
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DrainSummary {
    pub operations_processed: usize,
    pub recommendation_actions_processed: usize,
}

impl std::fmt::Display for DrainSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Queue drained! Operations: {} processed. Recommendation actions: {} processed.",
            self.operations_processed, self.recommendation_actions_processed
        )
    }
}

/// Simulated effect of an operation. Unknown operations succeed as a no-op.
pub fn simulate(operation: &str, params: &Value) -> Value {
    let details = match operation {
        "start" => "Resource started".to_string(),
        "stop" => "Resource stopped".to_string(),
        "scale" => {
            let size = params
                .get("size")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_SCALE_SIZE);
            format!("Scaled to {}", size)
        }
        _ => "No-op".to_string(),
    };
    json!({ "ok": true, "details": details })
}

/// Drain queued operations and recommendation actions for `principal`.
///
/// Each table gets its own `max` budget. Items are processed in load order;
/// a failed store write aborts the remaining items and may leave the current
/// row in `running`.
// TODO: claim rows with a conditional patch (`status=eq.queued`) before
// executing, and move rows to `error` when a write fails, once operations
// call real provider APIs.
pub async fn drain(
    store: &dyn RowStore,
    principal: &Principal,
    max: usize,
) -> StoreResult<DrainSummary> {
    let user_id = principal.user_id.as_str();
    let queued = Filter::user(user_id).eq("status", job_status::QUEUED);

    let operations: Vec<Operation> = select_as(
        store,
        table::OPERATIONS,
        &Query::new(queued.clone()).limit(max),
    )
    .await?;
    let actions: Vec<RecommendationAction> = select_as(
        store,
        table::RECOMMENDATION_ACTIONS,
        &Query::new(queued).limit(max),
    )
    .await?;

    info!(
        user_id,
        operations = operations.len(),
        recommendation_actions = actions.len(),
        "Draining queue"
    );

    let mut summary = DrainSummary::default();

    for op in &operations {
        let row = Filter::user(user_id).eq("id", op.id.as_str());
        store
            .patch(
                table::OPERATIONS,
                &row,
                json!({ "status": job_status::RUNNING, "updated_at": now() }),
            )
            .await?;

        let result = simulate(&op.operation, &op.params);
        debug!(operation_id = %op.id, operation = %op.operation, "Executed operation");

        store
            .patch(
                table::OPERATIONS,
                &row,
                json!({ "status": job_status::SUCCESS, "result": result, "updated_at": now() }),
            )
            .await?;

        audit::record(
            store,
            user_id,
            activity::OPERATION,
            &format!("Executed {} on resource {}", op.operation, op.resource_id),
            true,
        )
        .await;
        summary.operations_processed += 1;
    }

    for action in &actions {
        let row = Filter::user(user_id).eq("id", action.id.as_str());
        store
            .patch(
                table::RECOMMENDATION_ACTIONS,
                &row,
                json!({ "status": job_status::RUNNING }),
            )
            .await?;

        let result = json!({
            "message": format!("Applied recommendation {}", action.recommendation_id)
        });

        store
            .patch(
                table::RECOMMENDATION_ACTIONS,
                &row,
                json!({ "status": job_status::SUCCESS, "result": result }),
            )
            .await?;

        audit::record(
            store,
            user_id,
            activity::RECOMMENDATION_ACTION,
            &format!("Applied recommendation {}", action.recommendation_id),
            true,
        )
        .await;
        summary.recommendation_actions_processed += 1;
    }

    audit::record(
        store,
        user_id,
        activity::QUEUE_RUN,
        &format!(
            "Queue run: {} operation(s), {} recommendation action(s) processed",
            summary.operations_processed, summary.recommendation_actions_processed
        ),
        true,
    )
    .await;

    info!(user_id, %summary, "Queue run finished");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_results() {
        assert_eq!(simulate("start", &Value::Null)["details"], "Resource started");
        assert_eq!(simulate("stop", &Value::Null)["details"], "Resource stopped");
        assert_eq!(simulate("scale", &json!({"size": "xlarge"}))["details"], "Scaled to xlarge");
        assert_eq!(simulate("scale", &json!({}))["details"], "Scaled to medium");
        let unknown = simulate("frobnicate", &Value::Null);
        assert_eq!(unknown["details"], "No-op");
        assert_eq!(unknown["ok"], true);
    }

    #[test]
    fn batch_size_bounds() {
        assert_eq!(batch_size(None, DEFAULT_MAX), DEFAULT_MAX);
        assert_eq!(batch_size(Some(0), DEFAULT_MAX), DEFAULT_MAX);
        assert_eq!(batch_size(Some(-4), DEFAULT_MAX), DEFAULT_MAX);
        assert_eq!(batch_size(Some(5), DEFAULT_MAX), 5);
        assert_eq!(batch_size(Some(10_000), DEFAULT_MAX), MAX_BATCH);
        assert_eq!(batch_size(None, 0), 1);
    }
}
