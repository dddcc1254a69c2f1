use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use super::matcher;
use crate::audit;
use crate::auth::Principal;
use crate::store::models::{
    activity, job_status, now, outcome, rule_status, AutomationRule, AutomationRuleRun,
    NewOperation, Resource,
};
use crate::store::schema::table;
use crate::store::{insert_as, insert_one, select_as, Filter, Query, RowStore, StoreResult};

/// Target size used for `scale` actions; rules do not carry one.
pub const DEFAULT_SCALE_SIZE: &str = "medium";

/// Result of evaluating one rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    pub rule_id: String,
    pub status: String,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary of an enforcement pass.
#[derive(Debug, Clone, Serialize)]
pub struct EnforceSummary {
    pub rules_evaluated: usize,
    pub queued_total: usize,
    pub runs: Vec<RunOutcome>,
}

impl std::fmt::Display for EnforceSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let failed = self
            .runs
            .iter()
            .filter(|r| r.status == outcome::ERROR)
            .count();
        write!(
            f,
            "Enforcement complete! Rules: {} evaluated, {} failed. Operations: {} queued.",
            self.rules_evaluated, failed, self.queued_total
        )
    }
}

/// Build the queued operation a rule produces for one matched resource.
pub fn operation_for(rule: &AutomationRule, resource: &Resource, user_id: &str) -> NewOperation {
    let params = if rule.action == "scale" {
        json!({ "size": DEFAULT_SCALE_SIZE, "rule_id": rule.id })
    } else {
        json!({ "rule_id": rule.id })
    };
    let ts = now();
    NewOperation {
        user_id: user_id.to_string(),
        resource_id: resource.id.clone(),
        operation: rule.action.clone(),
        params,
        status: job_status::QUEUED.to_string(),
        created_at: ts.clone(),
        updated_at: ts,
    }
}

/// Evaluate every enabled rule of `principal` and enqueue matching operations.
///
/// Insert failures are isolated per rule and reported in `runs`; failing to
/// load rules or resources aborts the pass.
pub async fn enforce(store: &dyn RowStore, principal: &Principal) -> StoreResult<EnforceSummary> {
    let user_id = principal.user_id.as_str();

    let rules: Vec<AutomationRule> = select_as(
        store,
        table::AUTOMATION_RULES,
        &Query::new(Filter::user(user_id).eq("status", rule_status::ENABLED)),
    )
    .await?;

    if rules.is_empty() {
        info!(user_id, "No enabled automation rules");
        audit::record(
            store,
            user_id,
            activity::AUTOMATION_RUN,
            "Automation run skipped: no enabled rules",
            true,
        )
        .await;
        return Ok(EnforceSummary {
            rules_evaluated: 0,
            queued_total: 0,
            runs: vec![],
        });
    }

    let resources: Vec<Resource> = select_as(
        store,
        table::RESOURCES,
        &Query::new(Filter::user(user_id)),
    )
    .await?;

    info!(
        user_id,
        rules = rules.len(),
        resources = resources.len(),
        "Enforcing automation rules"
    );

    let mut runs = Vec::with_capacity(rules.len());
    for rule in &rules {
        let run = enforce_rule(store, user_id, rule, &resources).await;
        runs.push(run);
    }

    let queued_total: usize = runs.iter().map(|r| r.count).sum();
    audit::record(
        store,
        user_id,
        activity::AUTOMATION_RUN,
        &format!(
            "Automation run: {} rule(s) processed, {} operation(s) queued",
            rules.len(),
            queued_total
        ),
        true,
    )
    .await;

    Ok(EnforceSummary {
        rules_evaluated: rules.len(),
        queued_total,
        runs,
    })
}

async fn enforce_rule(
    store: &dyn RowStore,
    user_id: &str,
    rule: &AutomationRule,
    resources: &[Resource],
) -> RunOutcome {
    let query = rule.match_query.as_deref().unwrap_or("");
    let drafts: Vec<NewOperation> = resources
        .iter()
        .filter(|r| matcher::matches(r, query))
        .map(|r| operation_for(rule, r, user_id))
        .collect();

    let started_at = now();
    let run = if drafts.is_empty() {
        RunOutcome {
            rule_id: rule.id.clone(),
            status: outcome::SUCCESS.to_string(),
            count: 0,
            error: None,
        }
    } else {
        match insert_as(store, table::OPERATIONS, &drafts).await {
            Ok(inserted) => RunOutcome {
                rule_id: rule.id.clone(),
                status: outcome::SUCCESS.to_string(),
                count: inserted.len(),
                error: None,
            },
            Err(e) => {
                warn!(rule_id = %rule.id, error = %e, "Failed to queue operations for rule");
                RunOutcome {
                    rule_id: rule.id.clone(),
                    status: outcome::ERROR.to_string(),
                    count: 0,
                    error: Some(e.to_string()),
                }
            }
        }
    };

    let details = match &run.error {
        Some(err) => json!({ "error": err }),
        None => json!({ "queued": run.count }),
    };
    let record = AutomationRuleRun {
        rule_id: rule.id.clone(),
        user_id: user_id.to_string(),
        started_at: started_at.clone(),
        finished_at: started_at,
        status: run.status.clone(),
        details,
    };
    if let Err(e) = insert_one(store, table::AUTOMATION_RULE_RUNS, &record).await {
        warn!(rule_id = %rule.id, error = %e, "Failed to record rule run");
    }

    let ok = run.error.is_none();
    let summary = match &run.error {
        None => format!(
            "Rule '{}' queued {} {} operation(s)",
            rule.name, run.count, rule.action
        ),
        Some(err) => format!("Rule '{}' failed to queue operations: {}", rule.name, err),
    };
    audit::record(store, user_id, activity::AUTOMATION_RULE, &summary, ok).await;

    info!(rule_id = %rule.id, status = %run.status, queued = run.count, "Rule evaluated");
    run
}
