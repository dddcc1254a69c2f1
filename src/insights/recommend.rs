use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use super::costs::{detect_anomalies, totals_by_service, MonthWindow};
use crate::audit;
use crate::auth::Principal;
use crate::store::models::{activity, now, CostBreakdownRow, NewRecommendation, Resource};
use crate::store::schema::table;
use crate::store::{insert_as, select_as, Filter, Query, RowStore, StoreResult};

/// Share of monthly spend assumed reclaimable from an idle resource.
const IDLE_SAVINGS: f64 = 0.6;
/// Share of monthly spend assumed saved by moving one size down.
const RIGHTSIZING_SAVINGS: f64 = 0.35;

/// Metadata keys consulted, in order, for a CPU utilization hint.
const UTILIZATION_KEYS: &[&str] = &["cpu_utilization", "cpu_avg", "utilization"];

/// Resource types eligible for rightsizing (substring match).
const COMPUTE_TYPES: &[&str] = &["ec2", "vm", "computeengine"];

/// Analysis passes the generator can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Idle,
    Rightsizing,
    Anomaly,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Idle, Mode::Rightsizing, Mode::Anomaly];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "idle" => Some(Mode::Idle),
            "rightsizing" => Some(Mode::Rightsizing),
            "anomaly" => Some(Mode::Anomaly),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Idle => "idle",
            Mode::Rightsizing => "rightsizing",
            Mode::Anomaly => "anomaly",
        }
    }

    /// Resolve requested mode names. Unknown names are dropped; nothing
    /// requested (or nothing recognised) means every mode.
    pub fn resolve(requested: Option<&[String]>) -> Vec<Mode> {
        let mut modes: Vec<Mode> = requested
            .unwrap_or_default()
            .iter()
            .filter_map(|m| Mode::parse(m))
            .collect();
        modes.sort();
        modes.dedup();
        if modes.is_empty() {
            Mode::ALL.to_vec()
        } else {
            modes
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateSummary {
    pub inserted: usize,
    pub modes: Vec<Mode>,
    pub per_mode: Vec<(Mode, usize)>,
}

impl std::fmt::Display for GenerateSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .per_mode
            .iter()
            .map(|(m, n)| format!("{} {}", n, m.as_str()))
            .collect();
        write!(
            f,
            "Recommendations generated: {} ({})",
            self.inserted,
            parts.join(", ")
        )
    }
}

fn round_cents(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn utilization(resource: &Resource) -> Option<f64> {
    UTILIZATION_KEYS.iter().find_map(|k| match resource.metadata.get(*k) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn size(resource: &Resource) -> String {
    match resource.metadata.get("size") {
        Some(Value::String(s)) => s.clone(),
        _ => resource.field("size"),
    }
}

fn display_name(resource: &Resource) -> String {
    let name = resource.field("name");
    if name.is_empty() {
        resource.id.clone()
    } else {
        name
    }
}

/// Idle candidate: stopped but still billing, or running nearly unused.
pub fn idle_candidate(resource: &Resource, user_id: &str) -> Option<NewRecommendation> {
    let state = resource.state.as_str();
    let daily = resource.cost_daily;
    let stopped_but_billing = state == "stopped" && daily > 0.2;
    let underused = state == "running"
        && utilization(resource).is_some_and(|u| u > 0.0 && u < 10.0)
        && daily >= 2.0;
    if !(stopped_but_billing || underused) {
        return None;
    }
    let reason = if stopped_but_billing {
        format!(
            "Resource is stopped but still costs {:.2}/day (attached storage or reserved capacity)",
            daily
        )
    } else {
        format!(
            "CPU utilization averages {:.1}% while costing {:.2}/day",
            utilization(resource).unwrap_or_default(),
            daily
        )
    };
    Some(NewRecommendation {
        user_id: user_id.to_string(),
        resource_id: Some(resource.id.clone()),
        title: format!("Shut down idle resource {}", display_name(resource)),
        reason,
        priority: 2,
        impact: round_cents(IDLE_SAVINGS * resource.monthly_cost()),
        provider: resource.provider.clone(),
        metadata: json!({ "kind": Mode::Idle.as_str(), "state": resource.state }),
        created_at: now(),
    })
}

/// Rightsizing candidate: large or expensive compute instances.
pub fn rightsizing_candidate(resource: &Resource, user_id: &str) -> Option<NewRecommendation> {
    let rtype = resource.resource_type.to_lowercase();
    if !COMPUTE_TYPES.iter().any(|t| rtype.contains(t)) {
        return None;
    }
    let daily = resource.cost_daily;
    let size = size(resource);
    let is_large = size.eq_ignore_ascii_case("large");
    if !((is_large && daily > 10.0) || daily > 15.0) {
        return None;
    }
    Some(NewRecommendation {
        user_id: user_id.to_string(),
        resource_id: Some(resource.id.clone()),
        title: format!("Rightsize {}", display_name(resource)),
        reason: format!(
            "Instance ({}) costs {:.2}/day; a smaller size likely fits the workload",
            if size.is_empty() { "unknown size" } else { size.as_str() },
            daily
        ),
        priority: 3,
        impact: round_cents(RIGHTSIZING_SAVINGS * resource.monthly_cost()),
        provider: resource.provider.clone(),
        metadata: json!({ "kind": Mode::Rightsizing.as_str(), "size": size }),
        created_at: now(),
    })
}

/// Compare this month's cost breakdown with last month's.
pub fn anomaly_candidates(
    current: &[CostBreakdownRow],
    previous: &[CostBreakdownRow],
    user_id: &str,
) -> Vec<NewRecommendation> {
    let providers: HashMap<&str, &str> = current
        .iter()
        .chain(previous)
        .map(|r| (r.service.as_str(), r.provider.as_str()))
        .collect();
    detect_anomalies(&totals_by_service(current), &totals_by_service(previous))
        .into_iter()
        .map(|a| NewRecommendation {
            user_id: user_id.to_string(),
            resource_id: None,
            title: format!("Investigate {} cost spike", a.service),
            reason: format!(
                "{} spend rose from {:.2} last month to {:.2} this month",
                a.service, a.previous, a.current
            ),
            priority: 1,
            impact: round_cents(a.increase()),
            provider: providers
                .get(a.service.as_str())
                .map(|p| p.to_string())
                .unwrap_or_default(),
            metadata: json!({
                "kind": Mode::Anomaly.as_str(),
                "service": a.service,
                "previous": a.previous,
                "current": a.current,
            }),
            created_at: now(),
        })
        .collect()
}

async fn load_costs(
    store: &dyn RowStore,
    user_id: &str,
    window: &MonthWindow,
) -> StoreResult<Vec<CostBreakdownRow>> {
    select_as(
        store,
        table::COSTS_BREAKDOWN,
        &Query::new(
            Filter::user(user_id)
                .gte("date", window.start_str())
                .lt("date", window.end_str()),
        ),
    )
    .await
}

/// Run the requested analysis passes and insert every candidate in one batch.
pub async fn generate(
    store: &dyn RowStore,
    principal: &Principal,
    modes: &[Mode],
    today: NaiveDate,
) -> StoreResult<GenerateSummary> {
    let user_id = principal.user_id.as_str();

    let resources: Vec<Resource> =
        select_as(store, table::RESOURCES, &Query::new(Filter::user(user_id))).await?;
    let current_window = MonthWindow::containing(today);
    let current = load_costs(store, user_id, &current_window).await?;
    let previous = load_costs(store, user_id, &current_window.previous()).await?;

    let mut candidates = Vec::new();
    let mut per_mode = Vec::with_capacity(modes.len());
    for mode in modes {
        let found: Vec<NewRecommendation> = match mode {
            Mode::Idle => resources
                .iter()
                .filter_map(|r| idle_candidate(r, user_id))
                .collect(),
            Mode::Rightsizing => resources
                .iter()
                .filter_map(|r| rightsizing_candidate(r, user_id))
                .collect(),
            Mode::Anomaly => anomaly_candidates(&current, &previous, user_id),
        };
        per_mode.push((*mode, found.len()));
        candidates.extend(found);
    }

    let inserted = if candidates.is_empty() {
        0
    } else {
        insert_as(store, table::RECOMMENDATIONS, &candidates)
            .await?
            .len()
    };

    let summary = GenerateSummary {
        inserted,
        modes: modes.to_vec(),
        per_mode,
    };
    info!(user_id, inserted, "Recommendations generated");
    audit::record(
        store,
        user_id,
        activity::RECOMMENDATIONS,
        &summary.to_string(),
        true,
    )
    .await;
    Ok(summary)
}
