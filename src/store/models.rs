use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// ─── Status Values ──────────────────────────────────────────────────────────

/// Lifecycle shared by operations and recommendation actions.
/// Only moves forward: queued → running → success | error.
pub mod job_status {
    pub const QUEUED: &str = "queued";
    pub const RUNNING: &str = "running";
    pub const SUCCESS: &str = "success";
    pub const ERROR: &str = "error";
}

pub mod rule_status {
    pub const ENABLED: &str = "enabled";
    pub const DISABLED: &str = "disabled";
}

/// Status column of activity log entries and rule runs.
pub mod outcome {
    pub const SUCCESS: &str = "success";
    pub const ERROR: &str = "error";
}

pub fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

// ─── Resources ──────────────────────────────────────────────────────────────

/// A cloud-managed entity (VM, database, bucket...) as stored in `resources`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub user_id: String,
    #[serde(rename = "type", default, deserialize_with = "lenient_string")]
    pub resource_type: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub provider: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub region: String,
    #[serde(default, deserialize_with = "lenient_tags")]
    pub tags: HashMap<String, String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub state: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub cost_daily: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub cost_monthly: f64,
    #[serde(default, deserialize_with = "lenient_object")]
    pub metadata: Map<String, Value>,
    /// Columns not modelled above (name, size, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Resource {
    /// Look up a column by name, rendering it as a string.
    /// Missing or null columns read as the empty string.
    ///
    /// `tags` and `metadata` are decoded into their own fields and never
    /// reach `extra`, so looking them up by name also yields `""`. Tags are
    /// addressed through `tags.<name>` in the matcher instead.
    pub fn field(&self, key: &str) -> String {
        match key {
            "id" => self.id.clone(),
            "user_id" => self.user_id.clone(),
            "type" => self.resource_type.clone(),
            "provider" => self.provider.clone(),
            "region" => self.region.clone(),
            "state" => self.state.clone(),
            "cost_daily" => display_number(self.cost_daily),
            "cost_monthly" => display_number(self.cost_monthly),
            _ => self.extra.get(key).map(value_to_display).unwrap_or_default(),
        }
    }

    /// Monthly cost, estimated from the daily figure when the store has none.
    pub fn monthly_cost(&self) -> f64 {
        if self.cost_monthly > 0.0 {
            self.cost_monthly
        } else {
            self.cost_daily * 30.0
        }
    }
}

/// Render a scalar JSON value the way a loosely typed record would print it.
pub fn value_to_display(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn display_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

// ─── Automation ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationRule {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub user_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    /// Tag query selecting the resources this rule applies to.
    #[serde(rename = "match", default)]
    pub match_query: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub action: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: String,
}

/// Insert draft for an `operations` row.
#[derive(Debug, Clone, Serialize)]
pub struct NewOperation {
    pub user_id: String,
    pub resource_id: String,
    pub operation: String,
    pub params: Value,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub user_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub resource_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub operation: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: String,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// One row per rule per enforcement pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationRuleRun {
    pub rule_id: String,
    pub user_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub status: String,
    pub details: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationAction {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub user_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub recommendation_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: String,
    #[serde(default)]
    pub result: Option<Value>,
}

// ─── Recommendations & Costs ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRecommendation {
    pub user_id: String,
    pub resource_id: Option<String>,
    pub title: String,
    pub reason: String,
    pub priority: i32,
    pub impact: f64,
    pub provider: String,
    pub metadata: Value,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostBreakdownRow {
    #[serde(default, deserialize_with = "lenient_string")]
    pub user_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub service: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub provider: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub cost: f64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub date: String,
}

// ─── Audit ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub actor: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub summary: String,
    pub status: String,
    pub created_at: String,
}

/// Activity entry types written by the handlers.
pub mod activity {
    pub const AUTOMATION_RULE: &str = "automation_rule";
    pub const AUTOMATION_RUN: &str = "automation_run";
    pub const OPERATION: &str = "operation";
    pub const RECOMMENDATION_ACTION: &str = "recommendation_action";
    pub const QUEUE_RUN: &str = "queue_run";
    pub const RECOMMENDATIONS: &str = "recommendations";
    pub const ACCOUNT_LINKED: &str = "account_linked";
}

// ─── Accounts ───────────────────────────────────────────────────────────────

/// Non-secret account metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudAccount {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    pub provider: String,
    pub name: String,
    pub account_id: String,
    pub status: String,
    pub metadata: Value,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Secret-bearing row, 1:1 with a cloud account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCloudCredential {
    pub user_id: String,
    pub account_id: String,
    pub provider: String,
    pub credentials: Value,
    pub created_at: String,
}

// ─── Lenient decoding ───────────────────────────────────────────────────────

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let v = Option::<Value>::deserialize(d)?;
    Ok(v.as_ref().map(value_to_display).unwrap_or_default())
}

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let v = Option::<Value>::deserialize(d)?;
    Ok(match v {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

fn lenient_tags<'de, D: Deserializer<'de>>(d: D) -> Result<HashMap<String, String>, D::Error> {
    let v = Option::<Value>::deserialize(d)?;
    Ok(match v {
        Some(Value::Object(map)) => map
            .iter()
            .map(|(k, v)| (k.clone(), value_to_display(v)))
            .collect(),
        _ => HashMap::new(),
    })
}

fn lenient_object<'de, D: Deserializer<'de>>(d: D) -> Result<Map<String, Value>, D::Error> {
    let v = Option::<Value>::deserialize(d)?;
    Ok(match v {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    })
}
