/// Table names of the external row-store. The relational schema itself is
/// owned by the store; these are the only tables the backend touches.
pub mod table {
    pub const AUTOMATION_RULES: &str = "automation_rules";
    pub const AUTOMATION_RULE_RUNS: &str = "automation_rule_runs";
    pub const RESOURCES: &str = "resources";
    pub const OPERATIONS: &str = "operations";
    pub const RECOMMENDATION_ACTIONS: &str = "recommendation_actions";
    pub const RECOMMENDATIONS: &str = "recommendations";
    pub const ACTIVITY_LOG: &str = "activity_log";
    pub const CLOUD_ACCOUNTS: &str = "cloud_accounts";
    pub const CLOUD_CREDENTIALS: &str = "cloud_credentials";
    pub const COSTS_BREAKDOWN: &str = "costs_breakdown";
}

pub const SCHEMA_VERSION: i32 = 1;

/// SQLite layout for the local development store.
///
/// Rows are kept as JSON documents per table so the store stays schema-less
/// like the REST contract it stands in for. `seq` preserves insertion order,
/// which is the "store order" the pipeline iterates in.
pub const CREATE_TABLES_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL,
    description TEXT
);

CREATE TABLE IF NOT EXISTS rows (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    table_name TEXT NOT NULL,
    id TEXT NOT NULL,
    body TEXT NOT NULL,
    UNIQUE(table_name, id)
);
";

pub const CREATE_INDEXES_SQL: &str = "
CREATE INDEX IF NOT EXISTS idx_rows_table ON rows(table_name);
";
