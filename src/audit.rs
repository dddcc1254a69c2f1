//! Append-only activity log shared by every handler.

use crate::store::models::{now, outcome, ActivityLogEntry};
use crate::store::schema::table;
use crate::store::{insert_one, RowStore};

/// Write one activity entry. Best effort: a failed write is logged and
/// never fails the unit of work it describes.
pub async fn record(store: &dyn RowStore, actor: &str, entry_type: &str, summary: &str, ok: bool) {
    let entry = ActivityLogEntry {
        actor: actor.to_string(),
        entry_type: entry_type.to_string(),
        summary: summary.to_string(),
        status: if ok { outcome::SUCCESS } else { outcome::ERROR }.to_string(),
        created_at: now(),
    };
    if let Err(e) = insert_one(store, table::ACTIVITY_LOG, &entry).await {
        tracing::warn!(actor, entry_type, error = %e, "Failed to write activity log entry");
    }
}
