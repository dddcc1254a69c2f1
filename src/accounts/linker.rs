use serde_json::Value;
use tracing::info;

use super::credentials::{validate, ValidationError};
use crate::audit;
use crate::auth::Principal;
use crate::store::models::{activity, now, CloudAccount, NewCloudCredential};
use crate::store::schema::table;
use crate::store::{insert_one, RowStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub const CONNECTED: &str = "connected";

/// Validate a link payload, then write the account row, its credential row
/// and an activity entry. Nothing is written when validation fails.
pub async fn link_account(
    store: &dyn RowStore,
    principal: &Principal,
    body: &Value,
) -> Result<CloudAccount, LinkError> {
    let req = validate(body)?;
    let user_id = principal.user_id.as_str();

    let draft = CloudAccount {
        id: None,
        user_id: user_id.to_string(),
        provider: req.provider.as_str().to_string(),
        name: req.name.clone(),
        account_id: req.account_id.clone(),
        status: CONNECTED.to_string(),
        metadata: req.metadata.clone(),
        created_at: Some(now()),
    };
    let row = insert_one(store, table::CLOUD_ACCOUNTS, &draft).await?;
    let account: CloudAccount =
        serde_json::from_value(row).map_err(|source| StoreError::Decode {
            table: table::CLOUD_ACCOUNTS.to_string(),
            source,
        })?;
    let account_row_id = account.id.clone().unwrap_or_default();

    let credential = NewCloudCredential {
        user_id: user_id.to_string(),
        account_id: account_row_id.clone(),
        provider: account.provider.clone(),
        credentials: req.secret,
        created_at: now(),
    };
    insert_one(store, table::CLOUD_CREDENTIALS, &credential).await?;

    info!(user_id, account = %account_row_id, provider = %account.provider, "Linked cloud account");
    audit::record(
        store,
        user_id,
        activity::ACCOUNT_LINKED,
        &format!("Linked {} account '{}'", account.provider, account.name),
        true,
    )
    .await;
    Ok(account)
}
