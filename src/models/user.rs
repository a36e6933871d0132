//! User model and account lookups.

use serde::{Deserialize, Serialize};

use crate::client::JiraClient;
use crate::error::{JiraError, Result};

/// A Jira user account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(rename = "self", default)]
    pub self_url: Option<String>,
}

/// Look up the account of the user the client authenticates as.
///
/// Searches by the configured basic-auth username and returns the first
/// hit, or `None` when the server reports no match.
///
/// # Errors
///
/// Returns [`JiraError::ConfigMissing`] when the client authenticates
/// with a bearer token (no username to search for).
#[tracing::instrument(skip(client))]
pub async fn current_user(client: &JiraClient) -> Result<Option<User>> {
    let username = client.username().ok_or_else(|| {
        JiraError::ConfigMissing(
            "a basic-auth username is required to look up the current user".to_string(),
        )
    })?;

    let response = client
        .get_with_query(
            &client.api("user/search"),
            &serde_json::json!({ "query": username }),
        )
        .await?;
    response.ensure_success()?;

    let mut users: Vec<User> = response.json()?;
    Ok(if users.is_empty() {
        None
    } else {
        Some(users.remove(0))
    })
}

/// Fetch a user account by its account id.
#[tracing::instrument(skip(client))]
pub async fn user(client: &JiraClient, account_id: &str) -> Result<User> {
    let response = client
        .get_with_query(
            &client.api("user"),
            &serde_json::json!({ "accountId": account_id }),
        )
        .await?;
    response.ensure_success()?;
    response.json()
}
