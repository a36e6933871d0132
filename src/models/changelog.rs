//! Issue changelog retrieval.
//!
//! The changelog endpoint still speaks the offset pagination protocol, so
//! this is one of the places the concurrent offset engine stays in use.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::client::JiraClient;
use crate::error::Result;
use crate::pagination::{self, OffsetPage, SearchFilter};

use super::user::User;

/// One changelog entry: who changed what, when.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangelogEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub author: Option<User>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub items: Vec<ChangeItem>,
}

/// A single field change within a changelog entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeItem {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub from_string: Option<String>,
    #[serde(default)]
    pub to_string: Option<String>,
}

/// Fetch the complete changelog of an issue across all pages.
#[tracing::instrument(skip(client))]
pub async fn changelog(client: &JiraClient, issue_key: &str) -> Result<Vec<ChangelogEntry>> {
    let key = urlencoding::encode(issue_key).into_owned();
    pagination::search_all_offset(
        move |start_at, max_results| {
            let client = client.clone();
            let key = key.clone();
            async move {
                let path = client.api(&format!("issue/{key}/changelog"));
                let response = client
                    .get_with_query(
                        &path,
                        &serde_json::json!({ "startAt": start_at, "maxResults": max_results }),
                    )
                    .await?;
                response.ensure_success()?;
                response.json::<OffsetPage<ChangelogEntry>>()
            }
        },
        SearchFilter::all(),
        client.default_page_size(),
    )
    .await
}
