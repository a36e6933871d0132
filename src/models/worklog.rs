//! Worklog model and operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::client::JiraClient;
use crate::document::Body;
use crate::error::Result;
use crate::traits::Update;

use super::user::User;

/// A worklog entry on an issue.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Worklog {
    pub id: String,
    #[serde(default)]
    pub author: Option<User>,
    #[serde(default)]
    pub time_spent: Option<String>,
    #[serde(default)]
    pub time_spent_seconds: Option<u64>,
    #[serde(default)]
    pub comment: Option<Body>,
    #[serde(default)]
    pub started: Option<String>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
}

/// One page of an issue's worklogs (offset-paginated endpoint).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorklogList {
    #[serde(default)]
    pub worklogs: Vec<Worklog>,
    #[serde(default)]
    pub start_at: u64,
    #[serde(default)]
    pub max_results: u64,
    #[serde(default)]
    pub total: u64,
}

/// A worklog to record: time spent, an optional comment, and when the
/// work started (defaults to now on submission).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWorklog {
    pub time_spent_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started: Option<String>,
}

impl NewWorklog {
    pub fn new(time_spent_seconds: u64) -> Self {
        Self {
            time_spent_seconds,
            comment: None,
            started: None,
        }
    }

    fn with_default_started(&self) -> Self {
        let mut entry = self.clone();
        if entry.started.is_none() {
            entry.started = Some(Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string());
        }
        entry
    }
}

/// How the remaining estimate is adjusted by a worklog change.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorklogOptions {
    /// One of `new`, `leave`, `manual`, `auto`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjust_estimate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_estimate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reduce_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub increase_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expand: Option<String>,
}

/// Fetch one page of an issue's worklogs.
#[tracing::instrument(skip(client))]
pub async fn worklogs(
    client: &JiraClient,
    issue_key: &str,
    start_at: u64,
    max_results: u32,
) -> Result<WorklogList> {
    let path = client.api(&format!("issue/{}/worklog", urlencoding::encode(issue_key)));
    let response = client
        .get_with_query(
            &path,
            &serde_json::json!({ "startAt": start_at, "maxResults": max_results }),
        )
        .await?;
    response.ensure_success()?;
    response.json()
}

/// Record a worklog on an issue.
#[tracing::instrument(skip(client, entry, options))]
pub async fn add_worklog(
    client: &JiraClient,
    issue_key: &str,
    entry: &NewWorklog,
    options: &WorklogOptions,
) -> Result<Worklog> {
    let path = client.api(&format!("issue/{}/worklog", urlencoding::encode(issue_key)));
    let response = client
        .post_with_query(&path, options, &entry.with_default_started())
        .await?;
    response.expect_status(StatusCode::CREATED, "worklog create")?;
    response.json()
}

/// Fetch a single worklog.
#[tracing::instrument(skip(client))]
pub async fn worklog(client: &JiraClient, issue_key: &str, worklog_id: &str) -> Result<Worklog> {
    let path = client.api(&format!(
        "issue/{}/worklog/{}",
        urlencoding::encode(issue_key),
        urlencoding::encode(worklog_id)
    ));
    let response = client.get(&path).await?;
    response.ensure_success()?;
    response.json()
}

#[async_trait]
impl Update for Worklog {
    /// `(issue_key, worklog_id)`.
    type Id = (String, String);
    type Params = NewWorklog;

    #[tracing::instrument(skip(client, entry))]
    async fn update(client: &JiraClient, id: Self::Id, entry: Self::Params) -> Result<Self> {
        let (issue_key, worklog_id) = id;
        let path = client.api(&format!(
            "issue/{}/worklog/{}",
            urlencoding::encode(&issue_key),
            urlencoding::encode(&worklog_id)
        ));
        let response = client.put(&path, &entry).await?;
        response.ensure_success()?;
        response.json()
    }
}

/// Update an existing worklog.
pub async fn update_worklog(
    client: &JiraClient,
    issue_key: &str,
    worklog_id: &str,
    entry: NewWorklog,
) -> Result<Worklog> {
    Worklog::update(
        client,
        (issue_key.to_string(), worklog_id.to_string()),
        entry,
    )
    .await
}

/// Delete a worklog, optionally adjusting the remaining estimate.
#[tracing::instrument(skip(client, options))]
pub async fn delete_worklog(
    client: &JiraClient,
    issue_key: &str,
    worklog_id: &str,
    options: &WorklogOptions,
) -> Result<()> {
    let path = client.api(&format!(
        "issue/{}/worklog/{}",
        urlencoding::encode(issue_key),
        urlencoding::encode(worklog_id)
    ));
    let response = client.delete_with_query(&path, options).await?;
    response.expect_status(StatusCode::NO_CONTENT, "worklog delete")
}
