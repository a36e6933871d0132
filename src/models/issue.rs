//! Issue model and operations.
//!
//! Issues are the central entity of the API: typed fields for everything
//! the SDK models, a dynamic field bag for everything it does not, plus
//! create/search/delete and the smaller per-issue endpoints (watchers,
//! votes, attachments, bulk operations).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::JiraClient;
use crate::document::Body;
use crate::error::{JiraError, Result};
use crate::metadata;
use crate::pagination::{self, SearchFilter, TokenPage, TokenPagedRequest};
use crate::traits::Get;

use super::link::IssueLink;
use super::project::{Project, ProjectComponent, Version};
use super::user::User;

// =============================================================================
// TESTS FIRST (TDD Red Phase)
// =============================================================================


// =============================================================================
// MODELS
// =============================================================================

/// A Jira issue.
///
/// The issue never owns remote state; it mirrors the server's view as of
/// the request that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub key: String,
    #[serde(rename = "self", default)]
    pub self_url: Option<String>,
    #[serde(default)]
    pub fields: IssueFields,
    /// Raw field values by field name, for custom fields the typed schema
    /// does not model. Populated only by [`issue_with_options`] when
    /// requested; never serialized back.
    #[serde(skip)]
    pub fields_dynamic: Option<HashMap<String, Value>>,
}

/// The typed fields of an issue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssueFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Body>,
    #[serde(rename = "issuetype", default, skip_serializing_if = "Option::is_none")]
    pub issue_type: Option<IssueType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ProjectComponent>,
    /// Affects versions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub versions: Vec<Version>,
    #[serde(rename = "fixVersions", default, skip_serializing_if = "Vec::is_empty")]
    pub fix_versions: Vec<Version>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<Project>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reporter: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Box<Issue>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issuelinks: Vec<IssueLink>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachment: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
}

/// An issue type (Bug, Task, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssueType {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// An issue status with its category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status_category: Option<StatusCategory>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCategory {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Priority {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Resolution {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// An attachment on an issue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub author: Option<User>,
}

impl Issue {
    /// Key of the project this issue belongs to, when the field was
    /// returned.
    pub fn project_key(&self) -> Option<&str> {
        self.fields.project.as_ref().map(|project| project.key.as_str())
    }

    /// Name of this issue's type, when the field was returned.
    pub fn issue_type_name(&self) -> Option<&str> {
        self.fields
            .issue_type
            .as_ref()
            .and_then(|issue_type| issue_type.name.as_deref())
    }

    /// Names of the components currently on the issue.
    pub fn component_names(&self) -> Vec<&str> {
        self.fields
            .components
            .iter()
            .map(|component| component.name.as_str())
            .collect()
    }

    /// Names of the affects versions currently on the issue.
    pub fn affects_version_names(&self) -> Vec<&str> {
        self.fields
            .versions
            .iter()
            .map(|version| version.name.as_str())
            .collect()
    }

    /// Names of the fix versions currently on the issue.
    pub fn fix_version_names(&self) -> Vec<&str> {
        self.fields
            .fix_versions
            .iter()
            .map(|version| version.name.as_str())
            .collect()
    }
}

// Serialize-only reference shapes used in request payloads.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct IdRef {
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct KeyRef {
    pub key: String,
}

// =============================================================================
// SEARCH
// =============================================================================

/// Request body for the token-paginated issue search endpoint.
///
/// The query (JQL and friends) is immutable across a search; the engine
/// mutates only the pagination state between pages.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueSearchRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields_by_keys: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconcile_issues: Option<Vec<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

impl IssueSearchRequest {
    /// A search request for the given JQL query.
    pub fn new(jql: impl Into<String>) -> Self {
        Self {
            jql: Some(jql.into()),
            ..Default::default()
        }
    }
}

impl TokenPagedRequest for IssueSearchRequest {
    fn normalize_page_size(&mut self, default: u32) {
        if self.max_results.map_or(true, |max| max == 0) {
            self.max_results = Some(default);
        }
    }

    fn apply_page_token(&mut self, token: &str) -> Result<()> {
        self.next_page_token = Some(token.to_string());
        Ok(())
    }
}

/// Search issues with JQL, following the token cursor across all pages.
///
/// The filter can restrict which issues are collected and stop the search
/// at the first match. Results arrive in server order.
///
/// # Example
///
/// ```ignore
/// use jirapi::{search_issues, IssueSearchRequest, SearchFilter};
///
/// let blockers = search_issues(
///     &client,
///     IssueSearchRequest::new("project = DEMO"),
///     SearchFilter::matching(|issue: &jirapi::Issue| {
///         issue.fields.labels.iter().any(|label| label == "blocker")
///     }),
/// ).await?;
/// ```
#[tracing::instrument(skip(client, filter))]
pub async fn search_issues(
    client: &JiraClient,
    request: IssueSearchRequest,
    filter: SearchFilter<'_, Issue>,
) -> Result<Vec<Issue>> {
    pagination::search_all_paged(
        request,
        |request| {
            let client = client.clone();
            async move {
                let response = client.post(&client.api("search/jql"), &request).await?;
                response.ensure_success()?;
                response.json::<TokenPage<Issue>>()
            }
        },
        filter,
        client.default_page_size(),
    )
    .await
}

/// Fetch every issue matching a JQL query.
pub async fn search_issues_jql(client: &JiraClient, jql: &str) -> Result<Vec<Issue>> {
    search_issues(client, IssueSearchRequest::new(jql), SearchFilter::all()).await
}

/// Return the first issue matching `predicate` within a JQL result set,
/// stopping the search as soon as it is found.
pub async fn find_first_issue(
    client: &JiraClient,
    jql: &str,
    predicate: impl Fn(&Issue) -> bool + Send + Sync,
) -> Result<Option<Issue>> {
    let mut matches = search_issues(
        client,
        IssueSearchRequest::new(jql),
        SearchFilter::first_match(predicate),
    )
    .await?;
    Ok(if matches.is_empty() {
        None
    } else {
        Some(matches.remove(0))
    })
}

#[derive(Serialize)]
struct CountRequest<'a> {
    jql: &'a str,
}

#[derive(Deserialize)]
struct CountResponse {
    count: u64,
}

/// Ask the server for the approximate number of issues a JQL query
/// matches, without fetching any of them.
#[tracing::instrument(skip(client))]
pub async fn approximate_issue_count(client: &JiraClient, jql: &str) -> Result<u64> {
    let response = client
        .post(&client.api("search/approximate-count"), &CountRequest { jql })
        .await?;
    response.ensure_success()?;
    let count: CountResponse = response.json()?;
    Ok(count.count)
}

// =============================================================================
// GET / CREATE / DELETE
// =============================================================================

#[async_trait]
impl Get for Issue {
    type Id = String; // Issue key or id

    #[tracing::instrument(skip(client))]
    async fn get(client: &JiraClient, key: String) -> Result<Self> {
        issue_with_options(client, &key, &GetIssueOptions::default()).await
    }
}

/// Options for [`issue_with_options`].
#[derive(Debug, Clone)]
pub struct GetIssueOptions {
    /// Comma-separated list of fields to return (`"*all"` by default).
    pub fields: String,
    /// Also collect the raw `fields` object into
    /// [`Issue::fields_dynamic`].
    pub extract_dynamic_fields: bool,
    /// Keep dynamic fields whose value is null/empty.
    pub keep_empty_dynamic_values: bool,
}

impl Default for GetIssueOptions {
    fn default() -> Self {
        Self {
            fields: "*all".to_string(),
            extract_dynamic_fields: false,
            keep_empty_dynamic_values: true,
        }
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(entries) => entries.is_empty(),
        _ => false,
    }
}

/// Fetch an issue by key, optionally extracting the dynamic field bag.
#[tracing::instrument(skip(client, options))]
pub async fn issue_with_options(
    client: &JiraClient,
    issue_key: &str,
    options: &GetIssueOptions,
) -> Result<Issue> {
    let path = client.api(&format!("issue/{}", urlencoding::encode(issue_key)));
    let response = client
        .get_with_query(&path, &serde_json::json!({ "fields": options.fields }))
        .await?;
    response.ensure_success()?;

    let mut issue: Issue = response.json()?;
    if options.extract_dynamic_fields {
        let raw: Value = response.json()?;
        let mut dynamic = HashMap::new();
        if let Some(fields) = raw.get("fields").and_then(|fields| fields.as_object()) {
            for (name, value) in fields {
                if options.keep_empty_dynamic_values || !is_empty_value(value) {
                    dynamic.insert(name.clone(), value.clone());
                }
            }
        }
        issue.fields_dynamic = Some(dynamic);
    }
    Ok(issue)
}

/// Parameters for creating an issue.
#[derive(Debug, Clone)]
pub struct NewIssue {
    pub project_key: String,
    /// Issue type by name (e.g. `"Bug"`); resolved to an id through the
    /// project's create metadata.
    pub issue_type: String,
    pub summary: String,
    /// Priority by name; resolved and validated like the issue type.
    pub priority: Option<String>,
    /// Key of the parent issue, for subtasks.
    pub parent_key: Option<String>,
}

impl NewIssue {
    pub fn new(
        project_key: impl Into<String>,
        issue_type: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            project_key: project_key.into(),
            issue_type: issue_type.into(),
            summary: summary.into(),
            priority: None,
            parent_key: None,
        }
    }
}

#[derive(Serialize)]
struct CreateIssueRequest {
    fields: CreateIssueFields,
}

#[derive(Serialize)]
struct CreateIssueFields {
    project: KeyRef,
    summary: String,
    issuetype: IdRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<IdRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent: Option<KeyRef>,
}

/// Create an issue.
///
/// The issue type and priority names are validated against the project's
/// create metadata and resolved to ids before anything is sent; an
/// unknown name fails fast without a mutation call.
#[tracing::instrument(skip(client))]
pub async fn create_issue(client: &JiraClient, new_issue: &NewIssue) -> Result<Issue> {
    let meta = metadata::create_meta(client, &new_issue.project_key).await?;

    let issue_type_id = meta
        .issue_type_id(&new_issue.issue_type)
        .ok_or_else(|| JiraError::UnknownIssueType {
            issue_type: new_issue.issue_type.clone(),
            project: new_issue.project_key.clone(),
        })?
        .to_string();

    let priority = match &new_issue.priority {
        Some(name) => {
            let id = meta
                .allowed_value_id(&new_issue.issue_type, "priority", name)
                .ok_or_else(|| JiraError::UnknownValue {
                    field: "priority",
                    value: name.clone(),
                    project: new_issue.project_key.clone(),
                    issue_type: new_issue.issue_type.clone(),
                })?;
            Some(IdRef { id: id.to_string() })
        }
        None => None,
    };

    let request = CreateIssueRequest {
        fields: CreateIssueFields {
            project: KeyRef {
                key: new_issue.project_key.clone(),
            },
            summary: new_issue.summary.clone(),
            issuetype: IdRef { id: issue_type_id },
            priority,
            parent: new_issue.parent_key.clone().map(|key| KeyRef { key }),
        },
    };

    let response = client.post(&client.api("issue"), &request).await?;
    response.expect_status(StatusCode::CREATED, "issue create")?;
    response.json()
}

/// Delete an issue, optionally together with its subtasks.
#[tracing::instrument(skip(client))]
pub async fn delete_issue(client: &JiraClient, issue_key: &str, delete_subtasks: bool) -> Result<()> {
    let path = client.api(&format!("issue/{}", urlencoding::encode(issue_key)));
    let response = client
        .delete_with_query(&path, &serde_json::json!({ "deleteSubtasks": delete_subtasks }))
        .await?;
    response.expect_status(StatusCode::NO_CONTENT, "issue delete")
}

// =============================================================================
// WATCHERS / VOTES / ATTACHMENTS
// =============================================================================

/// The watchers of an issue.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchersList {
    #[serde(default)]
    pub watch_count: u64,
    #[serde(default)]
    pub is_watching: bool,
    #[serde(default)]
    pub watchers: Vec<User>,
}

/// Fetch the watchers of an issue.
#[tracing::instrument(skip(client))]
pub async fn watchers(client: &JiraClient, issue_key: &str) -> Result<WatchersList> {
    let path = client.api(&format!("issue/{}/watchers", urlencoding::encode(issue_key)));
    let response = client.get(&path).await?;
    response.ensure_success()?;
    response.json()
}

/// Add a user to an issue's watchers.
///
/// The endpoint takes the bare account id as a JSON string body.
#[tracing::instrument(skip(client))]
pub async fn add_watcher(client: &JiraClient, issue_key: &str, account_id: &str) -> Result<()> {
    let path = client.api(&format!("issue/{}/watchers", urlencoding::encode(issue_key)));
    let response = client.post(&path, account_id).await?;
    response.expect_status(StatusCode::NO_CONTENT, "watcher add")
}

/// Remove a user from an issue's watchers.
#[tracing::instrument(skip(client))]
pub async fn remove_watcher(client: &JiraClient, issue_key: &str, account_id: &str) -> Result<()> {
    let path = client.api(&format!("issue/{}/watchers", urlencoding::encode(issue_key)));
    let response = client
        .delete_with_query(&path, &serde_json::json!({ "accountId": account_id }))
        .await?;
    response.expect_status(StatusCode::NO_CONTENT, "watcher remove")
}

/// The votes on an issue.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Votes {
    #[serde(default)]
    pub votes: u64,
    #[serde(default)]
    pub has_voted: bool,
}

/// Fetch the votes on an issue.
#[tracing::instrument(skip(client))]
pub async fn votes(client: &JiraClient, issue_key: &str) -> Result<Votes> {
    let path = client.api(&format!("issue/{}/votes", urlencoding::encode(issue_key)));
    let response = client.get(&path).await?;
    response.ensure_success()?;
    response.json()
}

/// Vote for an issue as the authenticated user.
#[tracing::instrument(skip(client))]
pub async fn add_vote(client: &JiraClient, issue_key: &str) -> Result<()> {
    let path = client.api(&format!("issue/{}/votes", urlencoding::encode(issue_key)));
    let response = client.post(&path, &serde_json::json!({})).await?;
    response.expect_status(StatusCode::NO_CONTENT, "vote add")
}

/// Withdraw the authenticated user's vote from an issue.
#[tracing::instrument(skip(client))]
pub async fn remove_vote(client: &JiraClient, issue_key: &str) -> Result<()> {
    let path = client.api(&format!("issue/{}/votes", urlencoding::encode(issue_key)));
    let response = client.delete(&path).await?;
    response.expect_status(StatusCode::NO_CONTENT, "vote remove")
}

/// Fetch the attachments of an issue.
///
/// There is no dedicated list endpoint; the issue is fetched with only
/// the attachment field populated.
#[tracing::instrument(skip(client))]
pub async fn attachments(client: &JiraClient, issue_key: &str) -> Result<Vec<Attachment>> {
    let options = GetIssueOptions {
        fields: "attachment".to_string(),
        ..Default::default()
    };
    let issue = issue_with_options(client, issue_key, &options).await?;
    Ok(issue.fields.attachment)
}

/// Delete an attachment by id.
#[tracing::instrument(skip(client))]
pub async fn delete_attachment(client: &JiraClient, attachment_id: &str) -> Result<()> {
    let path = client.api(&format!("attachment/{}", urlencoding::encode(attachment_id)));
    let response = client.delete(&path).await?;
    response.expect_status(StatusCode::NO_CONTENT, "attachment delete")
}

// =============================================================================
// BULK OPERATIONS
// =============================================================================

/// Result of a bulk issue operation.
///
/// A failure partway through leaves the already-processed issues as they
/// are; the per-issue errors are reported here rather than masked.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkOperationResult {
    #[serde(default)]
    pub issues: Vec<Issue>,
    #[serde(default)]
    pub errors: Vec<Value>,
}

#[derive(Serialize)]
struct BulkIssueUpdates<'a> {
    #[serde(rename = "issueUpdates")]
    issue_updates: &'a [Value],
}

/// Create several issues in one call.
///
/// Each update is a raw field map; the bulk endpoint accepts arbitrary
/// per-issue shapes that the typed create request does not model.
#[tracing::instrument(skip(client, issue_updates))]
pub async fn bulk_create_issues(
    client: &JiraClient,
    issue_updates: &[Value],
) -> Result<BulkOperationResult> {
    let response = client
        .post(&client.api("issue/bulk"), &BulkIssueUpdates { issue_updates })
        .await?;
    response.expect_status(StatusCode::CREATED, "bulk issue create")?;
    response.json()
}

/// Edit several issues in one call.
#[tracing::instrument(skip(client, issue_updates))]
pub async fn bulk_edit_issues(
    client: &JiraClient,
    issue_updates: &[Value],
) -> Result<BulkOperationResult> {
    let response = client
        .put(&client.api("issue/bulk"), &BulkIssueUpdates { issue_updates })
        .await?;
    response.ensure_success()?;
    response.json()
}

#[derive(Serialize)]
struct BulkIssueKeys<'a> {
    #[serde(rename = "issueIdsOrKeys")]
    issue_ids_or_keys: &'a [String],
}

/// Delete several issues in one call.
#[tracing::instrument(skip(client))]
pub async fn bulk_delete_issues(
    client: &JiraClient,
    issue_ids_or_keys: &[String],
) -> Result<BulkOperationResult> {
    let response = client
        .delete_with_body(
            &client.api("issue/bulk"),
            &BulkIssueKeys {
                issue_ids_or_keys,
            },
        )
        .await?;
    response.ensure_success()?;
    response.json()
}
