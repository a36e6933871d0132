//! Issue update grammar and delta mutation helpers.
//!
//! Jira expresses partial updates as per-field operation lists: each
//! multi-valued relation field (components, versions, fix versions) takes
//! `add`/`remove` entries, labels take a whole-list `set`, and scalar
//! fields take a single `set`. The helpers here turn "desired list state"
//! plus a mode into the minimal payload, validating every name against
//! the project's create metadata first and skipping the network call
//! entirely when the desired state already holds.
//!
//! A replace is a single request carrying both the remove and the add
//! entries; the wire grammar has no atomic whole-list `set` for relation
//! fields.

use reqwest::StatusCode;
use serde::Serialize;

use crate::client::JiraClient;
use crate::document::Document;
use crate::error::{JiraError, Result};
use crate::metadata;
use crate::models::Issue;
use crate::traits::Get;

// =============================================================================
// WIRE GRAMMAR
// =============================================================================

/// Whether desired values extend the current list or replace it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Add the desired values to whatever is already on the issue.
    Append,
    /// Make the issue carry exactly the desired values.
    Replace,
}

/// A value referenced by name in an update operation.
#[derive(Debug, Clone, Serialize)]
pub struct FieldRef {
    pub name: String,
}

/// One entry in a relation field's operation list.
///
/// Serializes externally tagged: `{"add": {"name": "backend"}}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldOp {
    Add(FieldRef),
    Remove(FieldRef),
}

impl FieldOp {
    fn add(name: &str) -> Self {
        FieldOp::Add(FieldRef {
            name: name.to_string(),
        })
    }

    fn remove(name: &str) -> Self {
        FieldOp::Remove(FieldRef {
            name: name.to_string(),
        })
    }
}

/// One entry in the labels operation list. Labels are plain strings and
/// support a whole-list `set`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelsOp {
    Set(Vec<String>),
    Add(String),
    Remove(String),
}

/// One entry in the description operation list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptionOp {
    Set(Document),
}

/// The per-field operation lists of an issue update.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IssueUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<LabelsOp>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<FieldOp>>,
    /// Affects versions; the wire name is `versions`.
    #[serde(rename = "versions", skip_serializing_if = "Option::is_none")]
    pub affects_versions: Option<Vec<FieldOp>>,
    #[serde(rename = "fixVersions", skip_serializing_if = "Option::is_none")]
    pub fix_versions: Option<Vec<FieldOp>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Vec<DescriptionOp>>,
}

/// Request body of the issue update endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateIssueRequest {
    pub update: IssueUpdate,
}

// =============================================================================
// DELTA BUILDERS
// =============================================================================

/// Compute the operation list for a relation field from the current and
/// desired value lists. Returns `None` when nothing needs to be sent.
fn list_delta_ops(mode: UpdateMode, current: &[&str], desired: &[String]) -> Option<Vec<FieldOp>> {
    match mode {
        UpdateMode::Append => {
            let fresh: Vec<&String> = desired
                .iter()
                .filter(|value| !current.contains(&value.as_str()))
                .collect();
            if fresh.is_empty() {
                return None;
            }
            Some(fresh.into_iter().map(|value| FieldOp::add(value)).collect())
        }
        UpdateMode::Replace => Some(
            current
                .iter()
                .map(|value| FieldOp::remove(value))
                .chain(desired.iter().map(|value| FieldOp::add(value)))
                .collect(),
        ),
    }
}

fn incomplete_issue(issue_key: &str, what: &str) -> JiraError {
    JiraError::ApiError {
        message: format!("issue '{issue_key}' response did not include its {what}"),
        status_code: None,
    }
}

/// Validate every desired value against the allowed values of `field_key`
/// for this issue's project and type, failing fast on the first unknown
/// one, before any mutation request goes out.
async fn validate_allowed_values(
    client: &JiraClient,
    issue: &Issue,
    field: &'static str,
    field_key: &str,
    values: &[String],
) -> Result<()> {
    let project = issue
        .project_key()
        .ok_or_else(|| incomplete_issue(&issue.key, "project"))?;
    let issue_type = issue
        .issue_type_name()
        .ok_or_else(|| incomplete_issue(&issue.key, "issue type"))?;

    let meta = metadata::create_meta(client, project).await?;
    for value in values {
        if !meta.allows(issue_type, field_key, value) {
            return Err(JiraError::UnknownValue {
                field,
                value: value.clone(),
                project: project.to_string(),
                issue_type: issue_type.to_string(),
            });
        }
    }
    Ok(())
}

async fn submit_update(
    client: &JiraClient,
    issue_key: &str,
    update: IssueUpdate,
    operation: &'static str,
) -> Result<()> {
    let path = client.api(&format!("issue/{}", urlencoding::encode(issue_key)));
    let request = UpdateIssueRequest { update };
    let response = client.put(&path, &request).await?;
    response.expect_status(StatusCode::NO_CONTENT, operation)
}

/// Update the labels of an issue.
///
/// In append mode the current labels are fetched first and the call is a
/// no-op when every desired label is already present; otherwise the
/// deduplicated union is submitted as a whole-list `set`. Replace mode
/// sets exactly the given list without fetching anything.
#[tracing::instrument(skip(client, issue))]
pub async fn update_labels(
    client: &JiraClient,
    issue_key: &str,
    mode: UpdateMode,
    labels: &[String],
    issue: Option<&Issue>,
) -> Result<()> {
    let final_labels = match mode {
        UpdateMode::Append => {
            let fetched;
            let issue = match issue {
                Some(issue) => issue,
                None => {
                    fetched = Issue::get(client, issue_key.to_string()).await?;
                    &fetched
                }
            };
            let current = &issue.fields.labels;
            if labels.iter().all(|label| current.contains(label)) {
                tracing::debug!(issue_key, "labels already present, skipping update");
                return Ok(());
            }
            let mut union: Vec<String> = Vec::with_capacity(labels.len() + current.len());
            for label in labels.iter().chain(current.iter()) {
                if !union.contains(label) {
                    union.push(label.clone());
                }
            }
            union
        }
        UpdateMode::Replace => labels.to_vec(),
    };

    let update = IssueUpdate {
        labels: Some(vec![LabelsOp::Set(final_labels)]),
        ..Default::default()
    };
    submit_update(client, issue_key, update, "label").await
}

/// Update the components of an issue.
///
/// Every component name is validated against the project's create
/// metadata before anything is sent. Append mode submits an `add` per
/// value not already on the issue (or nothing at all); replace mode
/// submits `remove` entries for the current components plus `add` entries
/// for the desired ones, in a single request.
#[tracing::instrument(skip(client, issue))]
pub async fn update_components(
    client: &JiraClient,
    issue_key: &str,
    mode: UpdateMode,
    components: &[String],
    issue: Option<&Issue>,
) -> Result<()> {
    if components.is_empty() && mode == UpdateMode::Append {
        return Ok(());
    }

    let fetched;
    let issue = match issue {
        Some(issue) => issue,
        None => {
            fetched = Issue::get(client, issue_key.to_string()).await?;
            &fetched
        }
    };

    validate_allowed_values(client, issue, "component", "components", components).await?;

    let current = issue.component_names();
    let Some(ops) = list_delta_ops(mode, &current, components) else {
        tracing::debug!(issue_key, "components already present, skipping update");
        return Ok(());
    };

    let update = IssueUpdate {
        components: Some(ops),
        ..Default::default()
    };
    submit_update(client, issue_key, update, "component").await
}

/// Update the affects versions of an issue. Same delta semantics as
/// [`update_components`], validated against the `versions` field.
#[tracing::instrument(skip(client, issue))]
pub async fn update_affects_versions(
    client: &JiraClient,
    issue_key: &str,
    mode: UpdateMode,
    versions: &[String],
    issue: Option<&Issue>,
) -> Result<()> {
    if versions.is_empty() {
        return Ok(());
    }

    let fetched;
    let issue = match issue {
        Some(issue) => issue,
        None => {
            fetched = Issue::get(client, issue_key.to_string()).await?;
            &fetched
        }
    };

    validate_allowed_values(client, issue, "version", "versions", versions).await?;

    let current = issue.affects_version_names();
    let Some(ops) = list_delta_ops(mode, &current, versions) else {
        tracing::debug!(issue_key, "affects versions already present, skipping update");
        return Ok(());
    };

    let update = IssueUpdate {
        affects_versions: Some(ops),
        ..Default::default()
    };
    submit_update(client, issue_key, update, "version").await
}

/// Remove every affects version currently on an issue. No-op when the
/// issue has none.
#[tracing::instrument(skip(client, issue))]
pub async fn clear_affects_versions(
    client: &JiraClient,
    issue_key: &str,
    issue: Option<&Issue>,
) -> Result<()> {
    let fetched;
    let issue = match issue {
        Some(issue) => issue,
        None => {
            fetched = Issue::get(client, issue_key.to_string()).await?;
            &fetched
        }
    };

    let current = issue.affects_version_names();
    if current.is_empty() {
        return Ok(());
    }

    let update = IssueUpdate {
        affects_versions: Some(current.iter().map(|name| FieldOp::remove(name)).collect()),
        ..Default::default()
    };
    submit_update(client, issue_key, update, "version").await
}

/// Update the fix versions of an issue. Same delta semantics as
/// [`update_components`], validated against the `fixVersions` field.
#[tracing::instrument(skip(client, issue))]
pub async fn update_fix_versions(
    client: &JiraClient,
    issue_key: &str,
    mode: UpdateMode,
    versions: &[String],
    issue: Option<&Issue>,
) -> Result<()> {
    if versions.is_empty() {
        return Ok(());
    }

    let fetched;
    let issue = match issue {
        Some(issue) => issue,
        None => {
            fetched = Issue::get(client, issue_key.to_string()).await?;
            &fetched
        }
    };

    validate_allowed_values(client, issue, "fix version", "fixVersions", versions).await?;

    let current = issue.fix_version_names();
    let Some(ops) = list_delta_ops(mode, &current, versions) else {
        tracing::debug!(issue_key, "fix versions already present, skipping update");
        return Ok(());
    };

    let update = IssueUpdate {
        fix_versions: Some(ops),
        ..Default::default()
    };
    submit_update(client, issue_key, update, "fix version").await
}

/// Remove every fix version currently on an issue. No-op when the issue
/// has none.
#[tracing::instrument(skip(client, issue))]
pub async fn clear_fix_versions(
    client: &JiraClient,
    issue_key: &str,
    issue: Option<&Issue>,
) -> Result<()> {
    let fetched;
    let issue = match issue {
        Some(issue) => issue,
        None => {
            fetched = Issue::get(client, issue_key.to_string()).await?;
            &fetched
        }
    };

    let current = issue.fix_version_names();
    if current.is_empty() {
        return Ok(());
    }

    let update = IssueUpdate {
        fix_versions: Some(current.iter().map(|name| FieldOp::remove(name)).collect()),
        ..Default::default()
    };
    submit_update(client, issue_key, update, "fix version").await
}

/// Replace the description of an issue with a single-paragraph document.
#[tracing::instrument(skip(client, description))]
pub async fn update_description(
    client: &JiraClient,
    issue_key: &str,
    description: &str,
) -> Result<()> {
    let update = IssueUpdate {
        description: Some(vec![DescriptionOp::Set(Document::from_text(description))]),
        ..Default::default()
    };
    submit_update(client, issue_key, update, "description").await
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AssignRequest<'a> {
    account_id: &'a str,
}

/// Assign an issue to a user by account id.
#[tracing::instrument(skip(client))]
pub async fn assign_issue(client: &JiraClient, issue_key: &str, account_id: &str) -> Result<()> {
    let path = client.api(&format!("issue/{}/assignee", urlencoding::encode(issue_key)));
    let response = client.put(&path, &AssignRequest { account_id }).await?;
    response.expect_status(StatusCode::NO_CONTENT, "assignee")
}
