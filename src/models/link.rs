//! Issue links: relationships between issues.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::client::JiraClient;
use crate::document::Document;
use crate::error::Result;
use crate::traits::Get;

use super::issue::Issue;

/// A link type (e.g. "Blocks", "Relates").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkType {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub inward: Option<String>,
    #[serde(default)]
    pub outward: Option<String>,
}

/// The issue on the other end of a link. Carries identifiers only; fetch
/// the full issue separately when needed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedIssue {
    #[serde(default)]
    pub id: Option<String>,
    pub key: String,
}

/// A link between two issues.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueLink {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub link_type: Option<LinkType>,
    #[serde(default)]
    pub inward_issue: Option<LinkedIssue>,
    #[serde(default)]
    pub outward_issue: Option<LinkedIssue>,
}

#[derive(Deserialize)]
struct LinkTypeList {
    #[serde(rename = "issueLinkTypes", default)]
    issue_link_types: Vec<LinkType>,
}

/// Fetch the link types the server supports.
#[tracing::instrument(skip(client))]
pub async fn link_types(client: &JiraClient) -> Result<Vec<LinkType>> {
    let response = client.get(&client.api("issueLinkType")).await?;
    response.ensure_success()?;
    let list: LinkTypeList = response.json()?;
    Ok(list.issue_link_types)
}

#[derive(Serialize)]
struct NameRef {
    name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateLinkRequest {
    #[serde(rename = "type")]
    link_type: NameRef,
    inward_issue: LinkKeyRef,
    outward_issue: LinkKeyRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<LinkComment>,
}

#[derive(Serialize)]
struct LinkKeyRef {
    key: String,
}

#[derive(Serialize)]
struct LinkComment {
    body: Document,
}

/// Link two issues.
///
/// The link type is matched case-insensitively against the server's link
/// types; an unknown type is skipped without error, as is a link that
/// already exists on the outward issue. Pass `outward` to spare the
/// lookup fetch when the caller already holds the issue.
#[tracing::instrument(skip(client, outward, comment))]
pub async fn link_issues(
    client: &JiraClient,
    link_type: &str,
    outward_key: &str,
    inward_key: &str,
    outward: Option<&Issue>,
    comment: Option<&str>,
) -> Result<()> {
    if link_type.is_empty() || outward_key.is_empty() || inward_key.is_empty() {
        return Ok(());
    }

    let types = link_types(client).await?;
    let Some(resolved) = types
        .iter()
        .find(|candidate| candidate.name.eq_ignore_ascii_case(link_type))
    else {
        tracing::warn!(link_type, "link type not available on this server, skipping");
        return Ok(());
    };

    let fetched;
    let outward_issue = match outward {
        Some(issue) => issue,
        None => {
            fetched = Issue::get(client, outward_key.to_string()).await?;
            &fetched
        }
    };

    let already_linked = outward_issue.fields.issuelinks.iter().any(|link| {
        link.inward_issue
            .as_ref()
            .is_some_and(|issue| issue.key.eq_ignore_ascii_case(inward_key))
    });
    if already_linked {
        tracing::debug!(outward_key, inward_key, "issues already linked, skipping");
        return Ok(());
    }

    let request = CreateLinkRequest {
        link_type: NameRef {
            name: resolved.name.clone(),
        },
        inward_issue: LinkKeyRef {
            key: inward_key.to_string(),
        },
        outward_issue: LinkKeyRef {
            key: outward_key.to_string(),
        },
        comment: comment.map(|text| LinkComment {
            body: Document::from_text(text),
        }),
    };

    let response = client.post(&client.api("issueLink"), &request).await?;
    response.expect_status(StatusCode::CREATED, "issue link")
}

/// Fetch a link by id.
#[tracing::instrument(skip(client))]
pub async fn issue_link(client: &JiraClient, link_id: &str) -> Result<IssueLink> {
    let path = client.api(&format!("issueLink/{}", urlencoding::encode(link_id)));
    let response = client.get(&path).await?;
    response.ensure_success()?;
    response.json()
}

/// Delete a link by id.
#[tracing::instrument(skip(client))]
pub async fn delete_link(client: &JiraClient, link_id: &str) -> Result<()> {
    let path = client.api(&format!("issueLink/{}", urlencoding::encode(link_id)));
    let response = client.delete(&path).await?;
    response.expect_status(StatusCode::NO_CONTENT, "issue link delete")
}
