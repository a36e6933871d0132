//! Comment model and operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::client::JiraClient;
use crate::document::{Body, Document};
use crate::error::Result;
use crate::traits::Update;

use super::user::User;

/// A comment on an issue. Bodies arrive as ADF documents on API v3.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    #[serde(default)]
    pub author: Option<User>,
    #[serde(default)]
    pub body: Option<Body>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
}

/// One page of an issue's comments (offset-paginated endpoint).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentList {
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub start_at: u64,
    #[serde(default)]
    pub max_results: u64,
    #[serde(default)]
    pub total: u64,
}

/// Paging and expansion options for listing comments.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCommentsOptions {
    pub start_at: u64,
    pub max_results: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expand: Option<String>,
}

impl Default for ListCommentsOptions {
    fn default() -> Self {
        Self {
            start_at: 0,
            max_results: 50,
            order_by: None,
            expand: None,
        }
    }
}

#[derive(Serialize)]
struct CommentBody {
    body: Document,
}

/// Fetch one page of an issue's comments.
#[tracing::instrument(skip(client, options))]
pub async fn comments(
    client: &JiraClient,
    issue_key: &str,
    options: &ListCommentsOptions,
) -> Result<CommentList> {
    let path = client.api(&format!("issue/{}/comment", urlencoding::encode(issue_key)));
    let response = client.get_with_query(&path, options).await?;
    response.ensure_success()?;
    response.json()
}

/// Add a comment to an issue. The text is wrapped in a single-paragraph
/// ADF document.
#[tracing::instrument(skip(client, body))]
pub async fn add_comment(client: &JiraClient, issue_key: &str, body: &str) -> Result<Comment> {
    let path = client.api(&format!("issue/{}/comment", urlencoding::encode(issue_key)));
    let request = CommentBody {
        body: Document::from_text(body),
    };
    let response = client.post(&path, &request).await?;
    response.expect_status(StatusCode::CREATED, "comment create")?;
    response.json()
}

/// Fetch a single comment.
#[tracing::instrument(skip(client))]
pub async fn comment(client: &JiraClient, issue_key: &str, comment_id: &str) -> Result<Comment> {
    let path = client.api(&format!(
        "issue/{}/comment/{}",
        urlencoding::encode(issue_key),
        urlencoding::encode(comment_id)
    ));
    let response = client.get(&path).await?;
    response.ensure_success()?;
    response.json()
}

#[async_trait]
impl Update for Comment {
    /// `(issue_key, comment_id)`.
    type Id = (String, String);
    /// The new comment text.
    type Params = String;

    #[tracing::instrument(skip(client, body))]
    async fn update(client: &JiraClient, id: Self::Id, body: Self::Params) -> Result<Self> {
        let (issue_key, comment_id) = id;
        let path = client.api(&format!(
            "issue/{}/comment/{}",
            urlencoding::encode(&issue_key),
            urlencoding::encode(&comment_id)
        ));
        let request = CommentBody {
            body: Document::from_text(body),
        };
        let response = client.put(&path, &request).await?;
        response.ensure_success()?;
        response.json()
    }
}

/// Replace the text of a comment.
pub async fn update_comment(
    client: &JiraClient,
    issue_key: &str,
    comment_id: &str,
    body: &str,
) -> Result<Comment> {
    Comment::update(
        client,
        (issue_key.to_string(), comment_id.to_string()),
        body.to_string(),
    )
    .await
}

/// Delete a comment.
#[tracing::instrument(skip(client))]
pub async fn delete_comment(client: &JiraClient, issue_key: &str, comment_id: &str) -> Result<()> {
    let path = client.api(&format!(
        "issue/{}/comment/{}",
        urlencoding::encode(issue_key),
        urlencoding::encode(comment_id)
    ));
    let response = client.delete(&path).await?;
    response.expect_status(StatusCode::NO_CONTENT, "comment delete")
}
