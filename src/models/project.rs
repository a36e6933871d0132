//! Project model and operations.
//!
//! Projects are the containers issues live in. Besides the project record
//! itself this module exposes the project-scoped catalogs (versions,
//! components) that mutation helpers validate against.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::JiraClient;
use crate::error::{JiraError, Result};
use crate::pagination::{self, SearchFilter, TokenPage, TokenPagedRequest};
use crate::traits::Get;

/// A Jira project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default)]
    pub id: Option<String>,
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "self", default)]
    pub self_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub project_type_key: Option<String>,
    #[serde(default)]
    pub simplified: Option<bool>,
}

/// A project version (used for both affects- and fix-version fields).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub archived: Option<bool>,
    #[serde(default)]
    pub released: Option<bool>,
    #[serde(default)]
    pub release_date: Option<String>,
}

/// A project component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectComponent {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Query for the paginated project search endpoint.
///
/// The endpoint still addresses pages numerically, but reports its cursor
/// as a `nextPageToken` string carrying the next `startAt`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSearchRequest {
    /// Filter projects by name, key or description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_at: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u32>,
}

impl ProjectSearchRequest {
    /// A request filtering by `query`.
    pub fn with_query(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Default::default()
        }
    }
}

impl TokenPagedRequest for ProjectSearchRequest {
    fn normalize_page_size(&mut self, default: u32) {
        if self.max_results.map_or(true, |max| max == 0) {
            self.max_results = Some(default);
        }
        self.start_at = Some(self.start_at.unwrap_or(0));
    }

    fn apply_page_token(&mut self, token: &str) -> Result<()> {
        let start_at = token.parse().map_err(|_| JiraError::ApiError {
            message: format!("project search returned an unexpected page token '{token}'"),
            status_code: None,
        })?;
        self.start_at = Some(start_at);
        Ok(())
    }
}

#[async_trait]
impl Get for Project {
    type Id = String; // Project key or id

    #[tracing::instrument(skip(client))]
    async fn get(client: &JiraClient, key: String) -> Result<Self> {
        let path = client.api(&format!("project/{}", urlencoding::encode(&key)));
        let response = client.get(&path).await?;
        response.ensure_success()?;
        response.json()
    }
}

/// Search projects through the paginated project search endpoint.
///
/// # Example
///
/// ```ignore
/// use jirapi::{search_projects, ProjectSearchRequest, SearchFilter};
///
/// let matches = search_projects(
///     &client,
///     ProjectSearchRequest::with_query("payments"),
///     SearchFilter::all(),
/// ).await?;
/// ```
#[tracing::instrument(skip(client, filter))]
pub async fn search_projects(
    client: &JiraClient,
    request: ProjectSearchRequest,
    filter: SearchFilter<'_, Project>,
) -> Result<Vec<Project>> {
    pagination::search_all_paged(
        request,
        |request| {
            let client = client.clone();
            async move {
                let response = client
                    .get_with_query(&client.api("project/search"), &request)
                    .await?;
                response.ensure_success()?;
                response.json::<TokenPage<Project>>()
            }
        },
        filter,
        client.default_page_size(),
    )
    .await
}

/// Fetch every project visible to the authenticated user.
pub async fn projects(client: &JiraClient) -> Result<Vec<Project>> {
    search_projects(client, ProjectSearchRequest::default(), SearchFilter::all()).await
}

/// Fetch projects whose key or name equals `name_or_key` (case-insensitive).
///
/// The server-side `query` filter narrows the candidate pages; the exact
/// comparison happens client-side.
pub async fn find_projects(client: &JiraClient, name_or_key: &str) -> Result<Vec<Project>> {
    search_projects(
        client,
        ProjectSearchRequest::with_query(name_or_key),
        SearchFilter::matching(move |project: &Project| {
            project.key.eq_ignore_ascii_case(name_or_key)
                || project
                    .name
                    .as_deref()
                    .is_some_and(|name| name.eq_ignore_ascii_case(name_or_key))
        }),
    )
    .await
}

/// Fetch the versions of a project.
#[tracing::instrument(skip(client))]
pub async fn project_versions(client: &JiraClient, project_key: &str) -> Result<Vec<Version>> {
    let path = client.api(&format!(
        "project/{}/versions",
        urlencoding::encode(project_key)
    ));
    let response = client.get(&path).await?;
    response.ensure_success()?;
    response.json()
}

/// Fetch the components of a project.
#[tracing::instrument(skip(client))]
pub async fn project_components(
    client: &JiraClient,
    project_key: &str,
) -> Result<Vec<ProjectComponent>> {
    let path = client.api(&format!(
        "project/{}/components",
        urlencoding::encode(project_key)
    ));
    let response = client.get(&path).await?;
    response.ensure_success()?;
    response.json()
}

/// Fetch a single version by id.
#[tracing::instrument(skip(client))]
pub async fn version(client: &JiraClient, version_id: &str) -> Result<Version> {
    let path = client.api(&format!("version/{}", urlencoding::encode(version_id)));
    let response = client.get(&path).await?;
    response.ensure_success()?;
    response.json()
}

/// Fetch a single component by id.
#[tracing::instrument(skip(client))]
pub async fn component(client: &JiraClient, component_id: &str) -> Result<ProjectComponent> {
    let path = client.api(&format!("component/{}", urlencoding::encode(component_id)));
    let response = client.get(&path).await?;
    response.ensure_success()?;
    response.json()
}
