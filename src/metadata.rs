//! Project create-metadata: typed DTOs, the per-client cache, and
//! allowed-value lookups.
//!
//! The createmeta response describes, per project and issue type, which
//! fields exist and which values the server accepts for them. Fetching it
//! is expensive, so the client caches it per project key for its whole
//! lifetime; mutation helpers consult the cache to resolve human-readable
//! names to server-side ids before submitting anything.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Deserialize;

use crate::client::JiraClient;
use crate::error::{JiraError, Result};

/// The createmeta response for one or more projects.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateMeta {
    #[serde(default)]
    pub projects: Vec<MetaProject>,
}

/// Create metadata for a single project.
#[derive(Debug, Clone, Deserialize)]
pub struct MetaProject {
    #[serde(default)]
    pub id: Option<String>,
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub issuetypes: Vec<MetaIssueType>,
}

/// An issue type available in a project, with its field schemas.
#[derive(Debug, Clone, Deserialize)]
pub struct MetaIssueType {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub fields: HashMap<String, MetaField>,
}

/// Schema of one field on an issue type.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaField {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub allowed_values: Vec<AllowedValue>,
}

/// One server-declared allowed value for a field.
///
/// Depending on the field the display name arrives as `name` (components,
/// versions, priorities) or `value` (option fields).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AllowedValue {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

impl AllowedValue {
    fn matches(&self, wanted: &str) -> bool {
        self.name
            .as_deref()
            .is_some_and(|n| n.eq_ignore_ascii_case(wanted))
            || self
                .value
                .as_deref()
                .is_some_and(|v| v.eq_ignore_ascii_case(wanted))
    }
}

impl CreateMeta {
    /// Find an issue type by name (case-insensitive) across all projects
    /// in the response.
    pub fn issue_type(&self, name: &str) -> Option<&MetaIssueType> {
        self.projects
            .iter()
            .flat_map(|project| &project.issuetypes)
            .find(|issue_type| issue_type.name.eq_ignore_ascii_case(name))
    }

    /// Resolve an issue type name to its server-side id.
    pub fn issue_type_id(&self, name: &str) -> Option<&str> {
        self.issue_type(name).map(|issue_type| issue_type.id.as_str())
    }

    /// Resolve an allowed value of `field` on `issue_type` to its id.
    pub fn allowed_value_id(&self, issue_type: &str, field: &str, value: &str) -> Option<&str> {
        self.issue_type(issue_type)?
            .fields
            .get(field)?
            .allowed_values
            .iter()
            .find(|allowed| allowed.matches(value))?
            .id
            .as_deref()
    }

    /// Whether `value` is accepted for `field` on `issue_type`.
    pub fn allows(&self, issue_type: &str, field: &str, value: &str) -> bool {
        self.allowed_value_id(issue_type, field, value).is_some()
    }
}

/// Per-client cache of createmeta responses, keyed by project key.
///
/// Entries are created lazily on first access and never expire; staleness
/// over a client's lifetime is an accepted tradeoff. Concurrent fetches
/// for the same key may race; both succeed, the last write wins.
#[derive(Debug, Default)]
pub struct MetadataCache {
    entries: RwLock<HashMap<String, Arc<CreateMeta>>>,
}

impl MetadataCache {
    pub(crate) fn lookup(&self, project_key: &str) -> Option<Arc<CreateMeta>> {
        self.entries
            .read()
            .ok()
            .and_then(|entries| entries.get(project_key).cloned())
    }

    pub(crate) fn store(&self, project_key: &str, meta: CreateMeta) -> Arc<CreateMeta> {
        let meta = Arc::new(meta);
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(project_key.to_string(), Arc::clone(&meta));
        }
        meta
    }

    /// Number of cached projects. Exposed for tests.
    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    /// Returns true if nothing is cached yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fetch (or return the cached) create metadata for a project.
#[tracing::instrument(skip(client))]
pub async fn create_meta(client: &JiraClient, project_key: &str) -> Result<Arc<CreateMeta>> {
    if let Some(meta) = client.metadata.lookup(project_key) {
        return Ok(meta);
    }

    let path = client.api("issue/createmeta");
    let response = client
        .get_with_query(
            &path,
            &serde_json::json!({
                "projectKeys": project_key,
                "expand": "projects.issuetypes.fields",
            }),
        )
        .await?;
    response.ensure_success()?;

    let meta: CreateMeta = response.json()?;
    tracing::debug!(project_key, "cached create metadata");
    Ok(client.metadata.store(project_key, meta))
}

/// Edit metadata for one field of an existing issue.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldMeta {
    /// The field key in the fields map (e.g. `components`).
    #[serde(skip)]
    pub key: String,
    /// Display name of the field.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "allowedValues", default)]
    pub allowed_values: Vec<AllowedValue>,
}

/// Fetch the editable-field metadata of an issue.
///
/// Malformed field entries are skipped rather than failing the whole
/// response; Jira instances with exotic custom fields ship schemas this
/// SDK does not model.
#[tracing::instrument(skip(client))]
pub async fn edit_meta(client: &JiraClient, issue_key: &str) -> Result<Vec<FieldMeta>> {
    let path = client.api(&format!("issue/{}/editmeta", urlencoding::encode(issue_key)));
    let response = client.get(&path).await?;
    response.ensure_success()?;

    let body: serde_json::Value = response.json()?;
    let mut fields = Vec::new();
    if let Some(map) = body.get("fields").and_then(|fields| fields.as_object()) {
        for (key, value) in map {
            match serde_json::from_value::<FieldMeta>(value.clone()) {
                Ok(mut field) => {
                    field.key = key.clone();
                    fields.push(field);
                }
                Err(error) => {
                    tracing::warn!(field = %key, %error, "skipping undecodable field metadata");
                }
            }
        }
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn sample_meta() -> CreateMeta {
        serde_json::from_value(json!({
            "projects": [{
                "id": "10000",
                "key": "DEMO",
                "name": "Demo",
                "issuetypes": [
                    {
                        "id": "10001",
                        "name": "Bug",
                        "fields": {
                            "priority": {
                                "name": "Priority",
                                "allowedValues": [
                                    { "id": "1", "name": "High" },
                                    { "id": "3", "name": "Medium" },
                                ],
                            },
                            "components": {
                                "name": "Components",
                                "allowedValues": [
                                    { "id": "20001", "name": "backend" },
                                    { "id": "20002", "name": "frontend" },
                                ],
                            },
                        },
                    },
                    { "id": "10002", "name": "Task", "fields": {} },
                ],
            }],
        }))
        .unwrap()
    }

    #[test]
    fn test_issue_type_lookup_is_case_insensitive() {
        let meta = sample_meta();
        assert_eq!(meta.issue_type_id("bug"), Some("10001"));
        assert_eq!(meta.issue_type_id("TASK"), Some("10002"));
        assert_eq!(meta.issue_type_id("Story"), None);
    }

    #[test]
    fn test_allowed_value_lookup() {
        let meta = sample_meta();
        assert_eq!(
            meta.allowed_value_id("Bug", "components", "backend"),
            Some("20001")
        );
        assert_eq!(
            meta.allowed_value_id("Bug", "priority", "HIGH"),
            Some("1")
        );
        assert_eq!(meta.allowed_value_id("Bug", "components", "mobile"), None);
        // Field not present on this issue type
        assert_eq!(meta.allowed_value_id("Task", "components", "backend"), None);
    }

    #[test]
    fn test_allowed_value_matches_value_key() {
        let meta: CreateMeta = serde_json::from_value(json!({
            "projects": [{
                "key": "DEMO",
                "issuetypes": [{
                    "id": "1",
                    "name": "Bug",
                    "fields": {
                        "severity": {
                            "allowedValues": [{ "id": "9", "value": "Critical" }],
                        },
                    },
                }],
            }],
        }))
        .unwrap();
        assert_eq!(meta.allowed_value_id("Bug", "severity", "critical"), Some("9"));
    }

    #[test]
    fn test_cache_store_and_lookup() {
        let cache = MetadataCache::default();
        assert!(cache.is_empty());
        assert!(cache.lookup("DEMO").is_none());

        cache.store("DEMO", sample_meta());
        assert_eq!(cache.len(), 1);
        let meta = cache.lookup("DEMO").unwrap();
        assert_eq!(meta.issue_type_id("Bug"), Some("10001"));

        // Last write wins
        cache.store("DEMO", CreateMeta::default());
        assert!(cache.lookup("DEMO").unwrap().projects.is_empty());
        assert_eq!(cache.len(), 1);
    }
}
