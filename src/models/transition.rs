//! Issue workflow transitions.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::JiraClient;
use crate::document::Document;
use crate::error::Result;

use super::issue::{IdRef, Status};

/// A workflow transition available on an issue.
#[derive(Debug, Clone, Deserialize)]
pub struct Transition {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// The status the issue ends up in.
    #[serde(default)]
    pub to: Option<Status>,
}

#[derive(Debug, Default, Deserialize)]
struct TransitionList {
    #[serde(default)]
    transitions: Vec<Transition>,
}

/// Fetch the transitions currently available on an issue.
#[tracing::instrument(skip(client))]
pub async fn transitions(
    client: &JiraClient,
    issue_key: &str,
    expand: Option<&str>,
) -> Result<Vec<Transition>> {
    let path = client.api(&format!(
        "issue/{}/transitions",
        urlencoding::encode(issue_key)
    ));
    let response = match expand {
        Some(expand) => {
            client
                .get_with_query(&path, &serde_json::json!({ "expand": expand }))
                .await?
        }
        None => client.get(&path).await?,
    };
    response.ensure_success()?;
    let list: TransitionList = response.json()?;
    Ok(list.transitions)
}

#[derive(Serialize)]
struct TransitionRequest {
    transition: IdRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    update: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<Value>,
}

/// Move an issue through a workflow transition.
///
/// An optional comment is attached through the transition's update
/// section as an ADF document; `fields` passes through arbitrary field
/// updates the transition screen accepts.
#[tracing::instrument(skip(client, comment, fields))]
pub async fn transition_issue(
    client: &JiraClient,
    issue_key: &str,
    transition_id: &str,
    comment: Option<&str>,
    fields: Option<Value>,
) -> Result<()> {
    let update = comment.map(|text| {
        serde_json::json!({
            "comment": [{
                "add": { "body": Document::from_text(text) },
            }],
        })
    });

    let request = TransitionRequest {
        transition: IdRef {
            id: transition_id.to_string(),
        },
        update,
        fields,
    };

    let path = client.api(&format!(
        "issue/{}/transitions",
        urlencoding::encode(issue_key)
    ));
    let response = client.post(&path, &request).await?;
    response.expect_status(StatusCode::NO_CONTENT, "transition")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_transition_deserialize() {
        let list: TransitionList = serde_json::from_value(json!({
            "transitions": [
                { "id": "11", "name": "Start Progress", "to": { "id": "3", "name": "In Progress" } },
                { "id": "21", "name": "Done" },
            ],
        }))
        .unwrap();
        assert_eq!(list.transitions.len(), 2);
        assert_eq!(list.transitions[0].name.as_deref(), Some("Start Progress"));
    }

    #[test]
    fn test_transition_request_wraps_comment_in_document() {
        let request = TransitionRequest {
            transition: IdRef { id: "11".to_string() },
            update: Some(json!({
                "comment": [{ "add": { "body": Document::from_text("moving on") } }],
            })),
            fields: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["transition"]["id"], "11");
        let body = &value["update"]["comment"][0]["add"]["body"];
        assert_eq!(body["type"], "doc");
        assert_eq!(body["content"][0]["content"][0]["text"], "moving on");
        assert!(value.get("fields").is_none());
    }
}
