//! Error types for Jira API operations.

use thiserror::Error;

/// Errors that can occur during Jira API operations.
#[derive(Debug, Error)]
pub enum JiraError {
    /// Configuration is missing or incomplete.
    #[error("Jira configuration required: {0}")]
    ConfigMissing(String),

    /// The health probe exhausted its attempts without a successful response.
    #[error("could not communicate with the Jira server (last status: {status:?}, body: {body})")]
    Connectivity {
        status: Option<u16>,
        body: String,
    },

    /// The server rejected the configured credentials.
    #[error("failed to authenticate with Jira: {0}")]
    Unauthorized(String),

    /// An issue type name does not exist in the project's create metadata.
    #[error("the issue type '{issue_type}' is not available in project '{project}'")]
    UnknownIssueType {
        issue_type: String,
        project: String,
    },

    /// A named value does not exist in the server-reported allowed values
    /// for the field on this project/issue-type combination.
    #[error("the {field} '{value}' is not available in project '{project}' for issue type '{issue_type}'")]
    UnknownValue {
        field: &'static str,
        value: String,
        project: String,
        issue_type: String,
    },

    /// A mutating call returned an unexpected status code.
    #[error("the {operation} call failed with status {status}")]
    Mutation {
        operation: &'static str,
        status: u16,
    },

    /// API request failed.
    #[error("Jira API error: {message}")]
    ApiError {
        message: String,
        status_code: Option<u16>,
    },

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("Failed to parse response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),
}

/// Result type alias for Jira operations.
pub type Result<T> = core::result::Result<T, JiraError>;
