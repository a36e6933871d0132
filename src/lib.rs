//! Jira API client library.
//!
//! A Rust library for interacting with the Jira REST API: typed models,
//! resilient request execution with configurable retries, both Jira
//! pagination protocols behind one search engine, and delta-style issue
//! updates validated against server metadata before anything is sent.
//!
//! # Quick Start
//!
//! ```no_run
//! use jirapi::{Get, Issue, JiraClient, UpdateMode};
//!
//! #[tokio::main]
//! async fn main() -> jirapi::Result<()> {
//!     // Create client from environment variables
//!     let client = JiraClient::from_env()?;
//!
//!     // Fetch an issue by key
//!     let issue = Issue::get(&client, "DEMO-1".to_string()).await?;
//!     println!("Summary: {:?}", issue.fields.summary);
//!
//!     // Search with JQL across all result pages
//!     let bugs = jirapi::search_issues_jql(&client, "project = DEMO AND type = Bug").await?;
//!     println!("Found {} bugs", bugs.len());
//!
//!     // Append a label (no-op if it is already there)
//!     jirapi::update_labels(
//!         &client,
//!         "DEMO-1",
//!         UpdateMode::Append,
//!         &["triaged".to_string()],
//!         None,
//!     )
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! The library is organized in layers:
//!
//! - [`JiraClient`] verifies connectivity once per client (the connection
//!   gate), attaches credentials, and executes every request with the
//!   configured retry policy.
//! - The pagination engine drives the two Jira protocols: token-cursor
//!   searches run strictly sequentially, offset searches fan the
//!   remaining pages out concurrently once the total is known.
//! - Entity types implement [`Get`]/[`Update`] where the API supports
//!   them; everything else is a convenience function on the model module.
//! - Mutation helpers ([`update_labels`], [`update_components`], ...)
//!   compute add/remove deltas against the issue's current state and
//!   validate names against cached project metadata before submitting.
//!
//! # Configuration
//!
//! [`JiraClient::from_env`] reads:
//!
//! - `JIRA_URL` (required) - Base URL of the Jira instance
//! - `JIRA_USER` + `JIRA_API_TOKEN` - Basic auth credentials
//! - `JIRA_AUTH_TOKEN` - Bearer token, when basic auth is not set
//!
//! Everything else (API version, page size, retries, timeouts) is
//! configured through [`JiraConfig`].

mod client;
mod document;
mod error;
mod metadata;
mod models;
mod mutation;
mod pagination;
mod traits;

// Re-export core types
pub use client::{ApiResponse, Auth, JiraClient, JiraConfig};
pub use error::{JiraError, Result};
pub use pagination::{
    search_all_offset, search_all_paged, search_count, OffsetPage, SearchFilter, TokenPage,
    TokenPagedRequest, DEFAULT_PAGE_SIZE,
};

// Re-export traits
pub use traits::{Get, Update};

// Re-export documents
pub use document::{Body, Document, Node};

// Re-export metadata types and lookups
pub use metadata::{
    create_meta, edit_meta, AllowedValue, CreateMeta, FieldMeta, MetaField, MetaIssueType,
    MetaProject, MetadataCache,
};

// Re-export the issue update grammar and delta helpers
pub use mutation::{
    assign_issue, clear_affects_versions, clear_fix_versions, update_affects_versions,
    update_components, update_description, update_fix_versions, update_labels, DescriptionOp,
    FieldOp, FieldRef, IssueUpdate, LabelsOp, UpdateIssueRequest, UpdateMode,
};

// Re-export models
pub use models::*;
