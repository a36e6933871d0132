//! Get trait for fetching single entities.

use async_trait::async_trait;

use crate::client::JiraClient;
use crate::error::Result;

/// Fetch a single entity by its identifier.
///
/// Implement this trait for entity types that can be fetched individually
/// by a unique identifier (typically an issue key or project key).
///
/// # Example
///
/// ```ignore
/// use jirapi::{JiraClient, Issue, Get};
///
/// let client = JiraClient::from_env()?;
/// let issue = Issue::get(&client, "DEMO-1".to_string()).await?;
/// ```
#[async_trait]
pub trait Get: Sized {
    /// The ID type for this entity (e.g., an issue key).
    type Id;

    /// Fetch the entity by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found or the request fails.
    async fn get(client: &JiraClient, id: Self::Id) -> Result<Self>;
}
