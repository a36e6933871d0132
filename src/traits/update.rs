//! Update trait for modifying entities.

use async_trait::async_trait;

use crate::client::JiraClient;
use crate::error::Result;

/// Update an existing entity and return the updated version.
///
/// Implement this trait for entity types the API modifies in place and
/// echoes back, like comments and worklogs. Issue fields follow a
/// different update grammar (per-field add/set/remove operations) and are
/// handled by the delta helpers (`update_labels`, `update_components`,
/// ...) instead.
#[async_trait]
pub trait Update: Sized {
    /// The ID type for this entity.
    type Id;

    /// Parameters for the update.
    type Params;

    /// Update the entity and return the updated version.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found or the request fails.
    async fn update(client: &JiraClient, id: Self::Id, params: Self::Params) -> Result<Self>;
}
