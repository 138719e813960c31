//! Transport seam for the relationship service.

use crate::error::AuthzError;
use crate::types::{CheckRequest, MutationRequest, MutationToken, Permissionship};
use async_trait::async_trait;
use quarry_core::Result;

/// The three remote operations the bridge issues against the
/// relationship service.
///
/// Implementations own retry/connection semantics; the bridge performs
/// a single attempt per call and normalizes failures itself. The
/// abstraction also allows testing the bridge without a live backend.
#[async_trait]
pub trait RelationshipBackend: Send + Sync {
    /// Evaluates a permission check against the relationship graph.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote call fails.
    async fn check_permission(&self, request: &CheckRequest) -> Result<Permissionship, AuthzError>;

    /// Adds the request's relationship tuples to the graph.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote call fails.
    async fn write_relationships(
        &self,
        request: &MutationRequest,
    ) -> Result<MutationToken, AuthzError>;

    /// Removes the request's relationship tuples from the graph.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote call fails.
    async fn delete_relationships(
        &self,
        request: &MutationRequest,
    ) -> Result<MutationToken, AuthzError>;
}
