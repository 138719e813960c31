//! SpiceDB implementation of the relationship-service transport.

use crate::backend::RelationshipBackend;
use crate::error::AuthzError;
use crate::types::{
    CheckRequest, MutationRequest, MutationToken, Permissionship, Relationship, Resource, Subject,
};
use async_trait::async_trait;
use quarry_core::Result;
use spicedb_client::SpicedbClient;
use spicedb_grpc::authzed::api::v1::{
    CheckPermissionRequest, Consistency, ObjectReference, RelationshipUpdate, SubjectReference,
    WriteRelationshipsRequest, check_permission_response, relationship_update,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// SpiceDB-backed relationship service transport.
///
/// Wraps the underlying gRPC client behind a mutex to satisfy its
/// `&mut self` call signatures while staying cheaply cloneable for
/// sharing across request handlers.
#[derive(Clone)]
pub struct SpiceDbBackend {
    inner: Arc<Mutex<SpicedbClient>>,
}

impl SpiceDbBackend {
    /// Connects to a SpiceDB endpoint.
    ///
    /// The endpoint and preshared key are leaked to satisfy the
    /// `'static` lifetime requirements of the underlying gRPC client;
    /// the backend is expected to live for the duration of the
    /// process.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub async fn connect(
        endpoint: String,
        preshared_key: String,
    ) -> Result<Self, AuthzError> {
        let endpoint: &'static str = Box::leak(endpoint.into_boxed_str());
        let preshared_key: &'static str = Box::leak(preshared_key.into_boxed_str());

        let client = SpicedbClient::from_url_and_preshared_key(endpoint, preshared_key)
            .await
            .map_err(|e| AuthzError::ConnectionFailed {
                details: e.to_string(),
            })?;

        Ok(Self {
            inner: Arc::new(Mutex::new(client)),
        })
    }
}

#[async_trait]
impl RelationshipBackend for SpiceDbBackend {
    #[instrument(skip(self), fields(resource = %request.resource, permission = %request.permission))]
    async fn check_permission(&self, request: &CheckRequest) -> Result<Permissionship, AuthzError> {
        let mut client = self.inner.lock().await;
        let response = client
            .check_permission(check_permission_request(request))
            .await
            .map_err(|e| AuthzError::RequestFailed {
                details: e.to_string(),
            })?;

        let permissionship = permissionship_from_response(response.permissionship());
        debug!(?permissionship, "permission check result");

        Ok(permissionship)
    }

    #[instrument(skip_all, fields(tuples = request.relationships.len()))]
    async fn write_relationships(
        &self,
        request: &MutationRequest,
    ) -> Result<MutationToken, AuthzError> {
        self.mutate(request, relationship_update::Operation::Touch)
            .await
    }

    #[instrument(skip_all, fields(tuples = request.relationships.len()))]
    async fn delete_relationships(
        &self,
        request: &MutationRequest,
    ) -> Result<MutationToken, AuthzError> {
        self.mutate(request, relationship_update::Operation::Delete)
            .await
    }
}

impl SpiceDbBackend {
    /// Applies a tuple-set mutation in a single RPC.
    ///
    /// Both additions and removals go through the write endpoint as
    /// `TOUCH`/`DELETE` updates; the service's delete-by-filter call
    /// does not accept tuple sets.
    async fn mutate(
        &self,
        request: &MutationRequest,
        operation: relationship_update::Operation,
    ) -> Result<MutationToken, AuthzError> {
        let updates = request
            .relationships
            .iter()
            .map(|relationship| tuple_update(relationship, operation))
            .collect();

        let mut client = self.inner.lock().await;
        let response = client
            .write_relationships(WriteRelationshipsRequest {
                updates,
                ..Default::default()
            })
            .await
            .map_err(|e| AuthzError::RequestFailed {
                details: e.to_string(),
            })?;

        Ok(MutationToken {
            token: response.written_at.map(|t| t.token),
        })
    }
}

fn object_reference(resource: &Resource) -> ObjectReference {
    ObjectReference {
        object_type: resource.resource_type.as_str().to_string(),
        object_id: resource.id.clone(),
    }
}

fn subject_reference(subject: &Subject) -> SubjectReference {
    SubjectReference {
        object: Some(ObjectReference {
            object_type: subject.subject_type.clone(),
            object_id: subject.id.clone(),
        }),
        optional_relation: String::new(),
    }
}

fn check_permission_request(request: &CheckRequest) -> CheckPermissionRequest {
    CheckPermissionRequest {
        resource: Some(object_reference(&request.resource)),
        permission: request.permission.as_str().to_string(),
        subject: Some(subject_reference(&request.subject)),
        consistency: Some(Consistency {
            requirement: Some(
                spicedb_grpc::authzed::api::v1::consistency::Requirement::FullyConsistent(true),
            ),
        }),
        ..Default::default()
    }
}

fn tuple_update(
    relationship: &Relationship,
    operation: relationship_update::Operation,
) -> RelationshipUpdate {
    RelationshipUpdate {
        operation: operation as i32,
        relationship: Some(spicedb_grpc::authzed::api::v1::Relationship {
            resource: Some(object_reference(&relationship.resource)),
            relation: relationship.relation.clone(),
            subject: Some(subject_reference(&relationship.subject)),
            optional_caveat: None,
        }),
    }
}

fn permissionship_from_response(
    permissionship: check_permission_response::Permissionship,
) -> Permissionship {
    match permissionship {
        check_permission_response::Permissionship::HasPermission => Permissionship::HasPermission,
        check_permission_response::Permissionship::NoPermission => Permissionship::NoPermission,
        check_permission_response::Permissionship::ConditionalPermission => {
            Permissionship::Conditional
        }
        check_permission_response::Permissionship::Unspecified => Permissionship::Unspecified,
    }
}
