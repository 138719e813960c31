//! Authorization types for the relationship-based permission model.

use quarry_core::{OrganizationId, RepositoryId, UserId};
use std::fmt;

/// Resource types in the authorization model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    /// An organization (tenant).
    Organization,
    /// A repository.
    Repository,
    /// A user account.
    User,
}

impl ResourceType {
    /// Returns the SpiceDB type name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::Repository => "repository",
            Self::User => "user",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A resource in the authorization model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// The type of resource.
    pub resource_type: ResourceType,
    /// The resource ID.
    pub id: String,
}

impl Resource {
    /// Creates a new resource.
    #[must_use]
    pub fn new(resource_type: ResourceType, id: impl Into<String>) -> Self {
        Self {
            resource_type,
            id: id.into(),
        }
    }

    /// Creates an organization resource.
    #[must_use]
    pub fn organization(id: OrganizationId) -> Self {
        Self::new(ResourceType::Organization, id.to_string())
    }

    /// Creates a repository resource.
    #[must_use]
    pub fn repository(id: RepositoryId) -> Self {
        Self::new(ResourceType::Repository, id.to_string())
    }

    /// Creates a user resource.
    #[must_use]
    pub fn user(id: UserId) -> Self {
        Self::new(ResourceType::User, id.to_string())
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.id)
    }
}

/// A subject (actor) in the authorization model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    /// Subject type (always "user" for now).
    pub subject_type: String,
    /// Subject ID.
    pub id: String,
}

impl Subject {
    /// Creates a new user subject.
    #[must_use]
    pub fn user(id: UserId) -> Self {
        Self {
            subject_type: "user".to_string(),
            id: id.to_string(),
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.subject_type, self.id)
    }
}

/// Permission to check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Read a resource.
    Read,
    /// Write to a resource.
    Write,
    /// Delete a resource.
    Delete,
    /// Administer a resource.
    Admin,
}

impl Permission {
    /// Returns the SpiceDB permission name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Delete => "delete",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A relationship tuple between a resource and a subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// The resource.
    pub resource: Resource,
    /// The relation name (e.g., "owner", "member").
    pub relation: String,
    /// The subject.
    pub subject: Subject,
}

impl Relationship {
    /// Creates a new relationship.
    #[must_use]
    pub fn new(resource: Resource, relation: impl Into<String>, subject: Subject) -> Self {
        Self {
            resource,
            relation: relation.into(),
            subject,
        }
    }

    /// Creates a member relationship on an organization.
    #[must_use]
    pub fn organization_member(organization_id: OrganizationId, user_id: UserId) -> Self {
        Self::new(
            Resource::organization(organization_id),
            "member",
            Subject::user(user_id),
        )
    }

    /// Creates an admin relationship on an organization.
    #[must_use]
    pub fn organization_admin(organization_id: OrganizationId, user_id: UserId) -> Self {
        Self::new(
            Resource::organization(organization_id),
            "admin",
            Subject::user(user_id),
        )
    }

    /// Creates an owner relationship on a repository.
    #[must_use]
    pub fn repository_owner(repository_id: RepositoryId, user_id: UserId) -> Self {
        Self::new(
            Resource::repository(repository_id),
            "owner",
            Subject::user(user_id),
        )
    }
}

/// A permission check to evaluate against the relationship graph.
///
/// Constructed by the caller; immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRequest {
    /// The resource the permission is checked on.
    pub resource: Resource,
    /// The permission to evaluate.
    pub permission: Permission,
    /// The subject asking for the permission.
    pub subject: Subject,
}

impl CheckRequest {
    /// Creates a new check request.
    #[must_use]
    pub fn new(resource: Resource, permission: Permission, subject: Subject) -> Self {
        Self {
            resource,
            permission,
            subject,
        }
    }
}

/// An ordered set of relationship tuples to add or remove.
///
/// The same request type backs both the write and the delete
/// operations; which one it means is decided by the operation it is
/// handed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRequest {
    /// The tuples to mutate, in order.
    pub relationships: Vec<Relationship>,
}

impl MutationRequest {
    /// Creates a mutation over the given tuples.
    #[must_use]
    pub fn new(relationships: Vec<Relationship>) -> Self {
        Self { relationships }
    }

    /// Creates a mutation over a single tuple.
    #[must_use]
    pub fn single(relationship: Relationship) -> Self {
        Self {
            relationships: vec![relationship],
        }
    }
}

/// Outcome of a permission check as reported by the relationship
/// service.
///
/// Mirrors the remote enumeration exhaustively so a newly introduced
/// response state surfaces here instead of being silently coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permissionship {
    /// The remote service did not specify an outcome.
    Unspecified,
    /// The subject does not have the permission.
    NoPermission,
    /// The subject has the permission.
    HasPermission,
    /// The permission depends on caveat context that was not supplied.
    Conditional,
}

impl Permissionship {
    /// Maps the enumeration to a grant decision.
    ///
    /// Only an explicit `HasPermission` grants; every other state,
    /// including states this build does not know about yet, denies.
    #[must_use]
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::HasPermission)
    }
}

/// Opaque consistency token returned by a successful relationship
/// mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationToken {
    /// The token, when the service supplied one.
    pub token: Option<String>,
}

/// Scoping metadata for feature-flag evaluation.
///
/// Carries no authorization semantics; it only selects which tenant's
/// rollout state applies to a call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExperimentContext {
    /// The organization whose rollout state applies, if any.
    pub organization_id: Option<OrganizationId>,
}

impl ExperimentContext {
    /// Context with no tenant scope.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Context scoped to an organization.
    #[must_use]
    pub fn for_organization(organization_id: OrganizationId) -> Self {
        Self {
            organization_id: Some(organization_id),
        }
    }
}
