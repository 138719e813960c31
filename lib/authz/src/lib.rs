//! Relationship-based authorization bridge for the quarry platform.
//!
//! Fronts the centralized SpiceDB permission graph while the legacy
//! authorizer remains authoritative. Every operation is gated by a
//! per-tenant feature flag, fails open toward the legacy system, and
//! emits latency telemetry for permission checks.

mod authorizer;
mod backend;
mod client;
mod config;
mod error;
mod flags;
mod telemetry;
mod types;

pub use authorizer::RelationshipAuthorizer;
pub use backend::RelationshipBackend;
pub use client::SpiceDbBackend;
pub use config::{AuthzConfig, FlagsConfig, SpiceDbConfig};
pub use error::AuthzError;
pub use flags::{CENTRALIZED_PERMISSIONS, FlagResolver, HttpFlags, StaticFlags};
pub use telemetry::{ClientMetrics, LatencyRecorder, Observation, Operation, RecordingMetrics};
pub use types::{
    CheckRequest, ExperimentContext, MutationRequest, MutationToken, Permission, Permissionship,
    Relationship, Resource, ResourceType, Subject,
};
