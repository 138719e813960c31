//! Latency and outcome telemetry for relationship-service calls.

use crate::error::AuthzError;
use crate::types::Permission;
use metrics::{counter, histogram};
use rootcause::Report;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

/// The bridge operation an observation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// A permission check.
    Check,
    /// A relationship write.
    WriteRelationships,
    /// A relationship delete.
    DeleteRelationships,
}

impl Operation {
    /// Returns the metric label value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Check => "check",
            Self::WriteRelationships => "write_relationships",
            Self::DeleteRelationships => "delete_relationships",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Records one latency/outcome observation per completed RPC attempt.
///
/// Side-effect only; implementations must never fail and must be cheap
/// enough to sit on the check hot path.
pub trait LatencyRecorder: Send + Sync {
    /// Records a completed attempt.
    ///
    /// `error` is `None` for successful attempts, so downstream
    /// dashboards can split latency distributions from error rates per
    /// operation and permission.
    fn observe(
        &self,
        operation: Operation,
        permission: Permission,
        error: Option<&Report<AuthzError>>,
        elapsed: Duration,
    );
}

/// Production recorder emitting through the `metrics` facade.
///
/// Deployments install their own exporter; without one, the macros are
/// no-ops.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientMetrics;

impl LatencyRecorder for ClientMetrics {
    fn observe(
        &self,
        operation: Operation,
        permission: Permission,
        error: Option<&Report<AuthzError>>,
        elapsed: Duration,
    ) {
        let status = if error.is_some() { "error" } else { "success" };

        counter!(
            "relationship_client_requests_total",
            "operation" => operation.as_str(),
            "permission" => permission.as_str(),
            "status" => status
        )
        .increment(1);

        histogram!(
            "relationship_client_duration_seconds",
            "operation" => operation.as_str(),
            "permission" => permission.as_str()
        )
        .record(elapsed.as_secs_f64());
    }
}

/// A single captured observation.
#[derive(Debug, Clone)]
pub struct Observation {
    /// The operation observed.
    pub operation: Operation,
    /// The permission label.
    pub permission: Permission,
    /// Rendered error, when the attempt failed.
    pub error: Option<String>,
    /// Elapsed time of the attempt.
    pub elapsed: Duration,
}

/// Capturing recorder for tests.
#[derive(Debug, Default)]
pub struct RecordingMetrics {
    observations: Mutex<Vec<Observation>>,
}

impl RecordingMetrics {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains and returns everything recorded so far.
    pub fn take(&self) -> Vec<Observation> {
        std::mem::take(&mut self.observations.lock().unwrap())
    }

    /// Returns the number of recorded observations.
    pub fn len(&self) -> usize {
        self.observations.lock().unwrap().len()
    }

    /// Returns whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LatencyRecorder for RecordingMetrics {
    fn observe(
        &self,
        operation: Operation,
        permission: Permission,
        error: Option<&Report<AuthzError>>,
        elapsed: Duration,
    ) {
        self.observations.lock().unwrap().push(Observation {
            operation,
            permission,
            error: error.map(|report| format!("{report:?}")),
            elapsed,
        });
    }
}
