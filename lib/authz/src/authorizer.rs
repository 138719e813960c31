//! The dual-authorization bridge.
//!
//! While the legacy authorizer remains the production source of truth,
//! every call into the centralized relationship service goes through
//! this facade: admission (provisioned? flag enabled for this
//! tenant?), a single RPC attempt, and normalization of every failure
//! to a safe default. Callers must treat `false` / `None` as "defer to
//! the legacy system", never as an authoritative denial.

use crate::backend::RelationshipBackend;
use crate::client::SpiceDbBackend;
use crate::config::AuthzConfig;
use crate::error::AuthzError;
use crate::flags::{CENTRALIZED_PERMISSIONS, FlagResolver, HttpFlags, StaticFlags};
use crate::telemetry::{ClientMetrics, LatencyRecorder, Operation};
use crate::types::{CheckRequest, ExperimentContext, MutationRequest, MutationToken};
use quarry_core::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Fail-open front for the centralized relationship service.
///
/// An absent backend means the feature is not provisioned in this
/// deployment; that state short-circuits before the flag is even
/// evaluated. No error ever crosses this type's public boundary.
#[derive(Clone)]
pub struct RelationshipAuthorizer {
    backend: Option<Arc<dyn RelationshipBackend>>,
    flags: Arc<dyn FlagResolver>,
    metrics: Arc<dyn LatencyRecorder>,
}

impl RelationshipAuthorizer {
    /// Creates an authorizer from its injected capabilities.
    #[must_use]
    pub fn new(
        backend: Option<Arc<dyn RelationshipBackend>>,
        flags: Arc<dyn FlagResolver>,
        metrics: Arc<dyn LatencyRecorder>,
    ) -> Self {
        Self {
            backend,
            flags,
            metrics,
        }
    }

    /// Wires the production implementations from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a provisioned SpiceDB endpoint cannot be
    /// connected to.
    pub async fn from_config(config: &AuthzConfig) -> Result<Self, AuthzError> {
        let backend = match &config.spicedb {
            Some(spicedb) => {
                let client = SpiceDbBackend::connect(
                    spicedb.endpoint.clone(),
                    spicedb.preshared_key.clone(),
                )
                .await?;
                Some(Arc::new(client) as Arc<dyn RelationshipBackend>)
            }
            None => None,
        };

        let flags: Arc<dyn FlagResolver> = match &config.flags.service_url {
            Some(url) => Arc::new(HttpFlags::new(url)),
            None => Arc::new(StaticFlags::new(config.flags.default_enabled)),
        };

        Ok(Self::new(backend, flags, Arc::new(ClientMetrics)))
    }

    /// Checks a permission against the relationship graph.
    ///
    /// Returns `true` only when the flag is enabled for the scope and
    /// the service answers an explicit grant. Any failure is logged,
    /// recorded, and collapsed to `false`.
    pub async fn check(&self, request: &CheckRequest, context: &ExperimentContext) -> bool {
        let Some(backend) = &self.backend else {
            return false;
        };
        if !self.enabled_for(context).await {
            return false;
        }

        let started = Instant::now();
        match backend.check_permission(request).await {
            Ok(permissionship) => {
                self.metrics.observe(
                    Operation::Check,
                    request.permission,
                    None,
                    started.elapsed(),
                );
                permissionship.is_granted()
            }
            Err(report) => {
                // Two authorization systems run in parallel; a failure
                // here must not deny access on its own.
                error!(?request, error = ?report, "failed to check permission against relationship service");
                self.metrics.observe(
                    Operation::Check,
                    request.permission,
                    Some(&report),
                    started.elapsed(),
                );
                false
            }
        }
    }

    /// Adds relationship tuples to the graph.
    ///
    /// Returns the service's consistency token, or `None` when the
    /// operation was skipped or failed.
    pub async fn write_relationships(
        &self,
        request: &MutationRequest,
        context: &ExperimentContext,
    ) -> Option<MutationToken> {
        let backend = self.backend.as_ref()?;
        if !self.enabled_for(context).await {
            return None;
        }

        match backend.write_relationships(request).await {
            Ok(token) => {
                info!(?request, ?token, "wrote relationships to relationship service");
                Some(token)
            }
            Err(report) => {
                error!(?request, error = ?report, "failed to write relationships");
                None
            }
        }
    }

    /// Removes relationship tuples from the graph.
    ///
    /// Same contract and failure policy as
    /// [`write_relationships`](Self::write_relationships).
    pub async fn delete_relationships(
        &self,
        request: &MutationRequest,
        context: &ExperimentContext,
    ) -> Option<MutationToken> {
        let backend = self.backend.as_ref()?;
        if !self.enabled_for(context).await {
            return None;
        }

        match backend.delete_relationships(request).await {
            Ok(token) => {
                info!(?request, ?token, "deleted relationships from relationship service");
                Some(token)
            }
            Err(report) => {
                error!(?request, error = ?report, "failed to delete relationships");
                None
            }
        }
    }

    /// Re-evaluated on every call so rollout changes apply live.
    async fn enabled_for(&self, context: &ExperimentContext) -> bool {
        self.flags
            .is_enabled(CENTRALIZED_PERMISSIONS, context)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::RecordingMetrics;
    use crate::types::{Permission, Permissionship, Relationship, Resource, Subject};
    use async_trait::async_trait;
    use quarry_core::{OrganizationId, RepositoryId, UserId};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_test::traced_test;

    /// Scripted backend counting RPC attempts.
    #[derive(Clone)]
    struct MockBackend {
        permissionship: Permissionship,
        fail_with: Option<String>,
        calls: Arc<AtomicUsize>,
    }

    impl MockBackend {
        fn granting() -> Self {
            Self::responding(Permissionship::HasPermission)
        }

        fn responding(permissionship: Permissionship) -> Self {
            Self {
                permissionship,
                fail_with: None,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn failing(details: impl Into<String>) -> Self {
            Self {
                permissionship: Permissionship::Unspecified,
                fail_with: Some(details.into()),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn attempt<T>(&self, ok: T) -> Result<T, AuthzError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.fail_with {
                Some(details) => Err(AuthzError::RequestFailed {
                    details: details.clone(),
                }
                .into()),
                None => Ok(ok),
            }
        }
    }

    #[async_trait]
    impl RelationshipBackend for MockBackend {
        async fn check_permission(
            &self,
            _request: &CheckRequest,
        ) -> Result<Permissionship, AuthzError> {
            self.attempt(self.permissionship)
        }

        async fn write_relationships(
            &self,
            _request: &MutationRequest,
        ) -> Result<MutationToken, AuthzError> {
            self.attempt(MutationToken {
                token: Some("zed-token-1".to_string()),
            })
        }

        async fn delete_relationships(
            &self,
            _request: &MutationRequest,
        ) -> Result<MutationToken, AuthzError> {
            self.attempt(MutationToken {
                token: Some("zed-token-2".to_string()),
            })
        }
    }

    /// Flag resolver counting evaluations.
    #[derive(Clone)]
    struct CountingFlags {
        enabled: bool,
        evaluations: Arc<AtomicUsize>,
    }

    impl CountingFlags {
        fn new(enabled: bool) -> Self {
            Self {
                enabled,
                evaluations: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn evaluations(&self) -> usize {
            self.evaluations.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FlagResolver for CountingFlags {
        async fn is_enabled(&self, _flag: &str, _scope: &ExperimentContext) -> bool {
            self.evaluations.fetch_add(1, Ordering::SeqCst);
            self.enabled
        }
    }

    fn bridge(
        backend: Option<MockBackend>,
        flags: impl FlagResolver + 'static,
        metrics: Arc<RecordingMetrics>,
    ) -> RelationshipAuthorizer {
        RelationshipAuthorizer::new(
            backend.map(|b| Arc::new(b) as Arc<dyn RelationshipBackend>),
            Arc::new(flags),
            metrics,
        )
    }

    fn read_request() -> CheckRequest {
        CheckRequest::new(
            Resource::repository(RepositoryId::new()),
            Permission::Read,
            Subject::user(UserId::new()),
        )
    }

    fn mutation_request() -> MutationRequest {
        MutationRequest::single(Relationship::repository_owner(
            RepositoryId::new(),
            UserId::new(),
        ))
    }

    #[tokio::test]
    async fn unprovisioned_check_denies_without_side_effects() {
        let flags = CountingFlags::new(true);
        let metrics = Arc::new(RecordingMetrics::new());
        let authorizer = bridge(None, flags.clone(), metrics.clone());

        let granted = authorizer
            .check(&read_request(), &ExperimentContext::none())
            .await;

        assert!(!granted);
        assert_eq!(flags.evaluations(), 0);
        assert!(metrics.is_empty());
    }

    #[tokio::test]
    async fn unprovisioned_mutations_skip_flag_evaluation() {
        let flags = CountingFlags::new(true);
        let metrics = Arc::new(RecordingMetrics::new());
        let authorizer = bridge(None, flags.clone(), metrics.clone());
        let context = ExperimentContext::none();

        assert!(
            authorizer
                .write_relationships(&mutation_request(), &context)
                .await
                .is_none()
        );
        assert!(
            authorizer
                .delete_relationships(&mutation_request(), &context)
                .await
                .is_none()
        );
        assert_eq!(flags.evaluations(), 0);
        assert!(metrics.is_empty());
    }

    #[tokio::test]
    async fn disabled_flag_skips_the_rpc() {
        let backend = MockBackend::granting();
        let metrics = Arc::new(RecordingMetrics::new());
        let authorizer = bridge(
            Some(backend.clone()),
            CountingFlags::new(false),
            metrics.clone(),
        );

        let granted = authorizer
            .check(&read_request(), &ExperimentContext::none())
            .await;

        assert!(!granted);
        assert_eq!(backend.calls(), 0);
        assert!(metrics.is_empty());
    }

    #[tokio::test]
    async fn enabled_check_grants_and_records_one_observation() {
        let backend = MockBackend::granting();
        let metrics = Arc::new(RecordingMetrics::new());
        let authorizer = bridge(
            Some(backend.clone()),
            CountingFlags::new(true),
            metrics.clone(),
        );

        let granted = authorizer
            .check(&read_request(), &ExperimentContext::none())
            .await;

        assert!(granted);
        assert_eq!(backend.calls(), 1);

        let observations = metrics.take();
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].operation, Operation::Check);
        assert_eq!(observations[0].permission, Permission::Read);
        assert!(observations[0].error.is_none());
    }

    #[tokio::test]
    async fn non_grant_permissionships_deny() {
        for permissionship in [
            Permissionship::NoPermission,
            Permissionship::Conditional,
            Permissionship::Unspecified,
        ] {
            let metrics = Arc::new(RecordingMetrics::new());
            let authorizer = bridge(
                Some(MockBackend::responding(permissionship)),
                CountingFlags::new(true),
                metrics.clone(),
            );

            let granted = authorizer
                .check(&read_request(), &ExperimentContext::none())
                .await;

            assert!(!granted, "{permissionship:?} must not grant");
            // A non-grant answer is still a completed attempt.
            assert_eq!(metrics.len(), 1);
            assert!(metrics.take()[0].error.is_none());
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn failed_check_denies_records_error_and_logs_the_request() {
        let backend = MockBackend::failing("deadline exceeded");
        let metrics = Arc::new(RecordingMetrics::new());
        let authorizer = bridge(
            Some(backend.clone()),
            CountingFlags::new(true),
            metrics.clone(),
        );
        let request = read_request();

        let granted = authorizer.check(&request, &ExperimentContext::none()).await;

        assert!(!granted);
        assert_eq!(backend.calls(), 1);

        let observations = metrics.take();
        assert_eq!(observations.len(), 1);
        assert!(
            observations[0]
                .error
                .as_deref()
                .unwrap()
                .contains("deadline exceeded")
        );

        assert!(logs_contain(
            "failed to check permission against relationship service"
        ));
        assert!(logs_contain(&request.resource.id));
    }

    #[tokio::test]
    #[traced_test]
    async fn successful_write_returns_token_and_logs_request_and_response() {
        let metrics = Arc::new(RecordingMetrics::new());
        let authorizer = bridge(
            Some(MockBackend::granting()),
            CountingFlags::new(true),
            metrics.clone(),
        );
        let request = mutation_request();

        let token = authorizer
            .write_relationships(&request, &ExperimentContext::none())
            .await;

        assert_eq!(token.unwrap().token.as_deref(), Some("zed-token-1"));
        // Latency telemetry is deliberately limited to checks.
        assert!(metrics.is_empty());

        assert!(logs_contain("wrote relationships to relationship service"));
        assert!(logs_contain("zed-token-1"));
        assert!(logs_contain(&request.relationships[0].resource.id));
    }

    #[tokio::test]
    #[traced_test]
    async fn failed_write_returns_none_and_logs_the_request() {
        let metrics = Arc::new(RecordingMetrics::new());
        let authorizer = bridge(
            Some(MockBackend::failing("unavailable")),
            CountingFlags::new(true),
            metrics.clone(),
        );
        let request = mutation_request();

        let token = authorizer
            .write_relationships(&request, &ExperimentContext::none())
            .await;

        assert!(token.is_none());
        assert!(metrics.is_empty());
        assert!(logs_contain("failed to write relationships"));
        assert!(logs_contain(&request.relationships[0].resource.id));
    }

    #[tokio::test]
    async fn delete_mirrors_the_write_contract() {
        let backend = MockBackend::granting();
        let metrics = Arc::new(RecordingMetrics::new());
        let authorizer = bridge(
            Some(backend.clone()),
            CountingFlags::new(true),
            metrics.clone(),
        );
        let context = ExperimentContext::none();

        let token = authorizer
            .delete_relationships(&mutation_request(), &context)
            .await;
        assert_eq!(token.unwrap().token.as_deref(), Some("zed-token-2"));
        assert_eq!(backend.calls(), 1);
        assert!(metrics.is_empty());

        let failing = MockBackend::failing("unavailable");
        let authorizer = bridge(
            Some(failing),
            CountingFlags::new(true),
            Arc::new(RecordingMetrics::new()),
        );
        assert!(
            authorizer
                .delete_relationships(&mutation_request(), &context)
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn organization_scope_does_not_leak_across_tenants() {
        let enabled_org = OrganizationId::new();
        let other_org = OrganizationId::new();
        let flags = StaticFlags::new(false).with_organization(enabled_org, true);
        let metrics = Arc::new(RecordingMetrics::new());
        let authorizer = bridge(Some(MockBackend::granting()), flags, metrics.clone());
        let request = read_request();

        let enabled_ctx = ExperimentContext::for_organization(enabled_org);
        let other_ctx = ExperimentContext::for_organization(other_org);
        let (enabled, disabled) = tokio::join!(
            authorizer.check(&request, &enabled_ctx),
            authorizer.check(&request, &other_ctx),
        );

        assert!(enabled);
        assert!(!disabled);
        // Only the admitted call reached the backend and telemetry.
        assert_eq!(metrics.take().len(), 1);
    }

    #[tokio::test]
    async fn flag_is_reevaluated_on_every_call() {
        let flags = CountingFlags::new(true);
        let metrics = Arc::new(RecordingMetrics::new());
        let authorizer = bridge(
            Some(MockBackend::granting()),
            flags.clone(),
            metrics.clone(),
        );
        let context = ExperimentContext::none();
        let request = read_request();

        authorizer.check(&request, &context).await;
        authorizer.check(&request, &context).await;
        authorizer
            .write_relationships(&mutation_request(), &context)
            .await;

        assert_eq!(flags.evaluations(), 3);
    }

    #[tokio::test]
    async fn from_config_without_spicedb_is_unprovisioned() {
        let config: AuthzConfig = serde_json::from_value(serde_json::json!({})).expect("parse");
        let authorizer = RelationshipAuthorizer::from_config(&config)
            .await
            .expect("from_config");

        assert!(
            !authorizer
                .check(&read_request(), &ExperimentContext::none())
                .await
        );
        assert!(
            authorizer
                .write_relationships(&mutation_request(), &ExperimentContext::none())
                .await
                .is_none()
        );
    }
}
