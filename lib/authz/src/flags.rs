//! Feature-flag gate for the centralized permission rollout.
//!
//! The flag is re-evaluated on every authorization operation so that
//! rollout changes take effect immediately, without a redeploy. Any
//! failure to resolve a flag reads as disabled.

use crate::types::ExperimentContext;
use async_trait::async_trait;
use quarry_core::OrganizationId;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

/// Flag controlling whether the centralized relationship-based
/// permission system is consulted.
pub const CENTRALIZED_PERMISSIONS: &str = "centralized_permissions";

/// Resolves feature-flag values, optionally scoped to a tenant.
///
/// Implementations must fail closed: if a flag cannot be resolved for
/// any reason, it is reported as disabled.
#[async_trait]
pub trait FlagResolver: Send + Sync {
    /// Returns whether `flag` is enabled for the given scope.
    async fn is_enabled(&self, flag: &str, scope: &ExperimentContext) -> bool;
}

/// Deterministic resolver backed by in-memory values.
///
/// Used by tests and by single-tenant deployments that pin the rollout
/// state in configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticFlags {
    default: bool,
    per_organization: HashMap<OrganizationId, bool>,
}

impl StaticFlags {
    /// Creates a resolver answering `default` for every scope.
    #[must_use]
    pub fn new(default: bool) -> Self {
        Self {
            default,
            per_organization: HashMap::new(),
        }
    }

    /// Overrides the value for one organization.
    #[must_use]
    pub fn with_organization(mut self, organization_id: OrganizationId, enabled: bool) -> Self {
        self.per_organization.insert(organization_id, enabled);
        self
    }
}

#[async_trait]
impl FlagResolver for StaticFlags {
    async fn is_enabled(&self, _flag: &str, scope: &ExperimentContext) -> bool {
        scope
            .organization_id
            .and_then(|org| self.per_organization.get(&org).copied())
            .unwrap_or(self.default)
    }
}

/// Remote resolver querying the flag service over HTTP on every call.
pub struct HttpFlags {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct FlagValue {
    enabled: bool,
}

impl HttpFlags {
    /// Creates a resolver against the flag service at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn fetch(&self, flag: &str, scope: &ExperimentContext) -> Result<bool, reqwest::Error> {
        let mut request = self.http.get(format!("{}/v1/flags/{flag}", self.base_url));
        if let Some(organization_id) = &scope.organization_id {
            request = request.query(&[("organization_id", organization_id.to_string())]);
        }

        let response = request.send().await?.error_for_status()?;
        let value: FlagValue = response.json().await?;
        Ok(value.enabled)
    }
}

#[async_trait]
impl FlagResolver for HttpFlags {
    async fn is_enabled(&self, flag: &str, scope: &ExperimentContext) -> bool {
        match self.fetch(flag, scope).await {
            Ok(enabled) => enabled,
            Err(error) => {
                debug!(flag, %error, "flag lookup failed, treating as disabled");
                false
            }
        }
    }
}
