//! Authorization bridge configuration.
//!
//! Loaded via the `config` crate from environment variables. A missing
//! `[spicedb]` section is a valid state: it means the centralized
//! permission system is not provisioned in this deployment and every
//! operation short-circuits to its safe default.

use serde::Deserialize;

/// Configuration for the authorization bridge.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthzConfig {
    /// SpiceDB connection settings; absent when the feature is not
    /// provisioned.
    #[serde(default)]
    pub spicedb: Option<SpiceDbConfig>,

    /// Feature-flag resolution settings.
    #[serde(default)]
    pub flags: FlagsConfig,
}

/// SpiceDB connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SpiceDbConfig {
    /// The SpiceDB gRPC endpoint (e.g., "http://localhost:50051").
    pub endpoint: String,

    /// The preshared key for authentication.
    pub preshared_key: String,
}

/// Feature-flag resolution settings.
#[derive(Debug, Clone, Deserialize)]
pub struct FlagsConfig {
    /// Base URL of the flag service. When unset, flags resolve to
    /// `default_enabled` for every scope.
    #[serde(default)]
    pub service_url: Option<String>,

    /// Value every flag resolves to without a flag service.
    #[serde(default = "default_enabled")]
    pub default_enabled: bool,
}

fn default_enabled() -> bool {
    false
}

impl Default for FlagsConfig {
    fn default() -> Self {
        Self {
            service_url: None,
            default_enabled: default_enabled(),
        }
    }
}

impl AuthzConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if present configuration is invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::with_prefix("AUTHZ")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
