//! Remote function-management API definition
//!
//! [`LambdaApi`] maps one-to-one onto the provider calls the deployer needs:
//! - status lookup (used by the readiness wait)
//! - update-function-code / update-function-configuration
//! - list-layer-versions / list-versions-by-function
//! - update-alias
//!
//! Implementations do no retrying or waiting of their own beyond what the
//! underlying SDK does; sequencing belongs to the caller.

use async_trait::async_trait;

use crate::ApiResult;

/// Version identifier of the unpublished, mutable function revision.
pub const LATEST_VERSION: &str = "$LATEST";

/// Update state of a function as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionStatus {
    /// No update in flight; mutating calls are accepted
    Ready,
    /// An earlier update (or initial creation) has not settled yet
    Updating,
    /// The last update finished unsuccessfully
    Failed { reason: String },
}

/// Request payload for update-function-code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeUpdate {
    pub function_name: String,
    pub s3_bucket: String,
    pub s3_key: String,
    /// Freeze the new code into an immutable version
    pub publish: bool,
    pub architectures: Vec<String>,
}

/// Request payload for update-function-configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationUpdate {
    pub function_name: String,
    /// Layer version ARNs, applied by the platform in list order
    pub layers: Vec<String>,
    pub runtime: String,
    pub handler: String,
}

/// One published version of a layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerVersion {
    pub version: i64,
    pub layer_version_arn: String,
}

impl LayerVersion {
    pub fn new(version: i64, layer_version_arn: impl Into<String>) -> Self {
        Self {
            version,
            layer_version_arn: layer_version_arn.into(),
        }
    }
}

/// One page of version identifiers from list-versions-by-function, in the
/// order the provider returned them.
pub type VersionPage = Vec<String>;

/// The provider's function-management API.
#[async_trait]
pub trait LambdaApi: Send + Sync {
    /// Current update status of `function_name`.
    async fn function_status(&self, function_name: &str) -> ApiResult<FunctionStatus>;

    /// Point the function at a new code artifact. Returns the version the
    /// provider reports for the resulting revision, if any.
    async fn update_function_code(&self, request: &CodeUpdate) -> ApiResult<Option<String>>;

    /// Replace runtime, handler and layer list.
    async fn update_function_configuration(&self, request: &ConfigurationUpdate) -> ApiResult<()>;

    /// All versions of `layer_name`, across every listing page.
    async fn list_layer_versions(&self, layer_name: &str) -> ApiResult<Vec<LayerVersion>>;

    /// Versions of `function_name`, one entry per listing page, pages in
    /// the order they were fetched.
    async fn list_versions_by_function(&self, function_name: &str) -> ApiResult<Vec<VersionPage>>;

    /// Point `alias_name` at `version`.
    async fn update_alias(
        &self,
        function_name: &str,
        alias_name: &str,
        version: &str,
    ) -> ApiResult<()>;
}
