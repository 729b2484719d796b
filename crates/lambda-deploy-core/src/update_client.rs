//! Per-function remote operations.
//!
//! [`FunctionUpdateClient`] turns one [`FunctionSpec`] into the remote calls
//! of a single phase item: wait for readiness, then mutate. Required spec
//! fields are checked before any remote call, so an incomplete record costs
//! nothing on the wire.

use std::sync::Arc;

use lambda_deploy_api::{
    ApiError, CodeUpdate, ConfigurationUpdate, FunctionStatus, LambdaApi, LayerVersion,
    VersionPage, LATEST_VERSION,
};
use tracing::{debug, info};

use crate::error::{DeployError, DeployResult};
use crate::function_spec::FunctionSpec;
use crate::settings::{AliasVersionStrategy, DeploySettings};

/// Pick the ARN of the numerically highest layer version.
///
/// Equal version numbers are broken by ARN so the choice never depends on
/// listing order.
pub fn select_latest_layer(versions: &[LayerVersion]) -> Option<String> {
    versions
        .iter()
        .max_by(|a, b| {
            a.version
                .cmp(&b.version)
                .then_with(|| a.layer_version_arn.cmp(&b.layer_version_arn))
        })
        .map(|v| v.layer_version_arn.clone())
}

/// Pick the version an alias should point at from a paginated listing.
///
/// `LastListed` only looks at the final page: when that page is empty there
/// is nothing to point at, even if earlier pages listed versions.
pub fn select_alias_version(
    pages: &[VersionPage],
    strategy: AliasVersionStrategy,
) -> Option<String> {
    match strategy {
        AliasVersionStrategy::LastListed => pages.last().and_then(|page| page.last()).cloned(),
        AliasVersionStrategy::Highest => pages
            .iter()
            .flatten()
            .filter_map(|v| v.parse::<u64>().ok().map(|n| (n, v)))
            .max_by_key(|(n, _)| *n)
            .map(|(_, v)| v.clone()),
    }
}

/// Remote operations for a single function, bound to the run settings.
#[derive(Clone)]
pub struct FunctionUpdateClient {
    api: Arc<dyn LambdaApi>,
    settings: Arc<DeploySettings>,
}

impl FunctionUpdateClient {
    pub fn new(api: Arc<dyn LambdaApi>, settings: Arc<DeploySettings>) -> Self {
        Self { api, settings }
    }

    pub fn settings(&self) -> &DeploySettings {
        &self.settings
    }

    /// Poll the function's status until it is ready to accept a mutation.
    ///
    /// The first check happens immediately; later checks are spaced by the
    /// configured delay. A failed previous update ends the wait with
    /// [`DeployError::Remote`], running out of checks with
    /// [`DeployError::NotReady`].
    pub async fn wait_until_active(&self, function_name: &str) -> DeployResult<()> {
        let policy = self.settings.wait;

        for attempt in 1..=policy.max_attempts {
            let status = self
                .api
                .function_status(function_name)
                .await
                .map_err(|e| DeployError::from_api(function_name, e))?;

            match status {
                FunctionStatus::Ready => {
                    debug!(function = %function_name, attempt, "Function ready");
                    return Ok(());
                }
                FunctionStatus::Failed { reason } => {
                    return Err(DeployError::Remote {
                        function: function_name.to_string(),
                        message: format!("last update failed: {reason}"),
                    });
                }
                FunctionStatus::Updating => {
                    debug!(function = %function_name, attempt, "Function update in progress");
                    if attempt < policy.max_attempts {
                        tokio::time::sleep(policy.delay).await;
                    }
                }
            }
        }

        Err(DeployError::NotReady {
            function: function_name.to_string(),
            attempts: policy.max_attempts,
        })
    }

    /// Point the function at its artifact. Returns the resulting version,
    /// `$LATEST` when nothing was published.
    pub async fn update_code(&self, spec: &FunctionSpec) -> DeployResult<String> {
        let artifact = spec.require_artifact_key()?;
        let request = CodeUpdate {
            function_name: spec.name.clone(),
            s3_bucket: self.settings.artifact_bucket.clone(),
            s3_key: self.settings.artifact_key(artifact),
            publish: self.settings.publish,
            architectures: vec![spec.architecture.clone()],
        };

        self.wait_until_active(&spec.name).await?;

        let version = self
            .api
            .update_function_code(&request)
            .await
            .map_err(|e| DeployError::from_api(&spec.name, e))?
            .unwrap_or_else(|| LATEST_VERSION.to_string());

        info!(function = %spec.name, version = %version, "✓ Updated code: {} (v{})", spec.name, version);
        Ok(version)
    }

    /// Apply runtime, handler and layers. Named layers are resolved to
    /// their latest ARN and placed before the extension layers.
    pub async fn update_configuration(&self, spec: &FunctionSpec) -> DeployResult<()> {
        let runtime = spec.require_runtime()?.to_string();
        let handler = spec.require_handler()?.to_string();

        let mut layers = Vec::with_capacity(spec.layers.len() + spec.extension_layers.len());
        for layer_name in &spec.layers {
            layers.push(self.resolve_latest_layer_arn(&spec.name, layer_name).await?);
        }
        layers.extend(spec.extension_layers.iter().cloned());

        let request = ConfigurationUpdate {
            function_name: spec.name.clone(),
            layers,
            runtime,
            handler,
        };

        self.wait_until_active(&spec.name).await?;

        self.api
            .update_function_configuration(&request)
            .await
            .map_err(|e| DeployError::from_api(&spec.name, e))?;

        info!(
            function = %spec.name,
            layers = request.layers.len(),
            "✓ Updated configuration: {}",
            spec.name
        );
        Ok(())
    }

    /// ARN of the highest visible version of `layer_name`, resolved on
    /// behalf of `function_name`.
    pub async fn resolve_latest_layer_arn(
        &self,
        function_name: &str,
        layer_name: &str,
    ) -> DeployResult<String> {
        let versions = self
            .api
            .list_layer_versions(layer_name)
            .await
            .map_err(|e| match e {
                ApiError::Remote { operation, message } => DeployError::Remote {
                    function: function_name.to_string(),
                    message: format!("{operation} for layer {layer_name}: {message}"),
                },
                not_found => DeployError::from_api(function_name, not_found),
            })?;

        let arn = select_latest_layer(&versions).ok_or_else(|| DeployError::NotFound {
            resource: format!("layer {layer_name}"),
            message: format!("No versions found for layer {layer_name}"),
        })?;
        debug!(layer = %layer_name, arn = %arn, "Resolved latest layer version");
        Ok(arn)
    }

    /// Point `alias_name` at the selected published version. Returns that
    /// version.
    pub async fn update_alias(&self, function_name: &str, alias_name: &str) -> DeployResult<String> {
        let pages = self
            .api
            .list_versions_by_function(function_name)
            .await
            .map_err(|e| DeployError::from_api(function_name, e))?;

        let version = select_alias_version(&pages, self.settings.alias_strategy).ok_or_else(
            || DeployError::NoVersions {
                function: function_name.to_string(),
            },
        )?;

        self.wait_until_active(function_name).await?;

        self.api
            .update_alias(function_name, alias_name, &version)
            .await
            .map_err(|e| DeployError::from_api(function_name, e))?;

        info!(
            function = %function_name,
            alias = %alias_name,
            version = %version,
            "✓ Updated alias: {} -> {} (v{})",
            function_name,
            alias_name,
            version
        );
        Ok(version)
    }
}
