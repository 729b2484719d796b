//! AWS Lambda backend for lambda-deploy
//!
//! [`AwsLambdaApi`] implements [`LambdaApi`] on top of `aws-sdk-lambda`.
//! Credentials, region, retries and request signing come from the SDK's
//! default provider chain; this crate only translates requests and maps
//! provider errors onto [`ApiError`].

use async_trait::async_trait;
use aws_sdk_lambda::error::DisplayErrorContext;
use aws_sdk_lambda::types::{Architecture, LastUpdateStatus, Runtime, State};
use lambda_deploy_api::{
    ApiError, ApiResult, CodeUpdate, ConfigurationUpdate, FunctionStatus, LambdaApi,
    LayerVersion, VersionPage,
};
use tracing::debug;

/// Function-management API backed by the AWS Lambda service.
#[derive(Debug, Clone)]
pub struct AwsLambdaApi {
    client: aws_sdk_lambda::Client,
}

impl AwsLambdaApi {
    pub fn new(client: aws_sdk_lambda::Client) -> Self {
        Self { client }
    }

    /// Build a client from the ambient AWS configuration (env, profile,
    /// instance metadata).
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        if let Some(region) = config.region() {
            debug!(region = %region, "Loaded AWS configuration");
        }
        Self::new(aws_sdk_lambda::Client::new(&config))
    }
}

#[async_trait]
impl LambdaApi for AwsLambdaApi {
    async fn function_status(&self, function_name: &str) -> ApiResult<FunctionStatus> {
        let output = self
            .client
            .get_function_configuration()
            .function_name(function_name)
            .send()
            .await
            .map_err(|err| {
                let err = err.into_service_error();
                classify(
                    "GetFunctionConfiguration",
                    format!("function {function_name}"),
                    err.is_resource_not_found_exception(),
                    &err,
                )
            })?;

        let status = status_from(
            output.last_update_status(),
            output.last_update_status_reason(),
            output.state(),
        );
        debug!(function = %function_name, ?status, "Fetched function status");
        Ok(status)
    }

    async fn update_function_code(&self, request: &CodeUpdate) -> ApiResult<Option<String>> {
        let architectures = request
            .architectures
            .iter()
            .map(|arch| Architecture::from(arch.as_str()))
            .collect();

        let output = self
            .client
            .update_function_code()
            .function_name(&request.function_name)
            .s3_bucket(&request.s3_bucket)
            .s3_key(&request.s3_key)
            .publish(request.publish)
            .set_architectures(Some(architectures))
            .send()
            .await
            .map_err(|err| {
                let err = err.into_service_error();
                classify(
                    "UpdateFunctionCode",
                    format!("function {}", request.function_name),
                    err.is_resource_not_found_exception(),
                    &err,
                )
            })?;

        Ok(output.version().map(str::to_string))
    }

    async fn update_function_configuration(&self, request: &ConfigurationUpdate) -> ApiResult<()> {
        self.client
            .update_function_configuration()
            .function_name(&request.function_name)
            .set_layers(Some(request.layers.clone()))
            .runtime(Runtime::from(request.runtime.as_str()))
            .handler(&request.handler)
            .send()
            .await
            .map_err(|err| {
                let err = err.into_service_error();
                classify(
                    "UpdateFunctionConfiguration",
                    format!("function {}", request.function_name),
                    err.is_resource_not_found_exception(),
                    &err,
                )
            })?;
        Ok(())
    }

    async fn list_layer_versions(&self, layer_name: &str) -> ApiResult<Vec<LayerVersion>> {
        let mut pages = self
            .client
            .list_layer_versions()
            .layer_name(layer_name)
            .into_paginator()
            .send();

        let mut versions = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|err| {
                let err = err.into_service_error();
                classify(
                    "ListLayerVersions",
                    format!("layer {layer_name}"),
                    err.is_resource_not_found_exception(),
                    &err,
                )
            })?;
            versions.extend(page.layer_versions().iter().filter_map(|item| {
                item.layer_version_arn()
                    .map(|arn| LayerVersion::new(item.version(), arn))
            }));
        }
        Ok(versions)
    }

    async fn list_versions_by_function(&self, function_name: &str) -> ApiResult<Vec<VersionPage>> {
        let mut pages = self
            .client
            .list_versions_by_function()
            .function_name(function_name)
            .into_paginator()
            .send();

        let mut listing = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|err| {
                let err = err.into_service_error();
                classify(
                    "ListVersionsByFunction",
                    format!("function {function_name}"),
                    err.is_resource_not_found_exception(),
                    &err,
                )
            })?;
            listing.push(
                page.versions()
                    .iter()
                    .filter_map(|config| config.version().map(str::to_string))
                    .collect(),
            );
        }
        Ok(listing)
    }

    async fn update_alias(
        &self,
        function_name: &str,
        alias_name: &str,
        version: &str,
    ) -> ApiResult<()> {
        self.client
            .update_alias()
            .function_name(function_name)
            .name(alias_name)
            .function_version(version)
            .send()
            .await
            .map_err(|err| {
                let err = err.into_service_error();
                classify(
                    "UpdateAlias",
                    format!("alias {alias_name} of function {function_name}"),
                    err.is_resource_not_found_exception(),
                    &err,
                )
            })?;
        Ok(())
    }
}

/// Collapse the provider's update/lifecycle state pair into [`FunctionStatus`].
///
/// `LastUpdateStatus` wins; a function still being created (`State::Pending`)
/// counts as updating.
fn status_from(
    last_update: Option<&LastUpdateStatus>,
    last_update_reason: Option<&str>,
    state: Option<&State>,
) -> FunctionStatus {
    match last_update {
        Some(LastUpdateStatus::InProgress) => FunctionStatus::Updating,
        Some(LastUpdateStatus::Failed) => FunctionStatus::Failed {
            reason: last_update_reason
                .unwrap_or("last update failed")
                .to_string(),
        },
        _ => match state {
            Some(State::Pending) => FunctionStatus::Updating,
            _ => FunctionStatus::Ready,
        },
    }
}

fn classify<E>(operation: &str, resource: String, not_found: bool, err: &E) -> ApiError
where
    E: std::error::Error,
{
    let message = DisplayErrorContext(err).to_string();
    if not_found {
        ApiError::not_found(resource, message)
    } else {
        ApiError::remote(operation, message)
    }
}
