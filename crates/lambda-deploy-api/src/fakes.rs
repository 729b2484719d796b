//! In-memory fake for the function-management API (testing only)
//!
//! `MemoryLambdaApi` keeps a tiny model of a function fleet (published
//! versions, aliases, last applied code/configuration) plus layer version
//! listings, and records every call in arrival order so tests can assert on
//! call sequencing. Failures can be injected per operation and target.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::ApiError;
use crate::lambda_api::*;
use crate::ApiResult;

/// Remote operations, used to address injected failures and filter calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    FunctionStatus,
    UpdateFunctionCode,
    UpdateFunctionConfiguration,
    ListLayerVersions,
    ListVersionsByFunction,
    UpdateAlias,
}

/// A call observed by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    FunctionStatus {
        function_name: String,
    },
    UpdateFunctionCode(CodeUpdate),
    UpdateFunctionConfiguration(ConfigurationUpdate),
    ListLayerVersions {
        layer_name: String,
    },
    ListVersionsByFunction {
        function_name: String,
    },
    UpdateAlias {
        function_name: String,
        alias_name: String,
        version: String,
    },
}

impl ApiCall {
    pub fn operation(&self) -> Operation {
        match self {
            ApiCall::FunctionStatus { .. } => Operation::FunctionStatus,
            ApiCall::UpdateFunctionCode(_) => Operation::UpdateFunctionCode,
            ApiCall::UpdateFunctionConfiguration(_) => Operation::UpdateFunctionConfiguration,
            ApiCall::ListLayerVersions { .. } => Operation::ListLayerVersions,
            ApiCall::ListVersionsByFunction { .. } => Operation::ListVersionsByFunction,
            ApiCall::UpdateAlias { .. } => Operation::UpdateAlias,
        }
    }

    /// Function or layer name the call addressed.
    pub fn target(&self) -> &str {
        match self {
            ApiCall::FunctionStatus { function_name }
            | ApiCall::ListVersionsByFunction { function_name }
            | ApiCall::UpdateAlias { function_name, .. } => function_name,
            ApiCall::UpdateFunctionCode(request) => &request.function_name,
            ApiCall::UpdateFunctionConfiguration(request) => &request.function_name,
            ApiCall::ListLayerVersions { layer_name } => layer_name,
        }
    }

    /// Whether the call changes remote state.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self.operation(),
            Operation::UpdateFunctionCode
                | Operation::UpdateFunctionConfiguration
                | Operation::UpdateAlias
        )
    }
}

/// Deterministic ARN for a fake layer version.
pub fn layer_arn(layer_name: &str, version: i64) -> String {
    format!("arn:aws:lambda:us-east-1:123456789012:layer:{layer_name}:{version}")
}

// ---------------------------------------------------------------------------
// MemoryLambdaApi
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct FakeFunction {
    /// Listing order; starts with `$LATEST` like the real provider
    versions: Vec<String>,
    next_version: u64,
    updating_polls: u32,
    failed_reason: Option<String>,
    aliases: HashMap<String, String>,
    code: Option<CodeUpdate>,
    configuration: Option<ConfigurationUpdate>,
}

impl FakeFunction {
    fn new() -> Self {
        Self {
            versions: vec![LATEST_VERSION.to_string()],
            next_version: 1,
            updating_polls: 0,
            failed_reason: None,
            aliases: HashMap::new(),
            code: None,
            configuration: None,
        }
    }
}

#[derive(Debug)]
struct InjectedFailure {
    operation: Operation,
    /// `None` fails the operation for every target
    target: Option<String>,
    error: ApiError,
}

#[derive(Debug, Default)]
struct FakeState {
    functions: HashMap<String, FakeFunction>,
    layers: HashMap<String, Vec<LayerVersion>>,
    failures: Vec<InjectedFailure>,
    calls: Vec<ApiCall>,
}

/// In-memory [`LambdaApi`] backed by a `HashMap<function name, FakeFunction>`.
#[derive(Debug)]
pub struct MemoryLambdaApi {
    state: Mutex<FakeState>,
    page_size: usize,
}

impl Default for MemoryLambdaApi {
    fn default() -> Self {
        Self {
            state: Mutex::new(FakeState::default()),
            page_size: 50,
        }
    }
}

impl MemoryLambdaApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function with only `$LATEST`.
    pub fn with_function(self, function_name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .functions
            .insert(function_name.to_string(), FakeFunction::new());
        self
    }

    /// Register a function whose version listing is exactly `versions`, in
    /// that order. New published versions continue after the highest
    /// numeric entry.
    pub fn with_versions(self, function_name: &str, versions: &[&str]) -> Self {
        let mut function = FakeFunction::new();
        function.versions = versions.iter().map(|v| v.to_string()).collect();
        function.next_version = versions
            .iter()
            .filter_map(|v| v.parse::<u64>().ok())
            .max()
            .map_or(1, |max| max + 1);
        self.state
            .lock()
            .unwrap()
            .functions
            .insert(function_name.to_string(), function);
        self
    }

    /// Register a layer with the given version numbers, in listing order.
    pub fn with_layer(self, layer_name: &str, versions: &[i64]) -> Self {
        let listing = versions
            .iter()
            .map(|&v| LayerVersion::new(v, layer_arn(layer_name, v)))
            .collect();
        self.state
            .lock()
            .unwrap()
            .layers
            .insert(layer_name.to_string(), listing);
        self
    }

    /// Answer the next `polls` status lookups for the function with
    /// `Updating`.
    pub fn with_updating_polls(self, function_name: &str, polls: u32) -> Self {
        if let Some(function) = self.state.lock().unwrap().functions.get_mut(function_name) {
            function.updating_polls = polls;
        }
        self
    }

    /// Report the function's last update as failed once it stops updating.
    pub fn with_failed_update(self, function_name: &str, reason: &str) -> Self {
        if let Some(function) = self.state.lock().unwrap().functions.get_mut(function_name) {
            function.failed_reason = Some(reason.to_string());
        }
        self
    }

    /// Number of version identifiers per list-versions-by-function page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Fail `operation` against `target` with `error`.
    pub fn fail_on(self, operation: Operation, target: &str, error: ApiError) -> Self {
        self.state.lock().unwrap().failures.push(InjectedFailure {
            operation,
            target: Some(target.to_string()),
            error,
        });
        self
    }

    /// Fail `operation` for every target.
    pub fn fail_all(self, operation: Operation, error: ApiError) -> Self {
        self.state.lock().unwrap().failures.push(InjectedFailure {
            operation,
            target: None,
            error,
        });
        self
    }

    /// Every call observed so far, in arrival order.
    pub fn calls(&self) -> Vec<ApiCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls of one operation, in arrival order.
    pub fn calls_of(&self, operation: Operation) -> Vec<ApiCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.operation() == operation)
            .collect()
    }

    pub fn alias_target(&self, function_name: &str, alias_name: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .functions
            .get(function_name)
            .and_then(|f| f.aliases.get(alias_name).cloned())
    }

    pub fn applied_code(&self, function_name: &str) -> Option<CodeUpdate> {
        let state = self.state.lock().unwrap();
        state.functions.get(function_name).and_then(|f| f.code.clone())
    }

    pub fn applied_configuration(&self, function_name: &str) -> Option<ConfigurationUpdate> {
        let state = self.state.lock().unwrap();
        state
            .functions
            .get(function_name)
            .and_then(|f| f.configuration.clone())
    }

    /// Record the call and return an injected failure if one matches.
    fn observe(&self, state: &mut FakeState, call: ApiCall) -> ApiResult<()> {
        let operation = call.operation();
        let target = call.target().to_string();
        state.calls.push(call);
        let injected = state.failures.iter().find(|f| {
            f.operation == operation && f.target.as_deref().map_or(true, |t| t == target)
        });
        match injected {
            Some(failure) => Err(failure.error.clone()),
            None => Ok(()),
        }
    }
}

fn missing_function(function_name: &str) -> ApiError {
    ApiError::not_found(
        format!("function {function_name}"),
        format!("Function not found: {function_name}"),
    )
}

#[async_trait]
impl LambdaApi for MemoryLambdaApi {
    async fn function_status(&self, function_name: &str) -> ApiResult<FunctionStatus> {
        let mut state = self.state.lock().unwrap();
        self.observe(
            &mut state,
            ApiCall::FunctionStatus {
                function_name: function_name.to_string(),
            },
        )?;
        let function = state
            .functions
            .get_mut(function_name)
            .ok_or_else(|| missing_function(function_name))?;
        if function.updating_polls > 0 {
            function.updating_polls -= 1;
            return Ok(FunctionStatus::Updating);
        }
        Ok(match &function.failed_reason {
            Some(reason) => FunctionStatus::Failed {
                reason: reason.clone(),
            },
            None => FunctionStatus::Ready,
        })
    }

    async fn update_function_code(&self, request: &CodeUpdate) -> ApiResult<Option<String>> {
        let mut state = self.state.lock().unwrap();
        self.observe(&mut state, ApiCall::UpdateFunctionCode(request.clone()))?;
        let function = state
            .functions
            .get_mut(&request.function_name)
            .ok_or_else(|| missing_function(&request.function_name))?;
        function.code = Some(request.clone());
        if !request.publish {
            return Ok(Some(LATEST_VERSION.to_string()));
        }
        let version = function.next_version.to_string();
        function.next_version += 1;
        function.versions.push(version.clone());
        Ok(Some(version))
    }

    async fn update_function_configuration(&self, request: &ConfigurationUpdate) -> ApiResult<()> {
        let mut state = self.state.lock().unwrap();
        self.observe(
            &mut state,
            ApiCall::UpdateFunctionConfiguration(request.clone()),
        )?;
        let function = state
            .functions
            .get_mut(&request.function_name)
            .ok_or_else(|| missing_function(&request.function_name))?;
        function.configuration = Some(request.clone());
        Ok(())
    }

    async fn list_layer_versions(&self, layer_name: &str) -> ApiResult<Vec<LayerVersion>> {
        let mut state = self.state.lock().unwrap();
        self.observe(
            &mut state,
            ApiCall::ListLayerVersions {
                layer_name: layer_name.to_string(),
            },
        )?;
        state.layers.get(layer_name).cloned().ok_or_else(|| {
            ApiError::not_found(
                format!("layer {layer_name}"),
                format!("Layer not found: {layer_name}"),
            )
        })
    }

    async fn list_versions_by_function(&self, function_name: &str) -> ApiResult<Vec<VersionPage>> {
        let mut state = self.state.lock().unwrap();
        self.observe(
            &mut state,
            ApiCall::ListVersionsByFunction {
                function_name: function_name.to_string(),
            },
        )?;
        let function = state
            .functions
            .get(function_name)
            .ok_or_else(|| missing_function(function_name))?;
        if function.versions.is_empty() {
            return Ok(vec![Vec::new()]);
        }
        Ok(function
            .versions
            .chunks(self.page_size)
            .map(|page| page.to_vec())
            .collect())
    }

    async fn update_alias(
        &self,
        function_name: &str,
        alias_name: &str,
        version: &str,
    ) -> ApiResult<()> {
        let mut state = self.state.lock().unwrap();
        self.observe(
            &mut state,
            ApiCall::UpdateAlias {
                function_name: function_name.to_string(),
                alias_name: alias_name.to_string(),
                version: version.to_string(),
            },
        )?;
        let function = state
            .functions
            .get_mut(function_name)
            .ok_or_else(|| missing_function(function_name))?;
        function
            .aliases
            .insert(alias_name.to_string(), version.to_string());
        Ok(())
    }
}
