//! Function deployment specs and the JSON config loader.
//!
//! The config document looks like:
//!
//! ```json
//! {
//!   "functions": [
//!     {
//!       "function_name": "orders-api",
//!       "zip_file_name": "orders-api.zip",
//!       "runtime": "python3.12",
//!       "handler": "app.handler",
//!       "architecture": "arm64",
//!       "layers": ["shared-deps"],
//!       "extension_layers": ["arn:aws:lambda:us-east-1:580247275435:layer:LambdaInsightsExtension:53"]
//!     }
//!   ]
//! }
//! ```
//!
//! Only `function_name` is enforced at load time. `zip_file_name`, `runtime`
//! and `handler` are checked by the operation that needs them, so one
//! incomplete record fails its own items instead of the whole document.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{DeployError, DeployResult};

/// Architecture used when a record does not name one.
pub const DEFAULT_ARCHITECTURE: &str = "x86_64";

fn default_architecture() -> String {
    DEFAULT_ARCHITECTURE.to_string()
}

/// Deployment description of a single function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSpec {
    #[serde(rename = "function_name")]
    pub name: String,

    /// Artifact file name under the run's artifact path
    #[serde(rename = "zip_file_name", default)]
    pub artifact_key: Option<String>,

    #[serde(default)]
    pub runtime: Option<String>,

    #[serde(default)]
    pub handler: Option<String>,

    #[serde(default = "default_architecture")]
    pub architecture: String,

    /// Layer names, resolved to their latest version ARN at deploy time
    #[serde(default)]
    pub layers: Vec<String>,

    /// Fully qualified layer ARNs appended after the resolved layers
    #[serde(default)]
    pub extension_layers: Vec<String>,
}

impl FunctionSpec {
    /// Minimal spec with every required field set.
    pub fn new(name: &str, artifact_key: &str, runtime: &str, handler: &str) -> Self {
        Self {
            name: name.to_string(),
            artifact_key: Some(artifact_key.to_string()),
            runtime: Some(runtime.to_string()),
            handler: Some(handler.to_string()),
            architecture: default_architecture(),
            layers: Vec::new(),
            extension_layers: Vec::new(),
        }
    }

    pub fn with_layers(mut self, layers: &[&str]) -> Self {
        self.layers = layers.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn with_extension_layers(mut self, arns: &[&str]) -> Self {
        self.extension_layers = arns.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_architecture(mut self, architecture: &str) -> Self {
        self.architecture = architecture.to_string();
        self
    }

    pub fn require_artifact_key(&self) -> DeployResult<&str> {
        self.require(&self.artifact_key, "zip_file_name")
    }

    pub fn require_runtime(&self) -> DeployResult<&str> {
        self.require(&self.runtime, "runtime")
    }

    pub fn require_handler(&self) -> DeployResult<&str> {
        self.require(&self.handler, "handler")
    }

    fn require<'a>(&self, value: &'a Option<String>, field: &'static str) -> DeployResult<&'a str> {
        value.as_deref().ok_or_else(|| DeployError::MissingField {
            function: self.name.clone(),
            field,
        })
    }
}

/// Top-level shape of the config document.
#[derive(Debug, Deserialize)]
struct FunctionManifest {
    functions: Vec<FunctionSpec>,
}

/// Parse a config document. `origin` names the source in error messages.
pub fn parse_function_specs(origin: &str, content: &str) -> DeployResult<Vec<FunctionSpec>> {
    let manifest: FunctionManifest =
        serde_json::from_str(content).map_err(|e| DeployError::Config {
            path: origin.to_string(),
            reason: format!("invalid JSON: {e}"),
        })?;
    Ok(manifest.functions)
}

/// Load the ordered function specs from the config file at `path`.
pub fn load_function_specs(path: &Path) -> DeployResult<Vec<FunctionSpec>> {
    let origin = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|e| DeployError::Config {
        path: origin.clone(),
        reason: match e.kind() {
            std::io::ErrorKind::NotFound => "configuration file not found".to_string(),
            _ => format!("unable to read configuration file: {e}"),
        },
    })?;

    let specs = parse_function_specs(&origin, &content)?;
    info!(count = specs.len(), path = %origin, "Loaded {} functions from config", specs.len());
    Ok(specs)
}
