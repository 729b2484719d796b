//! Lambda-Deploy API: the function-management seam
//!
//! This crate owns the boundary between the deployment logic and the cloud
//! provider's function-hosting API. Nothing here knows about batches or
//! phases; it only describes the remote calls and their shapes.
//!
//! ## Key Components
//!
//! - `LambdaApi`: async trait with one method per remote call
//! - `CodeUpdate` / `ConfigurationUpdate`: mutating request payloads
//! - `FunctionStatus` / `LayerVersion`: read-side records
//! - `fakes::MemoryLambdaApi`: recording in-memory double for tests

mod error;
pub mod fakes;
pub mod lambda_api;

pub use error::ApiError;
pub use lambda_api::{
    CodeUpdate, ConfigurationUpdate, FunctionStatus, LambdaApi, LayerVersion, VersionPage,
    LATEST_VERSION,
};

/// Result type for remote API calls
pub type ApiResult<T> = std::result::Result<T, ApiError>;
