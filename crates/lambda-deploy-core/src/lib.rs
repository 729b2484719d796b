//! Lambda-Deploy Core Library
//!
//! Config loading, per-function remote operations, batch orchestration and
//! the three-phase sequencer.

pub mod batch;
pub mod error;
pub mod function_spec;
pub mod obs;
pub mod report;
pub mod sequencer;
pub mod settings;
pub mod telemetry;
pub mod update_client;

pub use batch::{run_batch, Phase, PhaseOutcome, UpdateResult};

pub use error::{DeployError, DeployResult, EXIT_FAILURE, EXIT_INTERRUPTED};

pub use function_spec::{load_function_specs, parse_function_specs, FunctionSpec};

pub use report::{write_report_json, DeploymentReport, PhaseReport, PhaseStatus};

pub use sequencer::{DeploymentOutcome, PhaseSequencer};

pub use settings::{AliasVersionStrategy, DeploySettings, SettingsInput, WaitPolicy};

pub use update_client::{select_alias_version, select_latest_layer, FunctionUpdateClient};
