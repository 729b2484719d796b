use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use lambda_deploy_api::fakes::{layer_arn, MemoryLambdaApi, Operation};
use lambda_deploy_api::ApiError;
use lambda_deploy_core::{
    DeployError, DeploySettings, FunctionSpec, Phase, PhaseSequencer, PhaseStatus, SettingsInput,
};

fn settings(publish: &str, alias_name: Option<&str>) -> Arc<DeploySettings> {
    Arc::new(
        DeploySettings::resolve(SettingsInput {
            alias_name: alias_name.map(str::to_string),
            artifact_bucket: Some("ci-artifacts".to_string()),
            config_file: Some(PathBuf::from("functions.json")),
            artifact_path: Some("builds/99".to_string()),
            publish: Some(publish.to_string()),
            wait_delay_secs: Some(0),
            wait_max_attempts: Some(3),
            max_concurrency: Some(4),
            ..Default::default()
        })
        .unwrap(),
    )
}

fn spec(name: &str) -> FunctionSpec {
    FunctionSpec::new(name, &format!("{name}.zip"), "python3.12", "app.handler")
}

/// Shared in-memory sink for formatted log lines.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Route this thread's log output into a buffer for as long as the guard
/// lives. `#[tokio::test]` runs spawned item tasks on the same thread.
fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (buffer, guard)
}

fn first_index(api: &MemoryLambdaApi, operation: Operation) -> Option<usize> {
    api.calls().iter().position(|c| c.operation() == operation)
}

fn last_index(api: &MemoryLambdaApi, operation: Operation) -> Option<usize> {
    api.calls().iter().rposition(|c| c.operation() == operation)
}

#[tokio::test]
async fn phases_run_in_configuration_code_alias_order() {
    let api = Arc::new(
        MemoryLambdaApi::new()
            .with_function("orders")
            .with_function("billing")
            .with_function("search")
            .with_layer("deps", &[1, 2]),
    );
    let specs = vec![
        spec("orders").with_layers(&["deps"]),
        spec("billing"),
        spec("search"),
    ];

    let outcome = PhaseSequencer::new(api.clone(), settings("true", Some("live")))
        .run(specs)
        .await;
    assert!(outcome.success());

    let last_config = last_index(&api, Operation::UpdateFunctionConfiguration).unwrap();
    let last_layer_lookup = last_index(&api, Operation::ListLayerVersions).unwrap();
    let first_code = first_index(&api, Operation::UpdateFunctionCode).unwrap();
    let last_code = last_index(&api, Operation::UpdateFunctionCode).unwrap();
    let first_listing = first_index(&api, Operation::ListVersionsByFunction).unwrap();
    let first_alias = first_index(&api, Operation::UpdateAlias).unwrap();

    assert!(last_config < first_code);
    assert!(last_layer_lookup < first_code);
    assert!(last_code < first_listing);
    assert!(last_code < first_alias);
}

#[tokio::test]
async fn two_functions_end_to_end_aliases_follow_published_versions() {
    let api = Arc::new(
        MemoryLambdaApi::new()
            .with_versions("orders", &["$LATEST", "1", "2"])
            .with_versions("billing", &["$LATEST"]),
    );

    let outcome = PhaseSequencer::new(api.clone(), settings("true", Some("live")))
        .run(vec![spec("orders"), spec("billing")])
        .await;

    assert_eq!(outcome.exit_code(), 0);
    let report = &outcome.report;
    assert_eq!(report.phases.len(), 3);
    assert!(report
        .phases
        .iter()
        .all(|p| p.status == PhaseStatus::Succeeded));

    let code = report.phase(Phase::Code).unwrap();
    for function in ["orders", "billing"] {
        let published = code
            .results
            .iter()
            .find(|r| r.function_name == function)
            .and_then(|r| r.detail.clone())
            .unwrap();
        assert_eq!(api.alias_target(function, "live"), Some(published));
    }
    assert_eq!(api.alias_target("orders", "live").as_deref(), Some("3"));
    assert_eq!(api.alias_target("billing", "live").as_deref(), Some("1"));
}

#[tokio::test]
async fn missing_runtime_fails_only_its_configuration_item() {
    let api = Arc::new(
        MemoryLambdaApi::new()
            .with_function("orders")
            .with_function("billing")
            .with_function("search"),
    );
    let mut incomplete = spec("search");
    incomplete.runtime = None;

    let outcome = PhaseSequencer::new(api.clone(), settings("true", Some("live")))
        .run(vec![spec("orders"), spec("billing"), incomplete])
        .await;

    assert!(outcome.success());
    let config = outcome.report.phase(Phase::Configuration).unwrap();
    assert_eq!(config.status, PhaseStatus::PartiallySucceeded);
    assert_eq!((config.succeeded, config.failed), (2, 1));
    let failure = config.results.iter().find(|r| !r.success).unwrap();
    assert_eq!(failure.function_name, "search");
    assert!(failure.error.as_deref().unwrap().contains("runtime"));

    assert_eq!(api.calls_of(Operation::UpdateFunctionConfiguration).len(), 2);
    assert_eq!(api.calls_of(Operation::UpdateFunctionCode).len(), 3);
    assert_eq!(api.calls_of(Operation::UpdateAlias).len(), 3);
}

#[tokio::test]
async fn all_code_updates_failing_aborts_before_alias() {
    let api = Arc::new(
        MemoryLambdaApi::new()
            .with_function("orders")
            .with_function("billing")
            .fail_all(
                Operation::UpdateFunctionCode,
                ApiError::remote("UpdateFunctionCode", "NoSuchBucket: ci-artifacts"),
            ),
    );

    let outcome = PhaseSequencer::new(api.clone(), settings("true", Some("live")))
        .run(vec![spec("orders"), spec("billing")])
        .await;

    assert_eq!(outcome.exit_code(), 1);
    assert!(matches!(
        outcome.error,
        Some(DeployError::PhaseFailed {
            phase: Phase::Code,
            total: 2
        })
    ));
    assert_eq!(
        outcome.report.phase(Phase::Code).map(|p| p.status),
        Some(PhaseStatus::Failed)
    );
    assert!(outcome.report.phase(Phase::Alias).is_none());
    assert!(api.calls_of(Operation::ListVersionsByFunction).is_empty());
    assert!(api.calls_of(Operation::UpdateAlias).is_empty());
}

#[tokio::test]
async fn all_configuration_updates_failing_aborts_before_code() {
    let api = Arc::new(
        MemoryLambdaApi::new()
            .with_function("orders")
            .with_function("billing"),
    );
    let specs = vec![
        spec("orders").with_layers(&["missing-layer"]),
        spec("billing").with_layers(&["missing-layer"]),
    ];

    let outcome = PhaseSequencer::new(api.clone(), settings("true", Some("live")))
        .run(specs)
        .await;

    assert!(matches!(
        outcome.error,
        Some(DeployError::PhaseFailed {
            phase: Phase::Configuration,
            ..
        })
    ));
    assert!(api.calls_of(Operation::UpdateFunctionCode).is_empty());
    assert!(api.calls_of(Operation::UpdateAlias).is_empty());
}

#[tokio::test]
async fn partial_code_failure_continues_to_alias() {
    let api = Arc::new(
        MemoryLambdaApi::new()
            .with_function("orders")
            .with_function("billing")
            .fail_on(
                Operation::UpdateFunctionCode,
                "billing",
                ApiError::remote("UpdateFunctionCode", "AccessDenied"),
            ),
    );

    let outcome = PhaseSequencer::new(api.clone(), settings("true", Some("live")))
        .run(vec![spec("orders"), spec("billing")])
        .await;

    assert!(outcome.success());
    let code = outcome.report.phase(Phase::Code).unwrap();
    assert_eq!(code.status, PhaseStatus::PartiallySucceeded);
    let billing = code
        .results
        .iter()
        .find(|r| r.function_name == "billing")
        .unwrap();
    assert!(billing.error.as_deref().unwrap().contains("AccessDenied"));
    assert_eq!(api.calls_of(Operation::UpdateAlias).len(), 2);
}

#[tokio::test]
async fn partial_failure_logs_summary_and_each_failed_function() {
    let api = Arc::new(
        MemoryLambdaApi::new()
            .with_function("orders")
            .with_function("billing")
            .fail_on(
                Operation::UpdateFunctionCode,
                "billing",
                ApiError::remote("UpdateFunctionCode", "AccessDenied"),
            ),
    );
    let (logs, _guard) = capture_logs();

    let outcome = PhaseSequencer::new(api.clone(), settings("true", Some("live")))
        .run(vec![spec("orders"), spec("billing")])
        .await;
    assert!(outcome.success());

    let output = logs.contents();
    assert!(output.contains("Code update: 1/2 successful"), "{output}");
    let failure_line = output
        .lines()
        .find(|line| line.contains("✗ billing:"))
        .unwrap_or_else(|| panic!("no failure line for billing in:\n{output}"));
    assert!(failure_line.contains("AccessDenied"), "{failure_line}");
    assert!(!output.contains("✗ orders:"), "{output}");
    assert!(!output.contains("Configuration update:"), "{output}");
}

#[tokio::test]
async fn publish_false_never_touches_aliases() {
    for alias_name in [Some("live"), None] {
        let api = Arc::new(MemoryLambdaApi::new().with_function("orders"));

        let outcome = PhaseSequencer::new(api.clone(), settings("false", alias_name))
            .run(vec![spec("orders")])
            .await;

        assert!(outcome.success());
        assert_eq!(
            outcome.report.phase(Phase::Alias).map(|p| p.status),
            Some(PhaseStatus::Skipped)
        );
        assert!(api.calls_of(Operation::ListVersionsByFunction).is_empty());
        assert!(api.calls_of(Operation::UpdateAlias).is_empty());
        assert!(!api.applied_code("orders").unwrap().publish);
    }
}

#[test]
fn publish_with_empty_alias_is_rejected_at_startup() {
    for alias_name in [Some(String::new()), None] {
        let err = DeploySettings::resolve(SettingsInput {
            alias_name,
            artifact_bucket: Some("ci-artifacts".to_string()),
            config_file: Some(PathBuf::from("functions.json")),
            artifact_path: Some("builds/99".to_string()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, DeployError::Validation(_)));
        assert_eq!(err.exit_code(), 1);
    }
}

#[tokio::test]
async fn invalid_settings_make_zero_remote_calls() {
    let api = Arc::new(MemoryLambdaApi::new().with_function("orders"));
    let mut unchecked = (*settings("false", None)).clone();
    unchecked.publish = true;

    let outcome = PhaseSequencer::new(api.clone(), Arc::new(unchecked))
        .run(vec![spec("orders")])
        .await;

    assert!(matches!(outcome.error, Some(DeployError::Validation(_))));
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn layer_resolution_ignores_listing_order() {
    let orders: [Vec<i64>; 4] = [vec![4, 12, 9], vec![12, 9, 4], vec![9, 4, 12], vec![4, 9, 12]];

    for listing in orders {
        let api = Arc::new(
            MemoryLambdaApi::new()
                .with_function("orders")
                .with_layer("deps", &listing),
        );

        let outcome = PhaseSequencer::new(api.clone(), settings("false", None))
            .run(vec![spec("orders").with_layers(&["deps"])])
            .await;

        assert!(outcome.success());
        assert_eq!(
            api.applied_configuration("orders").unwrap().layers,
            vec![layer_arn("deps", 12)]
        );
    }
}

#[tokio::test]
async fn alias_phase_failing_everywhere_is_fatal() {
    let api = Arc::new(
        MemoryLambdaApi::new()
            .with_function("orders")
            .fail_all(
                Operation::UpdateAlias,
                ApiError::not_found("alias live", "Alias not found: live"),
            ),
    );

    let outcome = PhaseSequencer::new(api, settings("true", Some("live")))
        .run(vec![spec("orders")])
        .await;

    assert!(matches!(
        outcome.error,
        Some(DeployError::PhaseFailed {
            phase: Phase::Alias,
            ..
        })
    ));
    assert_eq!(outcome.exit_code(), 1);
    assert!(outcome.report.failure.is_some());
}
