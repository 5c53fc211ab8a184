//! Orchestrator tests: build from files and run finite pipelines to completion.

use std::time::Duration;

use logship_core::PipelineConfig;
use logship_daemon::orchestrator::Orchestrator;
use logship_pipeline::PipelineState;

#[tokio::test]
async fn build_from_missing_file_fails() {
    let result = Orchestrator::build(std::path::Path::new("/nonexistent/logship.yml")).await;
    let err = result.err().expect("missing file must fail");
    assert!(format!("{:#}", err).contains("/nonexistent/logship.yml"));
}

#[tokio::test]
async fn finite_generator_runs_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.log");
    let config_path = dir.path().join("logship.yml");
    let yaml = format!(
        r#"
general:
  log_level: info
  log_format: json
input:
  - type: generator
    message: "event %{{sequence}}"
    count: 3
    interval_ms: 1
output:
  - type: file
    path: "{}"
    codec: plain
"#,
        out.display()
    );
    tokio::fs::write(&config_path, yaml).await.unwrap();

    let mut orchestrator = Orchestrator::build(&config_path).await.unwrap();
    assert_eq!(orchestrator.config().input.len(), 1);
    assert_eq!(orchestrator.state(), PipelineState::Initialized);

    tokio::time::timeout(Duration::from_secs(5), orchestrator.run())
        .await
        .expect("pipeline should finish")
        .unwrap();
    assert_eq!(orchestrator.state(), PipelineState::Stopped);

    let content = tokio::fs::read_to_string(&out).await.unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines, vec!["event 0", "event 1", "event 2"]);
}

#[tokio::test]
async fn unknown_plugin_fails_on_run() {
    let config = PipelineConfig::parse_json(
        r#"{"input":[{"type":"kafka"}],"output":[{"type":"stdout"}]}"#,
    )
    .unwrap();
    let mut orchestrator = Orchestrator::build_from_config(config).unwrap();

    let err = orchestrator.run().await.unwrap_err();
    assert!(format!("{:#}", err).contains("kafka"));
    assert_eq!(orchestrator.state(), PipelineState::Failed);
}

#[tokio::test]
async fn cancel_token_stops_unbounded_input() {
    let config = PipelineConfig::parse_json(
        r#"{"input":[{"type":"generator","interval_ms":5}],"output":[{"type":"stdout","codec":"json"}]}"#,
    )
    .unwrap();
    let mut orchestrator = Orchestrator::build_from_config(config).unwrap();
    let cancel = orchestrator.cancel_token();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    tokio::time::timeout(Duration::from_secs(5), orchestrator.run())
        .await
        .expect("cancel should stop the pipeline")
        .unwrap();
    assert_eq!(orchestrator.state(), PipelineState::Stopped);
}
