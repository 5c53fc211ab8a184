//! 파이프라인 설정 통합 테스트
//!
//! - logship.example.yml 파싱 테스트
//! - 파일 확장자별 로딩 테스트
//! - 환경변수 우선순위 테스트
//! - 빈 파일 / 잘못된 형식 에러 테스트

use std::io::Write;

use logship_core::config::{PipelineConfig, plugin_type};
use logship_core::error::{ConfigError, LogshipError};
use serial_test::serial;

// =============================================================================
// logship.example.yml 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_successfully() {
    let content = include_str!("../../../logship.example.yml");
    let config = PipelineConfig::parse_yaml(content).expect("example config should parse");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "json");
    assert_eq!(config.chsize, 100);
    assert_eq!(config.worker, 1);
    assert!(!config.debugch);
}

#[test]
fn example_config_passes_validation() {
    let content = include_str!("../../../logship.example.yml");
    let config = PipelineConfig::parse_yaml(content).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_keeps_plugin_order() {
    let content = include_str!("../../../logship.example.yml");
    let config = PipelineConfig::parse_yaml(content).expect("should parse");

    let inputs: Vec<_> = config.input.iter().filter_map(plugin_type).collect();
    let filters: Vec<_> = config.filter.iter().filter_map(plugin_type).collect();
    let outputs: Vec<_> = config.output.iter().filter_map(plugin_type).collect();
    assert_eq!(inputs, vec!["stdin"]);
    assert_eq!(filters, vec!["add_field", "cond"]);
    assert_eq!(outputs, vec!["stdout", "file"]);
}

// =============================================================================
// 파일 로딩 테스트
// =============================================================================

fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("create temp file");
    file.write_all(content.as_bytes()).expect("write temp file");
    file
}

#[tokio::test]
async fn load_json_with_comments() {
    let file = write_temp(
        ".json",
        "# generated\n{\n  // stage sizes\n  \"chsize\": 3,\n  \"output\": [{\"type\": \"stdout\"}]\n}\n",
    );
    let config = PipelineConfig::from_file(file.path()).await.unwrap();
    assert_eq!(config.chsize, 3);
    assert_eq!(config.output.len(), 1);
}

#[tokio::test]
async fn load_yaml_by_extension() {
    let file = write_temp(".yaml", "worker: 4\nfilter:\n  - type: drop\n");
    let config = PipelineConfig::from_file(file.path()).await.unwrap();
    assert_eq!(config.worker, 4);
    assert_eq!(plugin_type(&config.filter[0]), Some("drop"));
}

#[tokio::test]
async fn load_toml_by_extension() {
    let file = write_temp(".toml", "debugch = true\n\n[[input]]\ntype = \"generator\"\n");
    let config = PipelineConfig::from_file(file.path()).await.unwrap();
    assert!(config.debugch);
    assert_eq!(plugin_type(&config.input[0]), Some("generator"));
}

#[tokio::test]
async fn empty_yaml_uses_defaults() {
    let file = write_temp(".yml", "");
    let config = PipelineConfig::from_file(file.path()).await.unwrap();
    assert_eq!(config.chsize, 100);
    assert!(config.input.is_empty());
}

#[tokio::test]
async fn malformed_file_is_parse_error() {
    let file = write_temp(".json", "{\"chsize\": }");
    let err = PipelineConfig::from_file(file.path()).await.unwrap_err();
    assert!(matches!(
        err,
        LogshipError::Config(ConfigError::ParseFailed { .. })
    ));
}

// =============================================================================
// 환경변수 우선순위 테스트
// =============================================================================

#[tokio::test]
#[serial]
async fn env_overrides_file_values() {
    let file = write_temp(".yml", "chsize: 10\ngeneral:\n  log_level: warn\n");
    // SAFETY: serial 테스트에서만 환경변수를 수정합니다.
    unsafe {
        std::env::set_var("LOGSHIP_CHSIZE", "42");
        std::env::set_var("LOGSHIP_GENERAL_LOG_LEVEL", "debug");
    }

    let config = PipelineConfig::load(file.path()).await;

    unsafe {
        std::env::remove_var("LOGSHIP_CHSIZE");
        std::env::remove_var("LOGSHIP_GENERAL_LOG_LEVEL");
    }

    let config = config.unwrap();
    assert_eq!(config.chsize, 42);
    assert_eq!(config.general.log_level, "debug");
}

#[tokio::test]
#[serial]
async fn load_rejects_invalid_override() {
    let file = write_temp(".yml", "chsize: 10\n");
    // SAFETY: serial 테스트에서만 환경변수를 수정합니다.
    unsafe { std::env::set_var("LOGSHIP_CHSIZE", "0") };

    let result = PipelineConfig::load(file.path()).await;

    unsafe { std::env::remove_var("LOGSHIP_CHSIZE") };

    assert!(matches!(
        result,
        Err(LogshipError::Config(ConfigError::InvalidValue { .. }))
    ));
}
