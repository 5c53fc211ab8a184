//! 설정 관리 -- 파이프라인 설정 파일 파싱 및 플러그인 설정 디코딩
//!
//! [`PipelineConfig`]는 파이프라인 전체 설정을 담는 최상위 구조체입니다.
//! 플러그인 항목은 타입이 정해지지 않은 트리([`ConfigRaw`])로 보관하고,
//! 각 플러그인 생성자가 [`decode_plugin_config`]로 자기 설정 구조체를 디코딩합니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`LOGSHIP_CHSIZE=200` 형식)
//! 3. 설정 파일 (`.json`, `.yml`/`.yaml`, `.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), logship_core::error::LogshipError> {
//! use logship_core::config::PipelineConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = PipelineConfig::load("logship.yml").await?;
//!
//! // JSON 문자열에서 직접 파싱 (`#`, `//` 주석 허용)
//! let config = PipelineConfig::parse_json("// demo\n{\"chsize\": 10}")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{ConfigError, LogshipError, PluginError};
use crate::template;

/// 타입이 정해지지 않은 플러그인 설정 (`{type: "...", ...}`)
pub type ConfigRaw = Map<String, Value>;

/// 채널 기본 용량
pub const DEFAULT_CHANNEL_SIZE: usize = 100;

/// 파이프라인 통합 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// 일반 설정
    pub general: GeneralConfig,
    /// 메트릭 설정
    pub metrics: MetricsConfig,
    /// 입력 플러그인 목록
    pub input: Vec<ConfigRaw>,
    /// 필터 플러그인 목록 (선언 순서대로 적용)
    pub filter: Vec<ConfigRaw>,
    /// 출력 플러그인 목록
    pub output: Vec<ConfigRaw>,
    /// 단계 간 채널 용량
    pub chsize: usize,
    /// 필터 체인 태스크 수
    pub worker: usize,
    /// 디버그/테스트 채널 활성화
    pub debugch: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            metrics: MetricsConfig::default(),
            input: Vec::new(),
            filter: Vec::new(),
            output: Vec::new(),
            chsize: DEFAULT_CHANNEL_SIZE,
            worker: 1,
            debugch: false,
        }
    }
}

impl PipelineConfig {
    /// 파일에서 설정을 로드하고 환경변수 오버라이드와 검증을 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogshipError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    ///
    /// 확장자로 형식을 고릅니다: `.yml`/`.yaml`은 YAML, `.toml`은 TOML, 그 외는 JSON.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LogshipError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LogshipError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LogshipError::Io(e)
            }
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yml" | "yaml") => Self::parse_yaml(&content),
            Some("toml") => Self::parse_toml(&content),
            _ => Self::parse_json(&content),
        }
    }

    /// JSON 문자열을 파싱합니다. 줄 전체가 `#` 또는 `//` 주석인 줄은 제거합니다.
    pub fn parse_json(json_str: &str) -> Result<Self, LogshipError> {
        serde_json::from_str(&strip_line_comments(json_str)).map_err(|e| {
            ConfigError::ParseFailed {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// YAML 문자열을 파싱합니다.
    pub fn parse_yaml(yaml_str: &str) -> Result<Self, LogshipError> {
        if yaml_str.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml_str).map_err(|e| {
            ConfigError::ParseFailed {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// TOML 문자열을 파싱합니다.
    pub fn parse_toml(toml_str: &str) -> Result<Self, LogshipError> {
        toml::from_str(toml_str).map_err(|e| {
            ConfigError::ParseFailed {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// 환경변수 오버라이드를 적용합니다.
    ///
    /// 플러그인 목록은 오버라이드 대상이 아닙니다.
    pub fn apply_env_overrides(&mut self) {
        override_string(&mut self.general.log_level, "LOGSHIP_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGSHIP_GENERAL_LOG_FORMAT");
        override_usize(&mut self.chsize, "LOGSHIP_CHSIZE");
        override_usize(&mut self.worker, "LOGSHIP_WORKER");
        override_bool(&mut self.debugch, "LOGSHIP_DEBUGCH");
        override_bool(&mut self.metrics.enabled, "LOGSHIP_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "LOGSHIP_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "LOGSHIP_METRICS_PORT");
    }

    /// 설정 값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogshipError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.chsize == 0 {
            return Err(ConfigError::InvalidValue {
                field: "chsize".to_owned(),
                reason: "channel size must be at least 1".to_owned(),
            }
            .into());
        }

        if self.worker == 0 {
            return Err(ConfigError::InvalidValue {
                field: "worker".to_owned(),
                reason: "worker count must be at least 1".to_owned(),
            }
            .into());
        }

        for (section, entries) in [
            ("input", &self.input),
            ("filter", &self.filter),
            ("output", &self.output),
        ] {
            for (idx, raw) in entries.iter().enumerate() {
                if plugin_type(raw).is_none() {
                    return Err(ConfigError::MissingField {
                        field: format!("{section}[{idx}].type"),
                    }
                    .into());
                }
            }
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 바인딩 주소
    pub listen_addr: String,
    /// 바인딩 포트
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
        }
    }
}

/// 플러그인 설정의 `type` 값
pub fn plugin_type(raw: &ConfigRaw) -> Option<&str> {
    raw.get("type").and_then(Value::as_str)
}

/// 플러그인 설정을 타입이 있는 구조체로 디코딩합니다.
///
/// 디코딩 전에 트리 안의 모든 문자열에 환경변수 치환(`%{NAME}`)을 적용합니다.
/// 알 수 없는 필드(`type`, 공통 필터 옵션 등)는 무시됩니다.
pub fn decode_plugin_config<T: DeserializeOwned>(
    plugin: &str,
    raw: &ConfigRaw,
) -> Result<T, PluginError> {
    let mut tree = Value::Object(raw.clone());
    substitute_env(&mut tree);
    serde_json::from_value(tree).map_err(|e| PluginError::InvalidConfig {
        plugin: plugin.to_owned(),
        reason: e.to_string(),
    })
}

fn substitute_env(value: &mut Value) {
    match value {
        Value::String(s) => {
            if s.contains("%{") {
                *s = template::format_env(s);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(substitute_env),
        Value::Object(map) => map.values_mut().for_each(substitute_env),
        _ => {}
    }
}

/// 줄 전체가 `#` 또는 `//` 주석인 줄을 제거합니다.
///
/// 문자열 안의 `#`, `//`를 건드리지 않도록 줄 끝 주석은 지원하지 않습니다.
pub fn strip_line_comments(input: &str) -> String {
    input
        .lines()
        .filter(|line| {
            let trimmed = line.trim_start();
            !(trimmed.starts_with('#') || trimmed.starts_with("//"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;

    #[test]
    fn default_config_has_sane_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.chsize, 100);
        assert_eq!(config.worker, 1);
        assert!(!config.debugch);
        assert_eq!(config.general.log_level, "info");
        assert!(!config.metrics.enabled);
        config.validate().unwrap();
    }

    #[test]
    fn parse_json_strips_comment_lines() {
        let src = r#"
            # hash comment
            {
              // slash comment
              "chsize": 5,
              "input": [{"type": "generator", "message": "a#b//c"}],
              "output": [{"type": "stdout"}]
            }
        "#;
        let config = PipelineConfig::parse_json(src).unwrap();
        assert_eq!(config.chsize, 5);
        assert_eq!(config.input[0].get("message"), Some(&json!("a#b//c")));
        assert_eq!(plugin_type(&config.output[0]), Some("stdout"));
    }

    #[test]
    fn parse_yaml_plugin_lists() {
        let src = r#"
chsize: 10
debugch: true
input:
  - type: stdin
filter:
  - type: add_field
    key: foo
    value: bar
output:
  - type: stdout
    codec: json
"#;
        let config = PipelineConfig::parse_yaml(src).unwrap();
        assert_eq!(config.chsize, 10);
        assert!(config.debugch);
        assert_eq!(config.filter.len(), 1);
        assert_eq!(config.filter[0].get("key"), Some(&json!("foo")));
        assert_eq!(config.output[0].get("codec"), Some(&json!("json")));
    }

    #[test]
    fn parse_toml_config() {
        let src = r#"
chsize = 20

[general]
log_level = "debug"

[[output]]
type = "stdout"
"#;
        let config = PipelineConfig::parse_toml(src).unwrap();
        assert_eq!(config.chsize, 20);
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.output.len(), 1);
    }

    #[test]
    fn parse_invalid_json_returns_error() {
        let err = PipelineConfig::parse_json("{not json").unwrap_err();
        assert!(matches!(
            err,
            LogshipError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_zero_chsize() {
        let config = PipelineConfig {
            chsize: 0,
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().to_string().contains("chsize"));
    }

    #[test]
    fn validate_rejects_invalid_log_format() {
        let mut config = PipelineConfig::default();
        config.general.log_format = "xml".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_plugin_without_type() {
        let config = PipelineConfig::parse_json(r#"{"filter": [{"key": "x"}]}"#).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("filter[0].type"));
    }

    #[test]
    #[serial]
    fn env_override_pipeline_options() {
        let mut config = PipelineConfig::default();
        // SAFETY: serial 테스트에서만 환경변수를 수정합니다.
        unsafe {
            std::env::set_var("LOGSHIP_CHSIZE", "7");
            std::env::set_var("LOGSHIP_DEBUGCH", "true");
            std::env::set_var("LOGSHIP_WORKER", "not-a-number");
        }
        config.apply_env_overrides();
        assert_eq!(config.chsize, 7);
        assert!(config.debugch);
        assert_eq!(config.worker, 1); // 원래 값 유지
        unsafe {
            std::env::remove_var("LOGSHIP_CHSIZE");
            std::env::remove_var("LOGSHIP_DEBUGCH");
            std::env::remove_var("LOGSHIP_WORKER");
        }
    }

    #[derive(Debug, Deserialize)]
    struct FileOutput {
        path: String,
        #[serde(default)]
        tags: Vec<String>,
    }

    #[test]
    #[serial]
    fn decode_plugin_config_substitutes_env() {
        // SAFETY: serial 테스트에서만 환경변수를 수정합니다.
        unsafe { std::env::set_var("LOGSHIP_TEST_DIR", "/var/log/app") };
        let raw = json!({"type": "file", "path": "%{LOGSHIP_TEST_DIR}/out.log", "tags": ["%{LOGSHIP_TEST_DIR}"]});
        let Value::Object(raw) = raw else { unreachable!() };
        let decoded: FileOutput = decode_plugin_config("file", &raw).unwrap();
        assert_eq!(decoded.path, "/var/log/app/out.log");
        assert_eq!(decoded.tags, vec!["/var/log/app"]);
        unsafe { std::env::remove_var("LOGSHIP_TEST_DIR") };
    }

    #[test]
    fn decode_plugin_config_reports_plugin_name() {
        let raw = json!({"type": "file"});
        let Value::Object(raw) = raw else { unreachable!() };
        let err = decode_plugin_config::<FileOutput>("file", &raw).unwrap_err();
        assert!(matches!(err, PluginError::InvalidConfig { ref plugin, .. } if plugin == "file"));
        assert!(err.to_string().contains("path"));
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let err = PipelineConfig::from_file("/nonexistent/path/logship.yml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LogshipError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
