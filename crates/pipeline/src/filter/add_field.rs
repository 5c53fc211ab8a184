use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use logship_core::error::{PluginError, Result};
use logship_core::event::ERROR_TAG_FILTER;
use logship_core::{Filter, LogEvent};

pub(super) const NAME: &str = "add_field";

/// add_field 필터 설정
#[derive(Debug, Clone, Deserialize)]
pub struct AddFieldConfig {
    /// 대상 필드 경로 (템플릿 치환)
    pub key: String,
    /// 설정할 값 (문자열이면 템플릿 치환)
    pub value: Value,
    /// 이미 값이 있을 때 덮어쓸지 여부
    #[serde(default = "default_overwrite")]
    pub overwrite: bool,
}

fn default_overwrite() -> bool {
    true
}

/// 필드 하나를 설정하는 필터
///
/// 경로 충돌로 설정할 수 없으면 [`ERROR_TAG_FILTER`] 태그를 붙이고 전달합니다.
#[derive(Debug)]
pub struct AddFieldFilter {
    config: AddFieldConfig,
}

impl AddFieldFilter {
    pub fn new(config: AddFieldConfig) -> Result<Self> {
        if config.key.trim().is_empty() {
            return Err(PluginError::InvalidConfig {
                plugin: NAME.to_owned(),
                reason: "key must not be empty".to_owned(),
            }
            .into());
        }
        Ok(Self { config })
    }
}

impl Filter for AddFieldFilter {
    fn name(&self) -> &str {
        NAME
    }

    fn apply(&self, mut event: LogEvent) -> Option<LogEvent> {
        let key = event.format(&self.config.key);
        if !self.config.overwrite && event.get(&key).is_some() {
            return Some(event);
        }

        let value = match &self.config.value {
            Value::String(s) => Value::String(event.format(s)),
            other => other.clone(),
        };
        if !event.set_value(&key, value) {
            warn!(field = %key, "add_field: path conflicts with existing value");
            event.add_tag([ERROR_TAG_FILTER]);
        }
        Some(event)
    }
}
