use serde::Deserialize;

use logship_core::{Filter, LogEvent};

pub(super) const NAME: &str = "remove_field";

/// remove_field 필터 설정
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RemoveFieldConfig {
    /// 제거할 필드 경로 (템플릿 치환)
    pub fields: Vec<String>,
}

/// 지정한 필드를 제거하는 필터. `@timestamp`는 제거되지 않습니다.
#[derive(Debug)]
pub struct RemoveFieldFilter {
    fields: Vec<String>,
}

impl RemoveFieldFilter {
    pub fn new(config: RemoveFieldConfig) -> Self {
        Self {
            fields: config.fields,
        }
    }
}

impl Filter for RemoveFieldFilter {
    fn name(&self) -> &str {
        NAME
    }

    fn apply(&self, mut event: LogEvent) -> Option<LogEvent> {
        for field in &self.fields {
            let field = event.format(field);
            event.remove(&field);
        }
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn removes_nested_and_reserved_fields() {
        let filter = RemoveFieldFilter::new(RemoveFieldConfig {
            fields: vec!["a.b".into(), "message".into(), "@timestamp".into(), "nope".into()],
        });
        let mut event = LogEvent::with_message("bye");
        event.set_value("a", json!({"b": 1, "c": 2}));
        let ts = event.timestamp;

        let out = filter.apply(event).unwrap();
        assert_eq!(out.get("a"), Some(json!({"c": 2})));
        assert_eq!(out.message, "");
        assert_eq!(out.timestamp, ts);
    }
}
