use serde::Deserialize;

use logship_core::{Filter, LogEvent};

pub(super) const NAME: &str = "add_tag";

/// add_tag 필터 설정
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AddTagConfig {
    /// 추가할 태그 (템플릿 치환, 중복 무시)
    pub tags: Vec<String>,
}

#[derive(Debug)]
pub struct AddTagFilter {
    tags: Vec<String>,
}

impl AddTagFilter {
    pub fn new(config: AddTagConfig) -> Self {
        Self { tags: config.tags }
    }
}

impl Filter for AddTagFilter {
    fn name(&self) -> &str {
        NAME
    }

    fn apply(&self, mut event: LogEvent) -> Option<LogEvent> {
        event.add_tag(&self.tags);
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_without_duplicates() {
        let filter = AddTagFilter::new(AddTagConfig {
            tags: vec!["a".into(), "svc-%{service}".into(), "a".into()],
        });
        let mut event = LogEvent::new();
        event.set_value("service", "api");
        event.add_tag(["a"]);

        let out = filter.apply(event).unwrap();
        assert_eq!(out.tags, vec!["a", "svc-api"]);
    }
}
