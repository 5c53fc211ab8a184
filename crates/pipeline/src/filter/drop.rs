use logship_core::{Filter, LogEvent};

pub(super) const NAME: &str = "drop";

/// 모든 이벤트를 폐기하는 필터. 주로 `cond`의 하위 체인에서 사용합니다.
#[derive(Debug, Default)]
pub struct DropFilter;

impl Filter for DropFilter {
    fn name(&self) -> &str {
        NAME
    }

    fn apply(&self, _event: LogEvent) -> Option<LogEvent> {
        None
    }
}
