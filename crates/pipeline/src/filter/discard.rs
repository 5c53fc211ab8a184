use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use logship_core::{Filter, LogEvent, PluginContext};

use crate::input::PauseGate;

pub(super) const NAME: &str = "discard";

/// 백프레셔 동안 이벤트를 폐기하는 필터
///
/// 입력을 멈출 수 없는 소스(예: UDP) 앞에서 출력이 밀릴 때 메모리 증가를 막습니다.
/// 파이프라인 [`Control`](logship_core::Control)을 구독하며, 필터 체인 태스크를
/// 블로킹하지 않고 원자적 플래그만 확인합니다.
pub struct DiscardFilter {
    gate: Arc<PauseGate>,
    discarded: AtomicU64,
}

impl DiscardFilter {
    pub fn new(ctx: &PluginContext) -> Self {
        Self {
            gate: PauseGate::subscribe(ctx),
            discarded: AtomicU64::new(0),
        }
    }

    /// 지금까지 폐기한 이벤트 수
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }
}

impl Filter for DiscardFilter {
    fn name(&self) -> &str {
        NAME
    }

    fn apply(&self, event: LogEvent) -> Option<LogEvent> {
        if !self.gate.is_paused() {
            return Some(event);
        }
        let total = self.discarded.fetch_add(1, Ordering::Relaxed) + 1;
        if total == 1 || total % 1000 == 0 {
            debug!(discarded = total, "discarding events under backpressure");
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use logship_core::Control;
    use logship_core::registry::PluginRegistry;
    use tokio_util::sync::CancellationToken;

    async fn eventually(mut check: impl FnMut() -> bool) {
        for _ in 0..100 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn drops_only_while_paused() {
        let control = Arc::new(Control::new());
        let ctx = PluginContext::new(
            control.clone(),
            Arc::new(PluginRegistry::new()),
            CancellationToken::new(),
        );
        let filter = DiscardFilter::new(&ctx);
        assert!(filter.apply(LogEvent::with_message("a")).is_some());

        control.request_pause();
        eventually(|| filter.gate.is_paused()).await;
        assert!(filter.apply(LogEvent::with_message("b")).is_none());
        assert_eq!(filter.discarded(), 1);

        control.request_resume();
        eventually(|| !filter.gate.is_paused()).await;
        assert!(filter.apply(LogEvent::with_message("c")).is_some());
        ctx.cancel.cancel();
    }
}
