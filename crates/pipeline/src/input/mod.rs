//! 기본 입력 플러그인
//!
//! # 입력 소스
//! - [`StdinInput`] (`stdin`): 표준 입력을 한 줄씩 코덱으로 디코딩
//! - [`GeneratorInput`] (`generator`): 템플릿 메시지를 주기적으로 생성 (데모/테스트용)
//!
//! # 아키텍처
//! 각 입력은 자체 tokio 태스크에서 실행되며, 생성한 이벤트를
//! `tokio::mpsc::Sender<LogEvent>` 채널을 통해 필터 단계로 전달합니다.
//! 두 입력 모두 [`PauseGate`]로 백프레셔에 참여합니다.

mod generator;
mod stdin;

use std::sync::Arc;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use logship_core::error::PluginError;
use logship_core::registry::PluginRegistry;
use logship_core::{Input, PauseFlag, Pausable, PluginContext};

pub use generator::{GeneratorConfig, GeneratorInput};
pub use stdin::{StdinConfig, StdinInput};

/// 기본 입력을 레지스트리에 등록합니다.
pub fn register(registry: &mut PluginRegistry) -> Result<(), PluginError> {
    registry.register_input(stdin::NAME, |ctx, raw| {
        let input: Box<dyn Input> = Box::new(StdinInput::from_config(ctx, raw)?);
        Ok(input)
    })?;
    registry.register_input(generator::NAME, |ctx, raw| {
        let input: Box<dyn Input> = Box::new(GeneratorInput::from_config(ctx, raw)?);
        Ok(input)
    })?;
    Ok(())
}

/// 입력 측 일시정지 게이트
///
/// [`Control`](logship_core::Control) 구독 루프가 `pause`/`resume`을 호출하고,
/// 입력 루프는 다음 레코드를 읽기 전에 [`PauseGate::wait_resumed`]로 대기합니다.
#[derive(Debug, Default)]
pub struct PauseGate {
    flag: PauseFlag,
    notify: Notify,
}

impl PauseGate {
    /// 게이트를 만들고 파이프라인 제어 객체에 구독시킵니다.
    pub fn subscribe(ctx: &PluginContext) -> Arc<Self> {
        let gate = Arc::new(Self::default());
        ctx.control.subscribe(gate.clone(), ctx.cancel.child_token());
        gate
    }

    pub fn is_paused(&self) -> bool {
        self.flag.is_paused()
    }

    /// 재개될 때까지 기다립니다. 취소되면 `false`를 반환합니다.
    pub async fn wait_resumed(&self, cancel: &CancellationToken) -> bool {
        loop {
            let notified = self.notify.notified();
            if !self.flag.is_paused() {
                return true;
            }
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = notified => {}
            }
        }
    }
}

impl Pausable for PauseGate {
    fn pause(&self) {
        if self.flag.set_paused() {
            tracing::debug!("input paused by backpressure");
        }
    }

    fn resume(&self) {
        if self.flag.set_resumed() {
            tracing::debug!("input resumed");
        }
        self.notify.notify_waiters();
    }
}
