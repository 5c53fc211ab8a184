use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use logship_core::error::{PipelineError, Result};
use logship_core::{BoxFuture, ConfigRaw, Input, LogEvent, PluginContext, decode_plugin_config};

use super::PauseGate;

pub(super) const NAME: &str = "generator";

/// generator 입력 설정
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// 메시지 템플릿 (`%{sequence}` 등 치환 가능)
    pub message: String,
    /// 생성할 이벤트 수 (0 = 무제한)
    pub count: u64,
    /// 이벤트 간 간격 (밀리초, 0 = 간격 없음)
    pub interval_ms: u64,
    /// 모든 이벤트에 추가할 필드
    pub fields: Map<String, Value>,
    /// 모든 이벤트에 추가할 태그
    pub tags: Vec<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            message: "Hello World!".to_owned(),
            count: 0,
            interval_ms: 1000,
            fields: Map::new(),
            tags: Vec::new(),
        }
    }
}

/// 설정된 메시지를 순번과 함께 반복 생성하는 입력
pub struct GeneratorInput {
    config: GeneratorConfig,
    gate: Arc<PauseGate>,
}

impl GeneratorInput {
    pub fn from_config(ctx: &PluginContext, raw: &ConfigRaw) -> Result<Self> {
        let config: GeneratorConfig = decode_plugin_config(NAME, raw)?;
        Ok(Self {
            config,
            gate: PauseGate::subscribe(ctx),
        })
    }

    fn build_event(&self, sequence: u64) -> LogEvent {
        let mut event = LogEvent::new().with_extra(self.config.fields.clone());
        event.set_value("sequence", sequence);
        event.message = event.format(&self.config.message);
        event.add_tag(&self.config.tags);
        event
    }
}

impl Input for GeneratorInput {
    fn name(&self) -> &str {
        NAME
    }

    fn run(
        self: Box<Self>,
        cancel: CancellationToken,
        tx: mpsc::Sender<LogEvent>,
    ) -> BoxFuture<'static, Result<()>> {
        Box::pin(async move {
            let interval = Duration::from_millis(self.config.interval_ms);
            let mut sequence: u64 = 0;

            while self.config.count == 0 || sequence < self.config.count {
                if !self.gate.wait_resumed(&cancel).await {
                    break;
                }

                let event = self.build_event(sequence);
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    sent = tx.send(event) => {
                        sent.map_err(|e| PipelineError::ChannelSend(e.to_string()))?;
                    }
                }
                sequence += 1;

                if !interval.is_zero() {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(interval) => {}
                    }
                }
            }

            debug!(generated = sequence, "generator input stopped");
            Ok(())
        })
    }
}
