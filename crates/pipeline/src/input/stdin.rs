use std::io::BufRead;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use logship_core::error::Result;
use logship_core::plugin::decode_to;
use logship_core::{BoxFuture, Codec, ConfigRaw, Input, LogEvent, PluginContext, decode_plugin_config};

use super::PauseGate;
use crate::codec::DEFAULT_CODEC;
use crate::error::StageError;

pub(super) const NAME: &str = "stdin";

/// 읽기 스레드 → 입력 태스크 줄 버퍼 크기
const LINE_BUFFER: usize = 64;

/// stdin 입력 설정
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StdinConfig {
    /// 이벤트에 붙일 태그
    pub tags: Vec<String>,
}

/// 표준 입력을 줄 단위로 읽어 코덱으로 디코딩하는 입력
///
/// 각 이벤트에는 `host` 필드(OS 호스트명)가 붙습니다.
pub struct StdinInput {
    codec: Arc<dyn Codec>,
    extra: Map<String, Value>,
    tags: Vec<String>,
    gate: Arc<PauseGate>,
}

impl StdinInput {
    pub fn from_config(ctx: &PluginContext, raw: &ConfigRaw) -> Result<Self> {
        let config: StdinConfig = decode_plugin_config(NAME, raw)?;
        let codec = ctx.registry.build_codec(raw.get("codec"), DEFAULT_CODEC)?;

        let mut extra = Map::new();
        if let Some(host) = hostname::get().ok().and_then(|h| h.into_string().ok()) {
            extra.insert("host".to_owned(), Value::String(host));
        }

        Ok(Self {
            codec,
            extra,
            tags: config.tags,
            gate: PauseGate::subscribe(ctx),
        })
    }
}

impl Input for StdinInput {
    fn name(&self) -> &str {
        NAME
    }

    fn run(
        self: Box<Self>,
        cancel: CancellationToken,
        tx: mpsc::Sender<LogEvent>,
    ) -> BoxFuture<'static, Result<()>> {
        Box::pin(async move {
            let lines = spawn_line_reader(std::io::BufReader::new(std::io::stdin()))
                .map_err(StageError::Io)?;
            self.read_lines(lines, cancel, tx).await
        })
    }
}

/// 블로킹 읽기를 전용 OS 스레드에서 수행하고 줄을 채널로 넘깁니다.
///
/// 표준 입력 읽기는 취소할 수 없으므로 런타임의 blocking 풀을 쓰지 않습니다.
/// 수신측이 닫히면 스레드는 다음 줄을 읽은 뒤 종료하고, 그 전에 프로세스가
/// 끝나면 함께 사라집니다.
fn spawn_line_reader<R>(reader: R) -> std::io::Result<mpsc::Receiver<std::io::Result<String>>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(LINE_BUFFER);
    std::thread::Builder::new()
        .name("logship-stdin".to_owned())
        .spawn(move || {
            for line in reader.lines() {
                let failed = line.is_err();
                if tx.blocking_send(line).is_err() || failed {
                    break;
                }
            }
        })?;
    Ok(rx)
}

impl StdinInput {
    /// 줄 채널에서 EOF 또는 취소까지 읽어 전달합니다.
    async fn read_lines(
        &self,
        mut lines: mpsc::Receiver<std::io::Result<String>>,
        cancel: CancellationToken,
        tx: mpsc::Sender<LogEvent>,
    ) -> Result<()> {
        let mut count: u64 = 0;

        loop {
            if !self.gate.wait_resumed(&cancel).await {
                break;
            }

            let line = tokio::select! {
                _ = cancel.cancelled() => break,
                line = lines.recv() => line,
            };
            let Some(line) = line else {
                info!(lines = count, "stdin reached EOF");
                break;
            };
            let line = line.map_err(StageError::Io)?;
            if line.is_empty() {
                continue;
            }

            count += 1;
            if let Err(e) =
                decode_to(self.codec.as_ref(), line.as_bytes(), Some(&self.extra), &self.tags, &tx).await
            {
                if cancel.is_cancelled() {
                    break;
                }
                return Err(e);
            }
        }

        debug!(lines = count, "stdin input stopped");
        Ok(())
    }
}
