use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use logship_core::error::Result;
use logship_core::{BoxFuture, Codec, LogEvent, Output};

pub(super) const NAME: &str = "stdout";

/// 이벤트를 한 줄씩 기록하는 출력
///
/// 실제 플러그인은 `tokio::io::Stdout`을 쓰며, 테스트에서는 임의의 writer를 넣습니다.
pub struct StdoutOutput<W = tokio::io::Stdout> {
    codec: Arc<dyn Codec>,
    writer: Mutex<W>,
}

impl<W> StdoutOutput<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(codec: Arc<dyn Codec>, writer: W) -> Self {
        Self {
            codec,
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    async fn write_line(&self, event: &LogEvent) -> Result<()> {
        let encoded = self.codec.encode(event)?;
        let mut writer = self.writer.lock().await;
        writer.write_all(&encoded).await?;
        if !encoded.ends_with(b"\n") {
            writer.write_all(b"\n").await?;
        }
        writer.flush().await?;
        Ok(())
    }
}

impl<W> Output for StdoutOutput<W>
where
    W: AsyncWrite + Unpin + Send,
{
    fn name(&self) -> &str {
        NAME
    }

    fn output(&self, event: LogEvent) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move { self.write_line(&event).await })
    }
}
