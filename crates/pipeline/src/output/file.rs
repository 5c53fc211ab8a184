use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Deserialize;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use logship_core::error::{PluginError, Result};
use logship_core::{BoxFuture, Codec, LogEvent};

use crate::queue::{DEFAULT_MAX_QUEUE_SIZE, QueueItem, RetryConfig, RetrySink};

pub(super) const NAME: &str = "file";

/// file 출력 설정
#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
    /// 대상 경로 템플릿 (예: `/var/log/app/%{+@%Y.%m.%d}.log`)
    pub path: String,
    /// 재시도 간격 (초)
    #[serde(default = "default_retry_interval")]
    pub retry_interval: u64,
    /// 최대 보관 항목 수 (`-1` 무제한, `0` 버퍼링 없음)
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: i64,
}

fn default_retry_interval() -> u64 {
    10
}

fn default_max_queue_size() -> i64 {
    DEFAULT_MAX_QUEUE_SIZE
}

impl FileConfig {
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            retry_interval: Duration::from_secs(self.retry_interval.max(1)),
            max_queue_size: self.max_queue_size,
            ..RetryConfig::default()
        }
    }
}

/// 템플릿 경로의 파일에 인코딩된 줄을 덧붙이는 전달 대상
///
/// 마지막으로 연 파일 핸들을 재사용하며, 경로가 바뀌면(예: 날짜 변경) 새로 엽니다.
pub struct FileSink {
    path: String,
    codec: Arc<dyn Codec>,
    current: Mutex<Option<(PathBuf, File)>>,
}

impl FileSink {
    pub fn new(config: FileConfig, codec: Arc<dyn Codec>) -> Result<Self> {
        if config.path.trim().is_empty() {
            return Err(PluginError::InvalidConfig {
                plugin: NAME.to_owned(),
                reason: "path must not be empty".to_owned(),
            }
            .into());
        }
        Ok(Self {
            path: config.path,
            codec,
            current: Mutex::new(None),
        })
    }

    fn render(&self, item: &QueueItem) -> Result<(PathBuf, Bytes)> {
        match item {
            QueueItem::Event(event) => Ok((
                PathBuf::from(event.format(&self.path)),
                self.codec.encode(event)?,
            )),
            QueueItem::Raw(data) => Ok((
                PathBuf::from(LogEvent::new().format(&self.path)),
                data.clone(),
            )),
        }
    }

    async fn append(&self, path: &Path, data: &[u8]) -> Result<()> {
        let mut current = self.current.lock().await;

        let reopen = !matches!(current.as_ref(), Some((open, _)) if open == path);
        if reopen {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path).await?;
            debug!(path = %path.display(), "file output opened");
            *current = Some((path.to_path_buf(), file));
        }

        let Some((_, file)) = current.as_mut() else {
            return Ok(());
        };
        let written = async {
            file.write_all(data).await?;
            if !data.ends_with(b"\n") {
                file.write_all(b"\n").await?;
            }
            file.flush().await
        }
        .await;

        if written.is_err() {
            // 다음 시도에서 다시 엽니다.
            *current = None;
        }
        Ok(written?)
    }
}

impl RetrySink for FileSink {
    fn name(&self) -> &str {
        NAME
    }

    fn deliver<'a>(&'a self, item: &'a QueueItem) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let (path, data) = self.render(item)?;
            self.append(&path, &data).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonCodec;
    use crate::queue::{QueueState, RetryOutput};
    use logship_core::{Control, Output};
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    fn sink(path: String) -> FileSink {
        let config: FileConfig = serde_json::from_value(json!({ "path": path })).unwrap();
        FileSink::new(config, Arc::new(JsonCodec)).unwrap()
    }

    #[tokio::test]
    async fn appends_to_templated_path() {
        let dir = tempfile::tempdir().unwrap();
        let sink = sink(format!("{}/%{{service}}/out.log", dir.path().display()));

        for (service, msg) in [("api", "a1"), ("web", "w1"), ("api", "a2")] {
            let mut event = LogEvent::with_message(msg);
            event.set_value("service", service);
            sink.deliver(&QueueItem::Event(event)).await.unwrap();
        }

        let api = std::fs::read_to_string(dir.path().join("api/out.log")).unwrap();
        let lines: Vec<_> = api.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("\"a2\""));
        let web = std::fs::read_to_string(dir.path().join("web/out.log")).unwrap();
        assert_eq!(web.lines().count(), 1);
    }

    #[tokio::test]
    async fn raw_items_are_written_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let sink = sink(format!("{}/raw.log", dir.path().display()));
        sink.deliver(&QueueItem::Raw(Bytes::from_static(b"already encoded")))
            .await
            .unwrap();
        let content = std::fs::read_to_string(dir.path().join("raw.log")).unwrap();
        assert_eq!(content, "already encoded\n");
    }

    #[tokio::test]
    async fn unwritable_path_queues_and_pauses() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let control = Arc::new(Control::new());
        let cancel = CancellationToken::new();
        let output = RetryOutput::new(
            sink(format!("{}/out.log", blocker.display())),
            RetryConfig {
                retry_interval: Duration::from_secs(60),
                ..RetryConfig::default()
            },
            control.clone(),
            cancel.clone(),
        );

        output.output(LogEvent::with_message("kept")).await.unwrap();
        assert_eq!(output.queue().state(), QueueState::Paused);
        assert!(control.is_paused());
        cancel.cancel();
    }

    #[test]
    fn retry_config_from_seconds() {
        let config: FileConfig =
            serde_json::from_value(json!({"path": "/tmp/x", "retry_interval": 0, "max_queue_size": -1}))
                .unwrap();
        let retry = config.retry_config();
        assert_eq!(retry.retry_interval, Duration::from_secs(1));
        assert_eq!(retry.max_queue_size, -1);
    }
}
