//! 플러그인 계약 -- 입력, 필터, 출력, 코덱이 구현하는 trait
//!
//! 파이프라인은 설정의 `type` 문자열로 [`PluginRegistry`](crate::registry::PluginRegistry)에서
//! 플러그인을 생성하고, 아래 trait을 통해서만 다룹니다.
//!
//! ```text
//! Input ──mpsc──▶ [Filter, Filter, ...] ──mpsc──▶ Output (각자 태스크)
//!   ▲                                               │
//!   └──────────── Control (pause/resume) ◀──────────┘
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::control::Control;
use crate::error::{CodecError, DecodeFailure, PipelineError, Result};
use crate::event::LogEvent;
use crate::metrics as m;
use crate::registry::PluginRegistry;

/// `dyn` trait에서 사용하는 박싱된 future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ─── PluginContext ───────────────────────────────────────────────────

/// 플러그인 생성자에게 전달되는 공유 핸들
#[derive(Clone)]
pub struct PluginContext {
    /// 파이프라인의 백프레셔 제어 객체
    pub control: Arc<Control>,
    /// 중첩 필터 체인 등을 만들기 위한 레지스트리
    pub registry: Arc<PluginRegistry>,
    /// 파이프라인 종료 신호 (백그라운드 태스크가 관찰)
    pub cancel: CancellationToken,
}

impl PluginContext {
    pub fn new(
        control: Arc<Control>,
        registry: Arc<PluginRegistry>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            control,
            registry,
            cancel,
        }
    }
}

// ─── Input ───────────────────────────────────────────────────────────

/// 입력 플러그인
///
/// `run`은 취소되거나 치명적 에러가 날 때까지 이벤트를 `tx`로 보냅니다.
/// `cancel` 발화 후에는 즉시 반환해야 합니다. 백프레셔에 참여하려면
/// 생성 시점에 [`Control::subscribe`]로 [`Pausable`](crate::control::Pausable) 구현체를 등록합니다.
pub trait Input: Send {
    /// 플러그인 타입 이름
    fn name(&self) -> &str;

    /// 입력을 실행합니다.
    fn run(
        self: Box<Self>,
        cancel: CancellationToken,
        tx: mpsc::Sender<LogEvent>,
    ) -> BoxFuture<'static, Result<()>>;
}

// ─── Filter ──────────────────────────────────────────────────────────

/// 필터 플러그인
///
/// 필터 체인 태스크 안에서 동기적으로 호출됩니다. `None`을 반환하면
/// 이벤트는 이후 필터와 출력에 도달하지 않습니다.
/// 오래 걸리는 작업은 체인 전체를 멈추므로 자체 백그라운드 태스크로 처리해야 합니다.
pub trait Filter: Send + Sync {
    /// 플러그인 타입 이름
    fn name(&self) -> &str;

    /// 이벤트를 변환합니다.
    fn apply(&self, event: LogEvent) -> Option<LogEvent>;
}

/// 필터 체인을 순서대로 적용합니다. 어느 필터든 `None`을 반환하면 즉시 중단합니다.
pub fn apply_chain(filters: &[Box<dyn Filter>], mut event: LogEvent) -> Option<LogEvent> {
    for filter in filters {
        event = filter.apply(event)?;
    }
    Some(event)
}

/// 모든 필터가 공통으로 지원하는 후처리 옵션
///
/// 필터가 이벤트를 전달한 경우에만 적용됩니다.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommonFilterConfig {
    /// 추가할 태그
    pub add_tag: Vec<String>,
    /// 제거할 태그
    pub remove_tag: Vec<String>,
    /// 추가할 필드 (문자열 값은 템플릿 치환)
    pub add_field: Map<String, Value>,
    /// 제거할 필드
    pub remove_field: Vec<String>,
}

impl CommonFilterConfig {
    pub fn is_empty(&self) -> bool {
        self.add_tag.is_empty()
            && self.remove_tag.is_empty()
            && self.add_field.is_empty()
            && self.remove_field.is_empty()
    }

    /// 공통 옵션을 이벤트에 적용합니다.
    pub fn apply(&self, event: &mut LogEvent) {
        for field in &self.remove_field {
            let field = event.format(field);
            event.remove(&field);
        }
        for (key, value) in &self.add_field {
            let key = event.format(key);
            let value = match value {
                Value::String(s) => Value::String(event.format(s)),
                other => other.clone(),
            };
            event.set_value(&key, value);
        }
        event.add_tag(&self.add_tag);
        event.remove_tag(&self.remove_tag);
    }
}

/// 공통 옵션을 덧붙인 필터
pub struct CommonFilter {
    inner: Box<dyn Filter>,
    common: CommonFilterConfig,
}

impl CommonFilter {
    /// 옵션이 비어 있으면 원래 필터를 그대로 반환합니다.
    pub fn wrap(inner: Box<dyn Filter>, common: CommonFilterConfig) -> Box<dyn Filter> {
        if common.is_empty() {
            inner
        } else {
            Box::new(Self { inner, common })
        }
    }
}

impl Filter for CommonFilter {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn apply(&self, event: LogEvent) -> Option<LogEvent> {
        let mut event = self.inner.apply(event)?;
        self.common.apply(&mut event);
        Some(event)
    }
}

// ─── Output ──────────────────────────────────────────────────────────

/// 출력 플러그인
///
/// 출력 단계에 도달한 이벤트마다 한 번 호출됩니다. 반환된 에러는 파이프라인이
/// 로그로 남길 뿐 다른 출력을 멈추지 않습니다.
pub trait Output: Send + Sync {
    /// 플러그인 타입 이름
    fn name(&self) -> &str;

    /// 이벤트를 전달합니다.
    fn output(&self, event: LogEvent) -> BoxFuture<'_, Result<()>>;
}

// ─── Codec ───────────────────────────────────────────────────────────

/// 코덱 플러그인 -- 원시 바이트와 이벤트 사이의 변환
///
/// 디코딩에 실패해도 데이터를 버리지 않습니다. 실패 시 원본을 메시지로 담고
/// 에러 태그를 붙인 대체 이벤트를 [`DecodeFailure`]에 실어 반환합니다.
pub trait Codec: Send + Sync {
    /// 코덱 타입 이름
    fn name(&self) -> &str;

    /// 원시 데이터를 이벤트로 변환합니다.
    ///
    /// `extra`는 입력이 덧붙이는 필드(호스트명, 경로 등), `tags`는 추가 태그입니다.
    fn decode(
        &self,
        data: &[u8],
        extra: Option<&Map<String, Value>>,
        tags: &[String],
    ) -> std::result::Result<Vec<LogEvent>, DecodeFailure>;

    /// 이벤트를 원시 데이터로 변환합니다.
    fn encode(&self, event: &LogEvent) -> std::result::Result<Bytes, CodecError>;
}

/// 디코딩 결과를 채널로 보냅니다. 보낸 이벤트 수를 반환합니다.
///
/// 디코딩 실패는 에러 로그와 함께 대체 이벤트로 전달됩니다.
/// 채널이 닫혔을 때만 에러를 반환합니다.
pub async fn decode_to(
    codec: &dyn Codec,
    data: &[u8],
    extra: Option<&Map<String, Value>>,
    tags: &[String],
    tx: &mpsc::Sender<LogEvent>,
) -> Result<usize> {
    let events = match codec.decode(data, extra, tags) {
        Ok(events) => events,
        Err(failure) => {
            error!(codec = %failure.codec, error = %failure.reason, "decode failed, forwarding raw message");
            metrics::counter!(m::CODEC_DECODE_ERRORS_TOTAL, m::LABEL_CODEC => codec.name().to_owned())
                .increment(1);
            vec![*failure.fallback]
        }
    };

    let count = events.len();
    for event in events {
        tx.send(event)
            .await
            .map_err(|e| PipelineError::ChannelSend(e.to_string()))?;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ERROR_TAG_DECODE;
    use serde_json::json;

    struct Tagger(&'static str);

    impl Filter for Tagger {
        fn name(&self) -> &str {
            self.0
        }
        fn apply(&self, mut event: LogEvent) -> Option<LogEvent> {
            event.add_tag([self.0]);
            Some(event)
        }
    }

    struct Dropper;

    impl Filter for Dropper {
        fn name(&self) -> &str {
            "drop"
        }
        fn apply(&self, _event: LogEvent) -> Option<LogEvent> {
            None
        }
    }

    struct Lines;

    impl Codec for Lines {
        fn name(&self) -> &str {
            "lines"
        }
        fn decode(
            &self,
            data: &[u8],
            _extra: Option<&Map<String, Value>>,
            tags: &[String],
        ) -> std::result::Result<Vec<LogEvent>, DecodeFailure> {
            let text = String::from_utf8_lossy(data);
            if text.starts_with('!') {
                let mut fallback = LogEvent::with_message(text.to_string());
                fallback.add_tag([ERROR_TAG_DECODE]);
                return Err(DecodeFailure {
                    codec: "lines".to_owned(),
                    reason: "bang".to_owned(),
                    fallback: Box::new(fallback),
                });
            }
            Ok(text
                .lines()
                .map(|l| {
                    let mut e = LogEvent::with_message(l);
                    e.add_tag(tags);
                    e
                })
                .collect())
        }
        fn encode(&self, event: &LogEvent) -> std::result::Result<Bytes, CodecError> {
            Ok(Bytes::from(event.message.clone()))
        }
    }

    #[test]
    fn chain_runs_in_order() {
        let chain: Vec<Box<dyn Filter>> =
            vec![Box::new(Tagger("a")), Box::new(Tagger("b")), Box::new(Tagger("c"))];
        let event = apply_chain(&chain, LogEvent::new()).unwrap();
        assert_eq!(event.tags, vec!["a", "b", "c"]);
    }

    #[test]
    fn chain_stops_at_drop() {
        let chain: Vec<Box<dyn Filter>> =
            vec![Box::new(Tagger("a")), Box::new(Dropper), Box::new(Tagger("c"))];
        assert!(apply_chain(&chain, LogEvent::new()).is_none());
    }

    #[test]
    fn common_options_apply_after_success() {
        let common: CommonFilterConfig = serde_json::from_value(json!({
            "add_tag": ["seen-%{user}"],
            "add_field": {"copy": "%{user}", "n": 1},
            "remove_field": ["secret"],
        }))
        .unwrap();
        let filter = CommonFilter::wrap(Box::new(Tagger("t")), common);

        let mut event = LogEvent::new();
        event.set_value("user", "lee");
        event.set_value("secret", "pw");
        let event = filter.apply(event).unwrap();

        assert_eq!(event.tags, vec!["t", "seen-lee"]);
        assert_eq!(event.get("copy"), Some(json!("lee")));
        assert_eq!(event.get("n"), Some(json!(1)));
        assert_eq!(event.get("secret"), None);
    }

    #[test]
    fn common_options_skip_dropped_events() {
        let common = CommonFilterConfig {
            add_tag: vec!["x".to_owned()],
            ..Default::default()
        };
        let filter = CommonFilter::wrap(Box::new(Dropper), common);
        assert!(filter.apply(LogEvent::new()).is_none());
    }

    #[tokio::test]
    async fn decode_to_forwards_fallback_on_failure() {
        let (tx, mut rx) = mpsc::channel(4);
        let sent = decode_to(&Lines, b"!oops", None, &[], &tx).await.unwrap();
        assert_eq!(sent, 1);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.message, "!oops");
        assert_eq!(event.tags, vec![ERROR_TAG_DECODE]);
    }

    #[tokio::test]
    async fn decode_to_reports_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let err = decode_to(&Lines, b"a", None, &[], &tx).await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::LogshipError::Pipeline(PipelineError::ChannelSend(_))
        ));
    }
}
