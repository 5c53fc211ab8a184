//! 기본 코덱 -- 원시 바이트와 [`LogEvent`] 사이의 변환
//!
//! - [`PlainCodec`] (`default`): 한 줄 → `message`
//! - [`JsonCodec`] (`json`): JSON 객체 → 평탄화된 이벤트
//!
//! 두 코덱 모두 입력이 넘긴 `extra` 필드와 태그를 디코딩된 이벤트에 합칩니다.

mod json;
mod plain;

use std::sync::Arc;

use serde_json::{Map, Value};

use logship_core::error::PluginError;
use logship_core::event::{ERROR_TAG_DECODE, LogEvent};
use logship_core::registry::PluginRegistry;
use logship_core::{Codec, decode_plugin_config};

pub use json::JsonCodec;
pub use plain::{PlainCodec, PlainCodecConfig};

/// 코덱 기본 타입
pub const DEFAULT_CODEC: &str = "default";

/// 기본 코덱을 레지스트리에 등록합니다.
pub fn register(registry: &mut PluginRegistry) -> Result<(), PluginError> {
    registry.register_codec(plain::NAME, |raw| {
        let config: PlainCodecConfig = decode_plugin_config(plain::NAME, raw)?;
        let codec: Arc<dyn Codec> = Arc::new(PlainCodec::new(config));
        Ok(codec)
    })?;
    registry.register_codec(json::NAME, |_raw| {
        let codec: Arc<dyn Codec> = Arc::new(JsonCodec);
        Ok(codec)
    })?;
    Ok(())
}

/// 입력이 넘긴 추가 필드와 태그를 이벤트에 합칩니다.
///
/// 이벤트에 이미 있는 필드는 덮어쓰지 않습니다.
pub(crate) fn merge_input_fields(
    event: &mut LogEvent,
    extra: Option<&Map<String, Value>>,
    tags: &[String],
) {
    if let Some(extra) = extra {
        for (key, value) in extra {
            if !event.extra.contains_key(key) {
                event.extra.insert(key.clone(), value.clone());
            }
        }
    }
    event.add_tag(tags);
}

/// 디코딩 실패 시 원본을 메시지로 담은 대체 이벤트를 만듭니다.
pub(crate) fn fallback_event(
    data: &[u8],
    extra: Option<&Map<String, Value>>,
    tags: &[String],
) -> LogEvent {
    let mut event = LogEvent::with_message(String::from_utf8_lossy(data).trim_end());
    merge_input_fields(&mut event, extra, tags);
    event.add_tag([ERROR_TAG_DECODE]);
    event
}
