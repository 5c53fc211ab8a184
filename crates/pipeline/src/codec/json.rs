use bytes::Bytes;
use serde_json::{Map, Value};

use logship_core::error::{CodecError, DecodeFailure};
use logship_core::{Codec, LogEvent};

use super::{fallback_event, merge_input_fields};

pub(super) const NAME: &str = "json";

/// JSON 코덱
///
/// 객체 하나는 이벤트 하나, 객체 배열은 원소마다 이벤트 하나가 됩니다.
/// 그 외의 값이나 파싱 실패는 원본을 메시지로 담은 대체 이벤트로 보고합니다.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    fn failure(
        data: &[u8],
        extra: Option<&Map<String, Value>>,
        tags: &[String],
        reason: String,
    ) -> DecodeFailure {
        DecodeFailure {
            codec: NAME.to_owned(),
            reason,
            fallback: Box::new(fallback_event(data, extra, tags)),
        }
    }
}

impl Codec for JsonCodec {
    fn name(&self) -> &str {
        NAME
    }

    fn decode(
        &self,
        data: &[u8],
        extra: Option<&Map<String, Value>>,
        tags: &[String],
    ) -> Result<Vec<LogEvent>, DecodeFailure> {
        let value: Value = serde_json::from_slice(data)
            .map_err(|e| Self::failure(data, extra, tags, e.to_string()))?;

        let objects = match value {
            Value::Object(map) => vec![map],
            Value::Array(items) if items.iter().all(Value::is_object) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect(),
            other => {
                let reason = format!("expected JSON object, got {}", kind(&other));
                return Err(Self::failure(data, extra, tags, reason));
            }
        };

        Ok(objects
            .into_iter()
            .map(|map| {
                let mut event = LogEvent::from_map(map);
                merge_input_fields(&mut event, extra, tags);
                event
            })
            .collect())
    }

    fn encode(&self, event: &LogEvent) -> Result<Bytes, CodecError> {
        serde_json::to_vec(event)
            .map(Bytes::from)
            .map_err(|e| CodecError::Encode {
                codec: NAME.to_owned(),
                reason: e.to_string(),
            })
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
