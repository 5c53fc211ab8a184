use bytes::Bytes;
use serde::Deserialize;
use serde_json::{Map, Value};

use logship_core::error::{CodecError, DecodeFailure};
use logship_core::{Codec, LogEvent};

use super::merge_input_fields;

pub(super) const NAME: &str = "default";

/// 평문 코덱 설정
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlainCodecConfig {
    /// 인코딩 템플릿 (없으면 `message` 그대로)
    pub format: Option<String>,
}

/// 평문 코덱: 데이터 전체를 `message`로, 인코딩 시 메시지나 템플릿 결과를 출력합니다.
#[derive(Debug, Clone, Default)]
pub struct PlainCodec {
    format: Option<String>,
}

impl PlainCodec {
    pub fn new(config: PlainCodecConfig) -> Self {
        Self {
            format: config.format,
        }
    }
}

impl Codec for PlainCodec {
    fn name(&self) -> &str {
        NAME
    }

    fn decode(
        &self,
        data: &[u8],
        extra: Option<&Map<String, Value>>,
        tags: &[String],
    ) -> Result<Vec<LogEvent>, DecodeFailure> {
        let text = String::from_utf8_lossy(data);
        let mut event = LogEvent::with_message(text.trim_end_matches(['\r', '\n']));
        merge_input_fields(&mut event, extra, tags);
        Ok(vec![event])
    }

    fn encode(&self, event: &LogEvent) -> Result<Bytes, CodecError> {
        let text = match &self.format {
            Some(format) => event.format(format),
            None => event.message.clone(),
        };
        Ok(Bytes::from(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_strips_line_ending() {
        let codec = PlainCodec::default();
        let events = codec.decode(b"hello world\r\n", None, &[]).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message, "hello world");
    }

    #[test]
    fn decode_merges_input_fields() {
        let codec = PlainCodec::default();
        let mut extra = Map::new();
        extra.insert("host".to_owned(), json!("web-01"));
        let events = codec.decode(b"x", Some(&extra), &["stdin".to_owned()]).unwrap();
        assert_eq!(events[0].get_string("host"), "web-01");
        assert_eq!(events[0].tags, vec!["stdin"]);
    }

    #[test]
    fn decode_keeps_invalid_utf8() {
        let codec = PlainCodec::default();
        let events = codec.decode(&[0x66, 0xff, 0x6f], None, &[]).unwrap();
        assert_eq!(events[0].message, "f\u{fffd}o");
    }

    #[test]
    fn encode_uses_template() {
        let codec = PlainCodec::new(PlainCodecConfig {
            format: Some("[%{level}] %{message}".to_owned()),
        });
        let mut event = LogEvent::with_message("boom");
        event.set_value("level", "error");
        assert_eq!(codec.encode(&event).unwrap(), Bytes::from("[error] boom"));
        assert_eq!(
            PlainCodec::default().encode(&event).unwrap(),
            Bytes::from("boom")
        );
    }
}
