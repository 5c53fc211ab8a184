//! 이벤트 모델 -- 파이프라인을 흐르는 기본 데이터 단위
//!
//! [`LogEvent`]는 타임스탬프, 메시지, 태그, 그리고 자유 형식의 `extra` 필드 맵으로
//! 구성된 구조화된 로그 레코드입니다. 입력/코덱이 생성하고, 필터가 제자리에서
//! 변형하며, 출력/코덱이 직렬화하여 소비합니다.
//!
//! # 직렬화 형식
//! ```text
//! {"@timestamp":"2024-01-15T12:00:00.000000000Z","message":"hello","tags":["a"],"foo":"bar"}
//! ```
//! - `@timestamp`는 항상 포함 (RFC3339, 나노초, UTC)
//! - `message`, `tags`는 비어있지 않을 때만 포함
//! - `extra` 키는 최상위에 평탄하게 포함 (`extra` 래퍼 없음)
//!
//! # 실패 의미론
//! 이벤트 연산은 에러를 발생시키지 않습니다. 조회 실패는 `None`/빈 문자열,
//! 설정 실패는 `false`로 보고됩니다.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

use crate::path;
use crate::template;

/// 타임스탬프 예약 필드명
pub const FIELD_TIMESTAMP: &str = "@timestamp";
/// 메시지 예약 필드명
pub const FIELD_MESSAGE: &str = "message";
/// 태그 예약 필드명
pub const FIELD_TAGS: &str = "tags";

/// 코덱 디코딩 실패 시 붙는 태그
pub const ERROR_TAG_DECODE: &str = "_logship_decode_error";
/// 필터 처리 실패 시 붙는 태그
pub const ERROR_TAG_FILTER: &str = "_logship_filter_error";
/// `tags` 필드 형식 오류 시 붙는 태그
pub const ERROR_TAG_TAGS: &str = "_logship_tags_error";
/// `@timestamp` 필드 형식 오류 시 붙는 태그
pub const ERROR_TAG_TIMESTAMP: &str = "_logship_timestamp_error";

/// 형식이 잘못된 `tags` 원본 값을 보존하는 필드명
pub const FIELD_TAGS_RAW: &str = "_tags_raw";
/// 형식이 잘못된 `@timestamp` 원본 값을 보존하는 필드명
pub const FIELD_TIMESTAMP_RAW: &str = "_timestamp_raw";

/// 구조화된 로그 이벤트
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    /// 이벤트 시각 (출력 시 UTC)
    pub timestamp: DateTime<Utc>,
    /// 로그 메시지 (비어있을 수 있음)
    pub message: String,
    /// 중복 없는 태그 목록 (최초 삽입 순서 유지)
    pub tags: Vec<String>,
    /// 추가 필드
    pub extra: Map<String, Value>,
}

impl Default for LogEvent {
    fn default() -> Self {
        Self::new()
    }
}

impl LogEvent {
    /// 현재 시각으로 빈 이벤트를 생성합니다.
    pub fn new() -> Self {
        Self {
            timestamp: Utc::now(),
            message: String::new(),
            tags: Vec::new(),
            extra: Map::new(),
        }
    }

    /// 메시지를 가진 이벤트를 생성합니다.
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::new()
        }
    }

    /// 추가 필드를 지정합니다.
    pub fn with_extra(mut self, extra: Map<String, Value>) -> Self {
        self.extra = extra;
        self
    }

    /// 필드 값을 조회합니다.
    ///
    /// `@timestamp`, `message`, `tags`는 예약 필드로 처리하고,
    /// 나머지는 `extra`의 중첩 경로로 해석합니다.
    pub fn get(&self, field: &str) -> Option<Value> {
        match field {
            FIELD_TIMESTAMP => Some(Value::String(self.timestamp_string())),
            FIELD_MESSAGE => Some(Value::String(self.message.clone())),
            FIELD_TAGS => Some(Value::Array(
                self.tags.iter().cloned().map(Value::String).collect(),
            )),
            _ => self.get_extra(field).cloned(),
        }
    }

    /// `extra`의 중첩 경로 값을 참조로 조회합니다.
    pub fn get_extra(&self, field: &str) -> Option<&Value> {
        path::get(&self.extra, &path::parse(field))
    }

    /// 필드 값을 문자열로 조회합니다. 없는 필드는 빈 문자열입니다.
    pub fn get_string(&self, field: &str) -> String {
        match field {
            FIELD_MESSAGE => self.message.clone(),
            FIELD_TIMESTAMP => self.timestamp_string(),
            _ => self.get(field).map(|v| value_to_string(&v)).unwrap_or_default(),
        }
    }

    /// 필드 값을 설정합니다.
    ///
    /// 중간 매핑은 자동 생성되며, 중간 세그먼트가 매핑이 아닌 값으로 이미
    /// 존재하면 덮어쓰지 않고 `false`를 반환합니다.
    pub fn set_value(&mut self, field: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        match field {
            FIELD_MESSAGE => {
                self.message = value_to_string(&value);
                true
            }
            FIELD_TIMESTAMP => match value.as_str().and_then(parse_timestamp) {
                Some(ts) => {
                    self.timestamp = ts;
                    true
                }
                None => false,
            },
            FIELD_TAGS => self.parse_tags(&value),
            _ => path::set(&mut self.extra, &path::parse(field), value),
        }
    }

    /// 필드를 제거하고 이전 값을 반환합니다. `@timestamp`는 제거할 수 없습니다.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        match field {
            FIELD_TIMESTAMP => None,
            FIELD_MESSAGE => {
                let old = std::mem::take(&mut self.message);
                (!old.is_empty()).then_some(Value::String(old))
            }
            FIELD_TAGS => {
                let old = std::mem::take(&mut self.tags);
                (!old.is_empty()).then(|| Value::Array(old.into_iter().map(Value::String).collect()))
            }
            _ => path::remove(&mut self.extra, &path::parse(field)),
        }
    }

    /// 태그를 추가합니다.
    ///
    /// 각 태그는 템플릿 치환을 거친 뒤, 이미 존재하지 않을 때만 추가됩니다.
    pub fn add_tag<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for tag in tags {
            let tag = self.format(tag.as_ref());
            if !tag.is_empty() && !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }
    }

    /// 태그를 제거합니다. 템플릿 치환 후 일치하는 태그를 지웁니다.
    pub fn remove_tag<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for tag in tags {
            let tag = self.format(tag.as_ref());
            self.tags.retain(|t| *t != tag);
        }
    }

    /// 태그 목록을 통째로 교체합니다.
    ///
    /// 모든 원소가 문자열인 시퀀스만 허용합니다. 혼합/비정상 타입이면
    /// 기존 태그를 유지하고 `false`를 반환합니다 (호출자는 경고 후 계속 진행).
    pub fn parse_tags(&mut self, value: &Value) -> bool {
        let Value::Array(items) = value else {
            return false;
        };
        let mut tags = Vec::with_capacity(items.len());
        for item in items {
            let Value::String(tag) = item else {
                return false;
            };
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }
        self.tags = tags;
        true
    }

    /// 템플릿 문자열을 이 이벤트 기준으로 치환합니다.
    ///
    /// 적용 순서: `%{+@fmt}` (이벤트 시각) → `%{+fmt}` (현재 시각)
    /// → `%{field}` (이벤트 필드) → `%{ENV}` (환경변수).
    /// 해석되지 않은 자리표시자는 그대로 남습니다.
    pub fn format(&self, template: &str) -> String {
        template::format_event(self, template)
    }

    /// RFC3339 나노초 UTC 형식의 타임스탬프 문자열
    pub fn timestamp_string(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
    }

    /// 정규 JSON 문자열로 직렬화합니다.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// 평탄한 JSON 객체에서 이벤트를 복원합니다.
    ///
    /// 예약 필드의 형식이 잘못되어도 실패하지 않습니다. 잘못된 `@timestamp`는
    /// 현재 시각으로 대체되고 원래 값은 [`FIELD_TIMESTAMP_RAW`]에, 잘못된 `tags`의
    /// 원래 값은 [`FIELD_TAGS_RAW`]에 보존되어 다시 직렬화할 때도 남습니다.
    pub fn from_map(mut map: Map<String, Value>) -> Self {
        let mut event = Self::new();
        let raw_timestamp = map.remove(FIELD_TIMESTAMP);
        if let Some(message) = map.remove(FIELD_MESSAGE) {
            event.message = value_to_string(&message);
        }
        let raw_tags = map.remove(FIELD_TAGS);
        event.extra = map;

        if let Some(ts) = raw_timestamp {
            match ts.as_str().and_then(parse_timestamp) {
                Some(parsed) => event.timestamp = parsed,
                None => {
                    event.extra.insert(FIELD_TIMESTAMP_RAW.to_owned(), ts);
                    event.add_tag([ERROR_TAG_TIMESTAMP]);
                }
            }
        }
        if let Some(tags) = raw_tags {
            if !event.parse_tags(&tags) {
                event.extra.insert(FIELD_TAGS_RAW.to_owned(), tags);
                event.add_tag([ERROR_TAG_TAGS]);
            }
        }
        event
    }

    /// JSON 값에서 이벤트를 복원합니다. 최상위가 객체가 아니면 실패합니다.
    pub fn from_json_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

impl Serialize for LogEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry(FIELD_TIMESTAMP, &self.timestamp_string())?;
        if !self.message.is_empty() {
            map.serialize_entry(FIELD_MESSAGE, &self.message)?;
        }
        if !self.tags.is_empty() {
            map.serialize_entry(FIELD_TAGS, &self.tags)?;
        }
        for (key, value) in &self.extra {
            if matches!(key.as_str(), FIELD_TIMESTAMP | FIELD_MESSAGE | FIELD_TAGS) {
                continue;
            }
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for LogEvent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = Map::deserialize(deserializer)?;
        Ok(Self::from_map(map))
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LogEvent[{}] tags={:?} fields={} message={}",
            self.timestamp_string(),
            self.tags,
            self.extra.len(),
            self.message,
        )
    }
}

/// RFC3339 문자열을 UTC 시각으로 파싱합니다.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// 값을 기본 형식의 문자열로 변환합니다.
///
/// 문자열은 그대로, nil은 빈 문자열, 숫자/불리언은 표기 그대로,
/// 매핑/시퀀스는 JSON 문자열이 됩니다.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}
