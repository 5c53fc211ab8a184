//! 에러 타입 -- 도메인별 에러 정의
//!
//! 이벤트 자체의 연산(필드 접근, 템플릿, 태그)은 에러를 발생시키지 않습니다.
//! 잘못된 입력은 "원본 메시지 + 에러 태그"로 강등되며, 여기 정의된 에러는
//! 설정/플러그인 생성/채널/코덱 경계에서만 사용됩니다.

use crate::event::LogEvent;

/// logship 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LogshipError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 플러그인 등록/생성 에러
    #[error("plugin error: {0}")]
    Plugin(#[from] PluginError),

    /// 코덱 에러
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// 재시도 큐 에러
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 직렬화 에러
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LogshipError {
    /// 취소(정상 종료 경로)로 인한 에러인지 확인합니다.
    ///
    /// 취소는 사용자에게 실패로 보고되지 않습니다.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Queue(QueueError::Cancelled))
    }
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// 필수 필드 누락
    #[error("missing required field '{field}'")]
    MissingField { field: String },
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 이미 시작된 파이프라인을 다시 시작
    #[error("pipeline already started")]
    AlreadyStarted,

    /// 시작되지 않은 파이프라인에 대한 요청
    #[error("pipeline not started")]
    NotStarted,

    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),

    /// 채널이 닫힘
    #[error("channel closed: {0}")]
    ChannelClosed(String),

    /// 스테이지 태스크 실패
    #[error("stage '{stage}' failed: {reason}")]
    StageFailed { stage: String, reason: String },
}

/// 플러그인 등록/생성 에러
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// 레지스트리에 없는 타입
    #[error("unknown {kind} type: {name}")]
    UnknownType { kind: String, name: String },

    /// 같은 이름이 이미 등록됨
    #[error("{kind} plugin already registered: {name}")]
    AlreadyRegistered { kind: String, name: String },

    /// 플러그인 설정 오류
    #[error("invalid config for plugin '{plugin}': {reason}")]
    InvalidConfig { plugin: String, reason: String },
}

/// 코덱 에러
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// 인코딩 실패
    #[error("encode failed ({codec}): {reason}")]
    Encode { codec: String, reason: String },

    /// 디코딩 실패
    #[error(transparent)]
    Decode(#[from] DecodeFailure),
}

/// 디코딩 실패 -- 최선의 노력으로 만든 대체 이벤트를 함께 담습니다.
///
/// 파싱할 수 없는 입력도 데이터가 유실되지 않도록 원본을 `message`로,
/// 에러 태그를 붙인 이벤트로 흘려보내야 합니다.
#[derive(Debug, thiserror::Error)]
#[error("decode failed ({codec}): {reason}")]
pub struct DecodeFailure {
    /// 코덱 이름
    pub codec: String,
    /// 실패 사유
    pub reason: String,
    /// 원본 데이터를 담은 대체 이벤트
    pub fallback: Box<LogEvent>,
}

/// 재시도 큐 에러
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// 대기 중 컨텍스트가 취소됨
    #[error("queue operation cancelled")]
    Cancelled,

    /// 백그라운드 루프가 종료되어 큐가 닫힘
    #[error("queue closed")]
    Closed,
}

/// 크레이트 전역 Result 별칭
pub type Result<T, E = LogshipError> = std::result::Result<T, E>;
