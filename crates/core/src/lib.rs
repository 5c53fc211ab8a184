#![doc = include_str!("../README.md")]

pub mod config;
pub mod control;
pub mod error;
pub mod event;
pub mod metrics;
pub mod path;
pub mod plugin;
pub mod registry;
pub mod template;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 에러
pub use error::{
    CodecError, ConfigError, DecodeFailure, LogshipError, PipelineError, PluginError, QueueError,
};

// 설정
pub use config::{ConfigRaw, PipelineConfig, decode_plugin_config};

// 이벤트
pub use event::LogEvent;

// 백프레셔
pub use control::{Control, ControlState, PauseFlag, Pausable};

// 플러그인 trait
pub use plugin::{BoxFuture, Codec, Filter, Input, Output, PluginContext};

// 레지스트리
pub use registry::{PluginKind, PluginRegistry};
