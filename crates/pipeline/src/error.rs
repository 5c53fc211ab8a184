//! 파이프라인 스테이지 에러 타입
//!
//! [`StageError`]는 기본 플러그인과 스테이지 태스크에서 발생하는 에러를 표현합니다.
//! `From<StageError> for LogshipError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use logship_core::error::{LogshipError, PipelineError, PluginError};

/// 스테이지/기본 플러그인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// 조건식 파싱 실패
    #[error("expression error at offset {offset}: {reason}")]
    Expression {
        /// 실패 위치 (문자 오프셋)
        offset: usize,
        /// 실패 사유
        reason: String,
    },

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    /// 입력 플러그인 실행 에러
    #[error("input error: {plugin}: {reason}")]
    Input {
        /// 입력 타입
        plugin: String,
        /// 에러 사유
        reason: String,
    },

    /// 출력 플러그인 전달 에러
    #[error("output error: {plugin}: {reason}")]
    Output {
        /// 출력 타입
        plugin: String,
        /// 에러 사유
        reason: String,
    },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StageError> for LogshipError {
    fn from(err: StageError) -> Self {
        match err {
            StageError::Io(e) => LogshipError::Io(e),
            StageError::Expression { .. } | StageError::Regex(_) => {
                LogshipError::Plugin(PluginError::InvalidConfig {
                    plugin: "cond".to_owned(),
                    reason: err.to_string(),
                })
            }
            StageError::Input { ref plugin, .. } | StageError::Output { ref plugin, .. } => {
                LogshipError::Pipeline(PipelineError::StageFailed {
                    stage: plugin.clone(),
                    reason: err.to_string(),
                })
            }
        }
    }
}
