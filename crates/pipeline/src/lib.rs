#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`pipeline`]: 입력 → 필터 → 출력 단계 연결과 생명주기 관리
//! - [`queue`]: 출력 앞단의 재시도 큐 (at-least-once, 백프레셔 요청)
//! - [`codec`]: `default`(평문), `json` 코덱
//! - [`input`]: `stdin`, `generator` 입력과 일시정지 게이트
//! - [`filter`]: `add_field`, `remove_field`, `add_tag`, `drop`, `cond`, `discard` 필터
//! - [`output`]: `stdout`, `file` 출력
//! - [`builtin`]: 기본 플러그인 일괄 등록
//! - [`error`]: 스테이지 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! Inputs -> chIn -> FilterChain(xN) -> chFilterOut -> FanOut -> Outputs
//!   ^                                                             |
//!   +------------------ Control (pause/resume) <-- RetryQueue <---+
//! ```

pub mod builtin;
pub mod codec;
pub mod error;
pub mod filter;
pub mod input;
pub mod output;
pub mod pipeline;
pub mod queue;

pub use builtin::{builtin_registry, register_builtins};
pub use error::StageError;
pub use pipeline::{Pipeline, PipelineState};
pub use queue::{QueueItem, QueueState, RetryConfig, RetryOutput, RetryQueue, RetrySink};
