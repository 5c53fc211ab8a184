//! 기본 출력 플러그인
//!
//! - [`StdoutOutput`] (`stdout`): 코덱으로 인코딩한 줄을 표준 출력에 기록
//! - [`FileSink`] (`file`): 템플릿 경로의 파일에 줄을 덧붙임. 재시도 큐를 거쳐
//!   실패한 항목을 보관하고 백프레셔를 요청합니다.

mod file;
mod stdout;

use logship_core::error::PluginError;
use logship_core::registry::PluginRegistry;
use logship_core::{Output, decode_plugin_config};

use crate::codec::DEFAULT_CODEC;
use crate::queue::RetryOutput;

pub use file::{FileConfig, FileSink};
pub use stdout::StdoutOutput;

/// 기본 출력을 레지스트리에 등록합니다.
pub fn register(registry: &mut PluginRegistry) -> Result<(), PluginError> {
    registry.register_output(stdout::NAME, |ctx, raw| {
        let codec = ctx.registry.build_codec(raw.get("codec"), DEFAULT_CODEC)?;
        let output: Box<dyn Output> = Box::new(StdoutOutput::new(codec, tokio::io::stdout()));
        Ok(output)
    })?;
    registry.register_output(file::NAME, |ctx, raw| {
        let config: FileConfig = decode_plugin_config(file::NAME, raw)?;
        let codec = ctx.registry.build_codec(raw.get("codec"), DEFAULT_CODEC)?;
        let retry = config.retry_config();
        let sink = FileSink::new(config, codec)?;
        let output: Box<dyn Output> = Box::new(RetryOutput::new(
            sink,
            retry,
            ctx.control.clone(),
            ctx.cancel.child_token(),
        ));
        Ok(output)
    })?;
    Ok(())
}
