//! 기본 필터 플러그인
//!
//! | 타입 | 동작 |
//! |---|---|
//! | `add_field` | `key`에 `value`를 설정 (템플릿 치환) |
//! | `remove_field` | `fields` 목록의 필드 제거 |
//! | `add_tag` | `tags` 추가 |
//! | `drop` | 이벤트 폐기 |
//! | `cond` | 조건식에 따라 `filter` 또는 `else_filter` 체인 실행 |
//! | `discard` | 백프레셔 중에 이벤트 폐기 |
//!
//! 모든 필터는 레지스트리가 덧붙이는 공통 옵션(`add_tag`, `remove_tag`,
//! `add_field`, `remove_field`)을 추가로 지원합니다.

mod add_field;
mod add_tag;
mod cond;
mod discard;
mod drop;
pub mod expr;
mod remove_field;

use logship_core::error::PluginError;
use logship_core::registry::PluginRegistry;
use logship_core::{Filter, decode_plugin_config};

pub use add_field::{AddFieldConfig, AddFieldFilter};
pub use add_tag::{AddTagConfig, AddTagFilter};
pub use cond::{CondConfig, CondFilter};
pub use discard::DiscardFilter;
pub use drop::DropFilter;
pub use remove_field::{RemoveFieldConfig, RemoveFieldFilter};

/// 기본 필터를 레지스트리에 등록합니다.
pub fn register(registry: &mut PluginRegistry) -> Result<(), PluginError> {
    registry.register_filter(add_field::NAME, |_ctx, raw| {
        let config: AddFieldConfig = decode_plugin_config(add_field::NAME, raw)?;
        let filter: Box<dyn Filter> = Box::new(AddFieldFilter::new(config)?);
        Ok(filter)
    })?;
    registry.register_filter(remove_field::NAME, |_ctx, raw| {
        let config: RemoveFieldConfig = decode_plugin_config(remove_field::NAME, raw)?;
        let filter: Box<dyn Filter> = Box::new(RemoveFieldFilter::new(config));
        Ok(filter)
    })?;
    registry.register_filter(add_tag::NAME, |_ctx, raw| {
        let config: AddTagConfig = decode_plugin_config(add_tag::NAME, raw)?;
        let filter: Box<dyn Filter> = Box::new(AddTagFilter::new(config));
        Ok(filter)
    })?;
    registry.register_filter(drop::NAME, |_ctx, _raw| {
        let filter: Box<dyn Filter> = Box::new(DropFilter);
        Ok(filter)
    })?;
    registry.register_filter(cond::NAME, |ctx, raw| {
        let filter: Box<dyn Filter> = Box::new(CondFilter::from_config(ctx, raw)?);
        Ok(filter)
    })?;
    registry.register_filter(discard::NAME, |ctx, _raw| {
        let filter: Box<dyn Filter> = Box::new(DiscardFilter::new(ctx));
        Ok(filter)
    })?;
    Ok(())
}
