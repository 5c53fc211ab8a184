use serde::Deserialize;

use logship_core::error::Result;
use logship_core::plugin::apply_chain;
use logship_core::{ConfigRaw, Filter, LogEvent, PluginContext, decode_plugin_config};

use super::expr::Expr;

pub(super) const NAME: &str = "cond";

/// cond 필터 설정
#[derive(Debug, Clone, Deserialize)]
pub struct CondConfig {
    /// 조건식
    pub condition: String,
    /// 조건이 참일 때 실행할 필터 체인
    #[serde(default)]
    pub filter: Vec<ConfigRaw>,
    /// 조건이 거짓일 때 실행할 필터 체인
    #[serde(default)]
    pub else_filter: Vec<ConfigRaw>,
}

/// 조건에 따라 두 하위 체인 중 하나를 실행하는 필터
///
/// 하위 체인에서 이벤트가 폐기되면 cond 필터도 이벤트를 폐기합니다.
pub struct CondFilter {
    condition: Expr,
    then_chain: Vec<Box<dyn Filter>>,
    else_chain: Vec<Box<dyn Filter>>,
}

impl CondFilter {
    pub fn from_config(ctx: &PluginContext, raw: &ConfigRaw) -> Result<Self> {
        let config: CondConfig = decode_plugin_config(NAME, raw)?;
        let condition = Expr::parse(&config.condition)?;
        Ok(Self {
            condition,
            then_chain: ctx.registry.filter_chain(ctx, &config.filter)?,
            else_chain: ctx.registry.filter_chain(ctx, &config.else_filter)?,
        })
    }
}

impl Filter for CondFilter {
    fn name(&self) -> &str {
        NAME
    }

    fn apply(&self, event: LogEvent) -> Option<LogEvent> {
        if self.condition.eval(&event) {
            apply_chain(&self.then_chain, event)
        } else {
            apply_chain(&self.else_chain, event)
        }
    }
}
