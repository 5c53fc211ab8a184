//! 플러그인 레지스트리 -- `type` 이름에서 생성자로의 매핑
//!
//! 전역 상태 없이 프로세스 시작 시 한 번 만들어 파이프라인과 플러그인 생성자에
//! 참조로 전달합니다. 같은 이름을 두 번 등록하면 에러입니다.
//!
//! # 사용 예시
//! ```ignore
//! let mut registry = PluginRegistry::new();
//! registry.register_filter("noop", |_ctx, _raw| Ok(Box::new(Noop)))?;
//! let registry = Arc::new(registry);
//!
//! let ctx = PluginContext::new(control, Arc::clone(&registry), cancel.child_token());
//! let filters = registry.filter_chain(&ctx, &config.filter)?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::config::{ConfigRaw, decode_plugin_config, plugin_type};
use crate::error::{PluginError, Result};
use crate::plugin::{Codec, CommonFilter, CommonFilterConfig, Filter, Input, Output, PluginContext};

/// 입력 생성자
pub type InputFactory =
    Arc<dyn Fn(&PluginContext, &ConfigRaw) -> Result<Box<dyn Input>> + Send + Sync>;
/// 필터 생성자
pub type FilterFactory =
    Arc<dyn Fn(&PluginContext, &ConfigRaw) -> Result<Box<dyn Filter>> + Send + Sync>;
/// 출력 생성자
pub type OutputFactory =
    Arc<dyn Fn(&PluginContext, &ConfigRaw) -> Result<Box<dyn Output>> + Send + Sync>;
/// 코덱 생성자
pub type CodecFactory = Arc<dyn Fn(&ConfigRaw) -> Result<Arc<dyn Codec>> + Send + Sync>;

/// 플러그인 종류 (에러 메시지용)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginKind {
    Input,
    Filter,
    Output,
    Codec,
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Filter => write!(f, "filter"),
            Self::Output => write!(f, "output"),
            Self::Codec => write!(f, "codec"),
        }
    }
}

/// 플러그인 레지스트리
#[derive(Default)]
pub struct PluginRegistry {
    inputs: HashMap<String, InputFactory>,
    filters: HashMap<String, FilterFactory>,
    outputs: HashMap<String, OutputFactory>,
    codecs: HashMap<String, CodecFactory>,
}

fn insert_unique<F>(
    map: &mut HashMap<String, F>,
    kind: PluginKind,
    name: &str,
    factory: F,
) -> Result<(), PluginError> {
    if map.contains_key(name) {
        return Err(PluginError::AlreadyRegistered {
            kind: kind.to_string(),
            name: name.to_owned(),
        });
    }
    map.insert(name.to_owned(), factory);
    Ok(())
}

fn lookup<'a, F>(
    map: &'a HashMap<String, F>,
    kind: PluginKind,
    raw: &ConfigRaw,
) -> Result<(&'a str, &'a F), PluginError> {
    let name = plugin_type(raw).unwrap_or_default();
    map.get_key_value(name)
        .map(|(k, f)| (k.as_str(), f))
        .ok_or_else(|| PluginError::UnknownType {
            kind: kind.to_string(),
            name: name.to_owned(),
        })
}

impl PluginRegistry {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 입력 타입을 등록합니다.
    pub fn register_input<F>(&mut self, name: &str, factory: F) -> Result<(), PluginError>
    where
        F: Fn(&PluginContext, &ConfigRaw) -> Result<Box<dyn Input>> + Send + Sync + 'static,
    {
        let factory: InputFactory = Arc::new(factory);
        insert_unique(&mut self.inputs, PluginKind::Input, name, factory)
    }

    /// 필터 타입을 등록합니다.
    pub fn register_filter<F>(&mut self, name: &str, factory: F) -> Result<(), PluginError>
    where
        F: Fn(&PluginContext, &ConfigRaw) -> Result<Box<dyn Filter>> + Send + Sync + 'static,
    {
        let factory: FilterFactory = Arc::new(factory);
        insert_unique(&mut self.filters, PluginKind::Filter, name, factory)
    }

    /// 출력 타입을 등록합니다.
    pub fn register_output<F>(&mut self, name: &str, factory: F) -> Result<(), PluginError>
    where
        F: Fn(&PluginContext, &ConfigRaw) -> Result<Box<dyn Output>> + Send + Sync + 'static,
    {
        let factory: OutputFactory = Arc::new(factory);
        insert_unique(&mut self.outputs, PluginKind::Output, name, factory)
    }

    /// 코덱 타입을 등록합니다.
    pub fn register_codec<F>(&mut self, name: &str, factory: F) -> Result<(), PluginError>
    where
        F: Fn(&ConfigRaw) -> Result<Arc<dyn Codec>> + Send + Sync + 'static,
    {
        let factory: CodecFactory = Arc::new(factory);
        insert_unique(&mut self.codecs, PluginKind::Codec, name, factory)
    }

    /// 설정의 `type`으로 입력을 생성합니다.
    pub fn build_input(&self, ctx: &PluginContext, raw: &ConfigRaw) -> Result<Box<dyn Input>> {
        let (_, factory) = lookup(&self.inputs, PluginKind::Input, raw)?;
        factory(ctx, raw)
    }

    /// 설정의 `type`으로 필터를 생성합니다.
    ///
    /// 공통 옵션(`add_tag`, `remove_tag`, `add_field`, `remove_field`)이 있으면 덧붙입니다.
    pub fn build_filter(&self, ctx: &PluginContext, raw: &ConfigRaw) -> Result<Box<dyn Filter>> {
        let (name, factory) = lookup(&self.filters, PluginKind::Filter, raw)?;
        let common: CommonFilterConfig = decode_plugin_config(name, raw)?;
        Ok(CommonFilter::wrap(factory(ctx, raw)?, common))
    }

    /// 설정의 `type`으로 출력을 생성합니다.
    pub fn build_output(&self, ctx: &PluginContext, raw: &ConfigRaw) -> Result<Box<dyn Output>> {
        let (_, factory) = lookup(&self.outputs, PluginKind::Output, raw)?;
        factory(ctx, raw)
    }

    /// 코덱을 생성합니다.
    ///
    /// - 설정 없음 → `default_type`
    /// - 문자열 (`codec: "json"`) → `{type: "json"}`과 동일
    /// - 객체 → `type`이 없으면 `default_type`
    pub fn build_codec(&self, raw: Option<&Value>, default_type: &str) -> Result<Arc<dyn Codec>> {
        let mut conf = match raw {
            None | Some(Value::Null) => Map::new(),
            Some(Value::String(name)) => with_type(Map::new(), name),
            Some(Value::Object(map)) => map.clone(),
            Some(other) => {
                return Err(PluginError::InvalidConfig {
                    plugin: "codec".to_owned(),
                    reason: format!("expected string or object, got {other}"),
                }
                .into());
            }
        };
        if plugin_type(&conf).is_none() {
            conf = with_type(conf, default_type);
        }
        let (_, factory) = lookup(&self.codecs, PluginKind::Codec, &conf)?;
        factory(&conf)
    }

    /// 필터 목록을 선언 순서대로 생성합니다. 하나라도 실패하면 전체가 실패합니다.
    pub fn filter_chain(
        &self,
        ctx: &PluginContext,
        raws: &[ConfigRaw],
    ) -> Result<Vec<Box<dyn Filter>>> {
        raws.iter().map(|raw| self.build_filter(ctx, raw)).collect()
    }

    /// 등록된 타입 이름 목록 (정렬됨)
    pub fn names(&self, kind: PluginKind) -> Vec<&str> {
        let mut names: Vec<&str> = match kind {
            PluginKind::Input => self.inputs.keys().map(String::as_str).collect(),
            PluginKind::Filter => self.filters.keys().map(String::as_str).collect(),
            PluginKind::Output => self.outputs.keys().map(String::as_str).collect(),
            PluginKind::Codec => self.codecs.keys().map(String::as_str).collect(),
        };
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("inputs", &self.names(PluginKind::Input))
            .field("filters", &self.names(PluginKind::Filter))
            .field("outputs", &self.names(PluginKind::Output))
            .field("codecs", &self.names(PluginKind::Codec))
            .finish()
    }
}

fn with_type(mut raw: ConfigRaw, name: &str) -> ConfigRaw {
    raw.insert("type".to_owned(), Value::String(name.to_owned()));
    raw
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::Control;
    use crate::error::{CodecError, DecodeFailure, LogshipError};
    use crate::event::LogEvent;
    use bytes::Bytes;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    struct Named(String);

    impl Filter for Named {
        fn name(&self) -> &str {
            &self.0
        }
        fn apply(&self, mut event: LogEvent) -> Option<LogEvent> {
            event.add_tag([self.0.as_str()]);
            Some(event)
        }
    }

    struct Plain(String);

    impl Codec for Plain {
        fn name(&self) -> &str {
            &self.0
        }
        fn decode(
            &self,
            data: &[u8],
            _extra: Option<&Map<String, Value>>,
            _tags: &[String],
        ) -> std::result::Result<Vec<LogEvent>, DecodeFailure> {
            Ok(vec![LogEvent::with_message(String::from_utf8_lossy(data))])
        }
        fn encode(&self, event: &LogEvent) -> std::result::Result<Bytes, CodecError> {
            Ok(Bytes::from(event.message.clone()))
        }
    }

    fn raw(value: Value) -> ConfigRaw {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn registry() -> PluginRegistry {
        let mut registry = PluginRegistry::new();
        registry
            .register_filter("named", |_ctx, raw| {
                let name = raw.get("label").and_then(Value::as_str).unwrap_or("x");
                Ok(Box::new(Named(name.to_owned())))
            })
            .unwrap();
        for codec in ["default", "json"] {
            registry
                .register_codec(codec, move |_raw| Ok(Arc::new(Plain(codec.to_owned()))))
                .unwrap();
        }
        registry
    }

    fn context(registry: PluginRegistry) -> (Arc<PluginRegistry>, PluginContext) {
        let registry = Arc::new(registry);
        let ctx = PluginContext::new(
            Arc::new(Control::new()),
            Arc::clone(&registry),
            CancellationToken::new(),
        );
        (registry, ctx)
    }

    #[test]
    fn duplicate_registration_is_error() {
        let mut registry = registry();
        let err = registry
            .register_filter("named", |_ctx, _raw| Ok(Box::new(Named("y".to_owned()))))
            .unwrap_err();
        assert!(matches!(err, PluginError::AlreadyRegistered { .. }));
    }

    #[test]
    fn unknown_type_is_error() {
        let (registry, ctx) = context(registry());
        let err = registry
            .build_filter(&ctx, &raw(json!({"type": "grok"})))
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "plugin error: unknown filter type: grok");

        let err = registry.build_output(&ctx, &raw(json!({}))).err().unwrap();
        assert!(matches!(
            err,
            LogshipError::Plugin(PluginError::UnknownType { .. })
        ));
    }

    #[test]
    fn filter_chain_keeps_declared_order() {
        let (registry, ctx) = context(registry());
        let chain = registry
            .filter_chain(
                &ctx,
                &[
                    raw(json!({"type": "named", "label": "a"})),
                    raw(json!({"type": "named", "label": "b", "add_tag": ["common"]})),
                ],
            )
            .unwrap();
        let event = crate::plugin::apply_chain(&chain, LogEvent::new()).unwrap();
        assert_eq!(event.tags, vec!["a", "b", "common"]);
    }

    #[test]
    fn codec_resolution_forms() {
        let registry = registry();
        assert_eq!(registry.build_codec(None, "default").unwrap().name(), "default");
        assert_eq!(
            registry.build_codec(Some(&json!("json")), "default").unwrap().name(),
            "json"
        );
        assert_eq!(
            registry.build_codec(Some(&json!({"type": "json"})), "default").unwrap().name(),
            "json"
        );
        assert_eq!(
            registry.build_codec(Some(&json!({"charset": "utf-8"})), "json").unwrap().name(),
            "json"
        );
        assert!(registry.build_codec(Some(&json!(5)), "default").is_err());
        assert!(registry.build_codec(Some(&json!("msgpack")), "default").is_err());
    }

    #[test]
    fn names_are_sorted() {
        let registry = registry();
        assert_eq!(registry.names(PluginKind::Codec), vec!["default", "json"]);
        assert!(registry.names(PluginKind::Input).is_empty());
    }
}
