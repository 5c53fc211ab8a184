//! 기본 플러그인 일괄 등록

use logship_core::error::PluginError;
use logship_core::registry::PluginRegistry;

use crate::{codec, filter, input, output};

/// 기본 코덱/입력/필터/출력을 모두 등록합니다.
pub fn register_builtins(registry: &mut PluginRegistry) -> Result<(), PluginError> {
    codec::register(registry)?;
    input::register(registry)?;
    filter::register(registry)?;
    output::register(registry)?;
    Ok(())
}

/// 기본 플러그인이 등록된 레지스트리를 생성합니다.
pub fn builtin_registry() -> Result<PluginRegistry, PluginError> {
    let mut registry = PluginRegistry::new();
    register_builtins(&mut registry)?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use logship_core::PluginKind;

    #[test]
    fn all_builtins_registered() {
        let registry = builtin_registry().unwrap();
        assert_eq!(registry.names(PluginKind::Codec), vec!["default", "json"]);
        assert_eq!(registry.names(PluginKind::Input), vec!["generator", "stdin"]);
        assert_eq!(
            registry.names(PluginKind::Filter),
            vec!["add_field", "add_tag", "cond", "discard", "drop", "remove_field"]
        );
        assert_eq!(registry.names(PluginKind::Output), vec!["file", "stdout"]);
    }

    #[test]
    fn registering_twice_fails() {
        let mut registry = builtin_registry().unwrap();
        assert!(matches!(
            register_builtins(&mut registry),
            Err(PluginError::AlreadyRegistered { .. })
        ));
    }
}
