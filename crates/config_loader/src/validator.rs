//! 配置校验模块
//!
//! 校验规则：
//! - `validator` 派生规则 (URL、范围、长度)
//! - memory 后端必须提供 fixtures 文件
//! - connectors.enabled 不可包含未知类型或重复项

use std::collections::HashSet;

use contracts::{BackendKind, ContractError, DispatchBlueprint};
use validator::Validate;

/// 校验 DispatchBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &DispatchBlueprint) -> Result<(), ContractError> {
    blueprint
        .validate()
        .map_err(|e| ContractError::config_validation("blueprint", e.to_string()))?;
    validate_fixtures(blueprint)?;
    validate_enabled_connectors(blueprint)?;
    Ok(())
}

/// memory 后端需要 fixtures 文件
fn validate_fixtures(blueprint: &DispatchBlueprint) -> Result<(), ContractError> {
    let backends = [
        ("repository.fixtures", blueprint.repository.kind, &blueprint.repository.fixtures),
        ("search.fixtures", blueprint.search.kind, &blueprint.search.fixtures),
    ];

    for (field, kind, fixtures) in backends {
        if kind == BackendKind::Memory && fixtures.is_none() {
            return Err(ContractError::config_validation(
                field,
                "memory backend requires a fixtures file",
            ));
        }
    }
    Ok(())
}

/// 校验启用的连接器
fn validate_enabled_connectors(blueprint: &DispatchBlueprint) -> Result<(), ContractError> {
    let enabled = &blueprint.connectors.enabled;
    if enabled.is_empty() {
        return Err(ContractError::config_validation(
            "connectors.enabled",
            "at least one connector must be enabled",
        ));
    }

    let mut seen = HashSet::new();
    for hook_type in enabled {
        if !hook_type.is_builtin() {
            return Err(ContractError::config_validation(
                "connectors.enabled",
                format!("unknown connector type '{hook_type}'"),
            ));
        }
        if !seen.insert(hook_type) {
            return Err(ContractError::config_validation(
                "connectors.enabled",
                format!("duplicate connector type '{hook_type}'"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        ConfigVersion, ConnectorSettings, EngineConfig, HookType, ObservabilitySettings,
        RepositoryConfig, SearchConfig,
    };

    fn minimal_blueprint() -> DispatchBlueprint {
        DispatchBlueprint {
            version: ConfigVersion::V1,
            repository: RepositoryConfig::default(),
            search: SearchConfig::default(),
            engine: EngineConfig::default(),
            connectors: ConnectorSettings::default(),
            observability: ObservabilitySettings::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        let bp = minimal_blueprint();
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_invalid_repository_url() {
        let mut bp = minimal_blueprint();
        bp.repository.url = "not a url".into();
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("url"), "got: {err}");
    }

    #[test]
    fn test_commit_attempts_out_of_range() {
        let mut bp = minimal_blueprint();
        bp.engine.commit_max_attempts = 0;
        assert!(validate(&bp).is_err());
    }

    #[test]
    fn test_memory_backend_without_fixtures() {
        let mut bp = minimal_blueprint();
        bp.search.kind = BackendKind::Memory;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("search.fixtures"), "got: {err}");

        bp.search.fixtures = Some("fixtures.json".into());
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_unknown_connector_type() {
        let mut bp = minimal_blueprint();
        bp.connectors.enabled = vec![HookType::Slack, HookType::Other("matrix".into())];
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("unknown connector type 'matrix'"), "got: {err}");
    }

    #[test]
    fn test_duplicate_connector_type() {
        let mut bp = minimal_blueprint();
        bp.connectors.enabled = vec![HookType::Teams, HookType::Teams];
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("duplicate connector type"), "got: {err}");
    }

    #[test]
    fn test_no_connectors_enabled() {
        let mut bp = minimal_blueprint();
        bp.connectors.enabled.clear();
        assert!(validate(&bp).is_err());
    }
}
