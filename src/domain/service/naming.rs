//! Package names and module-resolution paths of components.

use std::path::PathBuf;

use crate::config::LinkerConfig;
use crate::domain::model::{Component, ComponentId};

/// Scope used for naming: the component's own, then its default scope,
/// then the workspace default.
pub fn effective_scope(component: &Component, config: &LinkerConfig) -> Option<String> {
    component
        .id
        .scope
        .clone()
        .or_else(|| component.default_scope.clone())
        .or_else(|| config.default_scope.clone())
}

/// Package name a component is importable under.
pub fn package_name(component: &Component, config: &LinkerConfig) -> String {
    package_name_for_id(
        &component.id,
        component.default_scope.as_deref(),
        component.binding_prefix.as_deref(),
        config,
    )
}

/// Package name for a bare id.
///
/// - explicit binding prefix: `<prefix>/<scope>.<name>`
/// - scope `owner.rest`: `@owner/<rest>.<name>`
/// - otherwise: `<workspace prefix>/<scope>.<name>`
///
/// `/` in the name becomes `.`; without any scope the name stands alone.
pub fn package_name_for_id(
    id: &ComponentId,
    default_scope: Option<&str>,
    binding_prefix: Option<&str>,
    config: &LinkerConfig,
) -> String {
    let dotted_name = id.name.replace('/', ".");
    let scope = id
        .scope
        .as_deref()
        .or(default_scope)
        .or(config.default_scope.as_deref());

    if let Some(prefix) = binding_prefix {
        return match scope {
            Some(scope) => format!("{}/{}.{}", prefix, scope, dotted_name),
            None => format!("{}/{}", prefix, dotted_name),
        };
    }

    match scope {
        Some(scope) => match scope.split_once('.') {
            Some((owner, rest)) if !owner.is_empty() && !rest.is_empty() => {
                format!("@{}/{}.{}", owner.trim_start_matches('@'), rest, dotted_name)
            }
            _ => format!("{}/{}.{}", config.binding_prefix, scope, dotted_name),
        },
        None => format!("{}/{}", config.binding_prefix, dotted_name),
    }
}

/// Absolute directory the module loader resolves the component from.
pub fn resolution_path(component: &Component, config: &LinkerConfig) -> PathBuf {
    package_name(component, config)
        .split('/')
        .fold(config.node_modules_dir(), |acc, segment| acc.join(segment))
}
