//! Linker configuration.
//!
//! The planner never reaches into a live workspace; it gets one of these
//! by value. Values come from defaults, then an optional `workspace.json`
//! at the workspace root, then explicit overrides from the caller.

use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

/// Workspace configuration file name.
pub const WORKSPACE_CONFIG_FILE: &str = "workspace.json";

/// Directory the module loader searches.
pub const NODE_MODULES: &str = "node_modules";

/// Name of the link to a component's real source directory, for tooling
/// that cannot follow symlinked files.
pub const SOURCE_MARKER_DIR: &str = "_src";

pub const DEFAULT_BINDING_PREFIX: &str = "@bit";

const DEFAULT_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct LinkerConfig {
    pub workspace_dir: PathBuf,
    /// Scope for components that have neither their own scope nor a
    /// component-level default.
    pub default_scope: Option<String>,
    pub binding_prefix: String,
    /// Plan a `_src` directory link per component and point `main`/`types`
    /// through it.
    pub source_marker: bool,
    /// Upper bound on links created in parallel.
    pub concurrency: usize,
}

impl LinkerConfig {
    pub fn new(workspace_dir: impl Into<PathBuf>) -> Self {
        Self {
            workspace_dir: workspace_dir.into(),
            default_scope: None,
            binding_prefix: DEFAULT_BINDING_PREFIX.to_string(),
            source_marker: cfg!(windows),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_default_scope(mut self, scope: impl Into<String>) -> Self {
        self.default_scope = Some(scope.into());
        self
    }

    pub fn with_source_marker(mut self, enabled: bool) -> Self {
        self.source_marker = enabled;
        self
    }

    /// Load defaults plus `workspace.json` (if present) for `workspace_dir`.
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, workspace_dir: &Path) -> Result<Self> {
        let mut config = Self::new(workspace_dir);
        let path = workspace_dir.join(WORKSPACE_CONFIG_FILE);
        if !runtime.exists(&path) {
            debug!("No {:?}, using default linker configuration", path);
            return Ok(config);
        }

        let content = runtime.read_to_string(&path)?;
        let file: WorkspaceFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {:?}", path))?;
        debug!("Loaded workspace configuration from {:?}", path);

        if file.default_scope.is_some() {
            config.default_scope = file.default_scope;
        }
        if let Some(prefix) = file.binding_prefix {
            config.binding_prefix = prefix;
        }
        if let Some(marker) = file.source_marker {
            config.source_marker = marker;
        }
        if let Some(concurrency) = file.concurrency {
            config.concurrency = concurrency.max(1);
        }
        Ok(config)
    }

    pub fn node_modules_dir(&self) -> PathBuf {
        self.workspace_dir.join(NODE_MODULES)
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct WorkspaceFile {
    default_scope: Option<String>,
    binding_prefix: Option<String>,
    source_marker: Option<bool>,
    concurrency: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockRuntime;
    use mockall::predicate::eq;

    #[test]
    fn test_load_without_file_uses_defaults() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_exists()
            .with(eq(PathBuf::from("/ws/workspace.json")))
            .returning(|_| false);

        let config = LinkerConfig::load(&runtime, Path::new("/ws")).unwrap();
        assert_eq!(config, LinkerConfig::new("/ws"));
        assert_eq!(config.binding_prefix, "@bit");
        assert_eq!(config.node_modules_dir(), PathBuf::from("/ws/node_modules"));
    }

    #[test]
    fn test_load_reads_workspace_file() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| true);
        runtime
            .expect_read_to_string()
            .with(eq(PathBuf::from("/ws/workspace.json")))
            .returning(|_| {
                Ok(r#"{
                    "defaultScope": "acme.ui",
                    "bindingPrefix": "@acme",
                    "sourceMarker": true,
                    "concurrency": 0,
                    "unrelated": 42
                }"#
                .to_string())
            });

        let config = LinkerConfig::load(&runtime, Path::new("/ws")).unwrap();
        assert_eq!(config.default_scope.as_deref(), Some("acme.ui"));
        assert_eq!(config.binding_prefix, "@acme");
        assert!(config.source_marker);
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| true);
        runtime
            .expect_read_to_string()
            .returning(|_| Ok("{ not json".to_string()));

        let err = LinkerConfig::load(&runtime, Path::new("/ws")).unwrap_err();
        assert!(err.to_string().contains("workspace.json"));
    }
}
