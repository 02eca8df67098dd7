//! Workspace components as seen by the linker.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// File name the module loader looks for at a package root.
pub const PACKAGE_JSON: &str = "package.json";

/// Identity of a component: optional scope, name, optional version.
///
/// Equality ignores nothing; two ids with different versions are different
/// components.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ComponentId {
    pub fn new(scope: Option<&str>, name: &str, version: Option<&str>) -> Self {
        Self {
            scope: scope.map(str::to_string),
            name: name.to_string(),
            version: version.map(str::to_string),
        }
    }

    /// `scope/name` without the version.
    pub fn to_string_without_version(&self) -> String {
        match &self.scope {
            Some(scope) => format!("{}/{}", scope, self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_without_version())?;
        if let Some(version) = &self.version {
            write!(f, "@{}", version)?;
        }
        Ok(())
    }
}

/// A component loaded from workspace state for one link/install operation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub id: ComponentId,
    /// Physical directory holding the component's files. `None` for authored
    /// components that live in place.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_dir: Option<PathBuf>,
    /// Member files, relative to `root_dir`, `/`-separated.
    #[serde(default)]
    pub files: Vec<String>,
    /// Entry point, relative to the component root.
    #[serde(default = "default_main_file")]
    pub main_file: String,
    /// Overrides the namespace used to build the package name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding_prefix: Option<String>,
    /// Scope to assume when `id.scope` is not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_scope: Option<String>,
    /// Other workspace components this one depends on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<ComponentId>,
    /// Third-party packages, name -> range.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub packages: BTreeMap<String, String>,
}

fn default_main_file() -> String {
    "index.js".to_string()
}

impl Component {
    pub fn new(id: ComponentId) -> Self {
        Self {
            id,
            root_dir: None,
            files: Vec::new(),
            main_file: default_main_file(),
            binding_prefix: None,
            default_scope: None,
            dependencies: Vec::new(),
            packages: BTreeMap::new(),
        }
    }

    pub fn with_root_dir(mut self, root_dir: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(root_dir.into());
        self
    }

    pub fn with_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files = files.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_main_file(mut self, main_file: impl Into<String>) -> Self {
        self.main_file = main_file.into();
        self
    }

    /// Whether the component ships its own `package.json` at its root.
    pub fn has_own_package_json(&self) -> bool {
        self.files.iter().any(|f| f == PACKAGE_JSON)
    }

    /// Drop repeated components, keeping the first occurrence of each id.
    pub fn unique(components: &[Component]) -> Vec<&Component> {
        let mut seen = std::collections::HashSet::new();
        components
            .iter()
            .filter(|c| seen.insert(c.id.clone()))
            .collect()
    }
}
