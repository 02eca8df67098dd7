//! The package manager's install entry points, as seen by the linker.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use crate::domain::model::{ProjectToInstall, WorkspacePackageIndex};
use crate::domain::service::hooks::ReadPackageHook;

/// Suffix of the alias a root component is installed under.
pub const ROOT_ALIAS_SUFFIX: &str = "__root";

/// Hoisting-limit key of the workspace root importer.
pub const ROOT_IMPORTER_KEY: &str = ".@";

pub fn root_alias(component: &str) -> String {
    format!("{}{}", component, ROOT_ALIAS_SUFFIX)
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeLinker {
    #[default]
    Isolated,
    Hoisted,
}

/// Caller-facing install options.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct InstallOptions {
    #[serde(default)]
    pub node_linker: NodeLinker,
    #[serde(default)]
    pub overrides: BTreeMap<String, String>,
    /// Package names whose install gets an injected `<name>__root` copy.
    #[serde(default)]
    pub root_components: Vec<String>,
    pub hoist_pattern: Option<Vec<String>>,
    pub public_hoist_pattern: Option<Vec<String>>,
}

/// Everything handed to the installer for one install.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallRequest {
    pub root_dir: PathBuf,
    /// Projects tagged with their build index; the installer builds lower
    /// indexes first.
    pub projects: Vec<ProjectToInstall>,
    pub workspace_packages: WorkspacePackageIndex,
    /// `default` and `@scope` keys.
    pub registries: BTreeMap<String, String>,
    pub prefer_frozen_lockfile: bool,
    pub options: InstallOptions,
    /// Importer key -> aliases that must not be hoisted past it.
    pub hoisting_limits: BTreeMap<String, BTreeSet<String>>,
    pub read_package_hook: Option<ReadPackageHook>,
}

/// What the installer reports back.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct InstallOutcome {
    /// Workspace-relative project dir -> dirs the installer placed injected
    /// (hard-linked) copies of it in.
    #[serde(default)]
    pub injected_deps: BTreeMap<String, Vec<PathBuf>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeerCheckRequest {
    pub projects: Vec<ProjectToInstall>,
    pub workspace_packages: WorkspacePackageIndex,
    pub registries: BTreeMap<String, String>,
    pub overrides: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PeerDependencyIssue {
    pub package: String,
    pub peer: String,
    pub wanted_range: String,
    /// `None` when the peer is missing altogether.
    pub found_version: Option<String>,
}

/// Project dir -> issues found for it.
pub type PeerDependencyIssues = BTreeMap<PathBuf, Vec<PeerDependencyIssue>>;

#[cfg_attr(test, mockall::automock(type Store = ();))]
#[async_trait]
pub trait PackageInstaller: Send + Sync {
    /// Store controller type this installer works against.
    type Store: Send + Sync + 'static;

    async fn install(&self, store: Arc<Self::Store>, request: InstallRequest)
    -> Result<InstallOutcome>;

    async fn peer_dependency_issues(
        &self,
        store: Arc<Self::Store>,
        request: PeerCheckRequest,
    ) -> Result<PeerDependencyIssues>;
}
