//! Manifest rewrites applied by the installer as it reads each package.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::domain::model::{DependencyMeta, Manifest, WORKSPACE_PROTOCOL};

/// Read-package hook installed when an install has root components.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ReadPackageHook {
    root_components: BTreeSet<String>,
}

impl ReadPackageHook {
    pub fn new<I, S>(root_components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            root_components: root_components.into_iter().map(Into::into).collect(),
        }
    }

    pub fn root_components(&self) -> &BTreeSet<String> {
        &self.root_components
    }

    /// Rewrite `manifest`. `workspace_dir` is set only when the manifest
    /// belongs to a workspace project. Manifests with no `dependencies`
    /// section pass through untouched; an empty section still gets peers.
    pub fn read_package(&self, manifest: Manifest, workspace_dir: Option<&Path>) -> Manifest {
        if manifest.dependencies.is_none() {
            return manifest;
        }
        match workspace_dir {
            Some(_) => read_workspace_package(manifest),
            None => self.read_dependency_package(manifest),
        }
    }

    /// Workspace references of a fetched package are injected (hard-linked
    /// copies) rather than symlinked.
    fn read_dependency_package(&self, mut manifest: Manifest) -> Manifest {
        let workspace_deps: Vec<String> = manifest
            .dependencies
            .iter()
            .flatten()
            .filter(|(_, range)| range.starts_with(WORKSPACE_PROTOCOL))
            .map(|(name, _)| name.clone())
            .collect();
        for name in workspace_deps {
            manifest.dependencies_meta.insert(
                name,
                DependencyMeta {
                    injected: Some(true),
                },
            );
        }

        let is_root = manifest
            .name
            .as_ref()
            .is_some_and(|name| self.root_components.contains(name));
        if is_root {
            merge_peers_into_dependencies(&mut manifest);
        }
        manifest
    }
}

/// Drop workspace references; the linker wires those itself.
fn read_workspace_package(mut manifest: Manifest) -> Manifest {
    if let Some(deps) = manifest.dependencies.as_mut() {
        deps.retain(|_, range| !range.starts_with(WORKSPACE_PROTOCOL));
    }
    merge_peers_into_dependencies(&mut manifest);
    manifest
}

/// Regular dependencies win over peers of the same name.
fn merge_peers_into_dependencies(manifest: &mut Manifest) {
    let deps = manifest.dependencies.get_or_insert_with(BTreeMap::new);
    for (name, range) in &manifest.peer_dependencies {
        deps.entry(name.clone()).or_insert_with(|| range.clone());
    }
}
