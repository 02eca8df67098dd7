//! Install-side data: chunks, projects and the workspace package index.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::Manifest;

/// Key used in the workspace package index for manifests without a version.
pub const UNVERSIONED: &str = "";

/// One topological bucket. Every project in chunk `index` depends only on
/// projects in chunks with a lower index.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DependencyChunk {
    pub index: usize,
    pub projects: Vec<(PathBuf, Manifest)>,
}

impl DependencyChunk {
    pub fn dirs(&self) -> impl Iterator<Item = &PathBuf> {
        self.projects.iter().map(|(dir, _)| dir)
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Mutation {
    Install,
}

/// A project handed to the installer, tagged with the chunk it belongs to.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectToInstall {
    pub build_index: usize,
    pub root_dir: PathBuf,
    pub manifest: Manifest,
    pub mutation: Mutation,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct WorkspacePackage {
    pub dir: PathBuf,
    pub manifest: Manifest,
}

/// name -> version -> package. Lets the installer satisfy workspace
/// references without the registry.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct WorkspacePackageIndex {
    packages: BTreeMap<String, BTreeMap<String, WorkspacePackage>>,
}

impl WorkspacePackageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a manifest; manifests without a name are ignored.
    pub fn insert(&mut self, dir: PathBuf, manifest: &Manifest) {
        let Some(name) = &manifest.name else {
            return;
        };
        let version = manifest
            .version
            .clone()
            .unwrap_or_else(|| UNVERSIONED.to_string());
        self.packages.entry(name.clone()).or_default().insert(
            version,
            WorkspacePackage {
                dir,
                manifest: manifest.clone(),
            },
        );
    }

    pub fn get(&self, name: &str, version: &str) -> Option<&WorkspacePackage> {
        self.packages.get(name)?.get(version)
    }

    pub fn versions(&self, name: &str) -> Option<&BTreeMap<String, WorkspacePackage>> {
        self.packages.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.packages.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
