//! Groups workspace manifests into install chunks.
//!
//! An edge `A -> B` means manifest A depends on the package manifest B
//! publishes. Chunk 0 holds every manifest with no workspace-local
//! dependencies; chunk `i` holds manifests whose dependencies all sit in
//! chunks below `i`.

use anyhow::Result;
use log::debug;
use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;

use crate::domain::model::{
    DependencyChunk, Manifest, Mutation, ProjectToInstall, WORKSPACE_PROTOCOL,
    WorkspacePackageIndex,
};
use crate::error::LinkError;

/// Result of [`group_for_install`].
#[derive(Debug, Clone, PartialEq)]
pub struct InstallGroups {
    pub chunks: Vec<DependencyChunk>,
    /// Every project, in chunk order, tagged with its build index.
    pub projects: Vec<ProjectToInstall>,
    pub index: WorkspacePackageIndex,
}

impl InstallGroups {
    /// Chunk index of the project at `dir`.
    pub fn chunk_of(&self, dir: &std::path::Path) -> Option<usize> {
        self.projects
            .iter()
            .find(|project| project.root_dir == dir)
            .map(|project| project.build_index)
    }
}

/// Project dependency graph. Nodes are project dirs.
struct ProjectGraph {
    graph: DiGraph<PathBuf, ()>,
    nodes: BTreeMap<PathBuf, NodeIndex>,
}

impl ProjectGraph {
    fn build(manifests: &BTreeMap<PathBuf, Manifest>) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes = BTreeMap::new();
        let mut by_name: HashMap<&str, Vec<(&PathBuf, &Manifest)>> = HashMap::new();

        for (dir, manifest) in manifests {
            nodes.insert(dir.clone(), graph.add_node(dir.clone()));
            if let Some(name) = &manifest.name {
                by_name.entry(name.as_str()).or_default().push((dir, manifest));
            }
        }

        for (dir, manifest) in manifests {
            let from = nodes[dir];
            let mut targets = BTreeSet::new();
            for (name, range) in manifest.all_dependencies() {
                let Some(candidates) = by_name.get(name.as_str()) else {
                    continue;
                };
                for (target_dir, target) in candidates {
                    if *target_dir != dir && satisfies(range, target) {
                        targets.insert(*target_dir);
                    }
                }
            }
            for target_dir in targets {
                graph.update_edge(from, nodes[target_dir], ());
            }
        }

        Self { graph, nodes }
    }

    /// Kahn layering. Fails without a partial result when some remainder has
    /// no ready node.
    fn chunks(&self) -> Result<Vec<Vec<PathBuf>>> {
        let mut outstanding: HashMap<NodeIndex, usize> = self
            .nodes
            .values()
            .map(|&node| {
                let deps = self.graph.neighbors_directed(node, Direction::Outgoing).count();
                (node, deps)
            })
            .collect();

        let mut chunks = Vec::new();
        while !outstanding.is_empty() {
            let mut ready: Vec<NodeIndex> = outstanding
                .iter()
                .filter(|(_, deps)| **deps == 0)
                .map(|(node, _)| *node)
                .collect();
            if ready.is_empty() {
                return Err(self.cycle_error(&outstanding).into());
            }
            ready.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));

            for node in &ready {
                outstanding.remove(node);
                for dependent in self.graph.neighbors_directed(*node, Direction::Incoming) {
                    if let Some(deps) = outstanding.get_mut(&dependent) {
                        *deps -= 1;
                    }
                }
            }
            chunks.push(ready.into_iter().map(|node| self.graph[node].clone()).collect());
        }
        Ok(chunks)
    }

    /// Names the projects that sit on a cycle. Projects merely waiting on a
    /// cycle are left out.
    fn cycle_error(&self, outstanding: &HashMap<NodeIndex, usize>) -> LinkError {
        let mut members: Vec<PathBuf> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| {
                scc.iter().all(|node| outstanding.contains_key(node))
                    && (scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0]))
            })
            .flatten()
            .map(|node| self.graph[node].clone())
            .collect();
        if members.is_empty() {
            members = outstanding.keys().map(|node| self.graph[*node].clone()).collect();
        }
        members.sort();
        LinkError::CyclicDependency { members }
    }
}

/// Whether `range`, declared by some manifest, refers to `target`.
fn satisfies(range: &str, target: &Manifest) -> bool {
    let range = range.trim();
    if range.starts_with(WORKSPACE_PROTOCOL) {
        return true;
    }
    if range.is_empty() || range == "*" || range == "latest" {
        return true;
    }
    let Some(version) = &target.version else {
        return false;
    };
    if range == version {
        return true;
    }
    match (
        semver::VersionReq::parse(range),
        semver::Version::parse(version),
    ) {
        (Ok(req), Ok(version)) => req.matches(&version),
        _ => false,
    }
}

/// Group `manifests` (project dir -> manifest) into install chunks and index
/// every named manifest.
#[tracing::instrument(skip(manifests), fields(projects = manifests.len()))]
pub fn group_for_install(manifests: &BTreeMap<PathBuf, Manifest>) -> Result<InstallGroups> {
    let graph = ProjectGraph::build(manifests);
    let layers = graph.chunks()?;

    let mut chunks = Vec::with_capacity(layers.len());
    let mut projects = Vec::with_capacity(manifests.len());
    let mut index = WorkspacePackageIndex::new();

    for (build_index, dirs) in layers.into_iter().enumerate() {
        let mut chunk = DependencyChunk {
            index: build_index,
            projects: Vec::with_capacity(dirs.len()),
        };
        for dir in dirs {
            let manifest = &manifests[&dir];
            index.insert(dir.clone(), manifest);
            projects.push(ProjectToInstall {
                build_index,
                root_dir: dir.clone(),
                manifest: manifest.clone(),
                mutation: Mutation::Install,
            });
            chunk.projects.push((dir, manifest.clone()));
        }
        debug!(
            "Install chunk {} has {} project(s)",
            build_index,
            chunk.projects.len()
        );
        chunks.push(chunk);
    }

    Ok(InstallGroups {
        chunks,
        projects,
        index,
    })
}

/// Workspace package index without chunking, for peer-dependency checks.
pub fn index_workspace(manifests: &BTreeMap<PathBuf, Manifest>) -> WorkspacePackageIndex {
    let mut index = WorkspacePackageIndex::new();
    for (dir, manifest) in manifests {
        index.insert(dir.clone(), manifest);
    }
    index
}
