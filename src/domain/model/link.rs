//! Link plans and link results.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::{Component, ComponentId};
use crate::error::LinkError;

/// How a planned link is realized on disk.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum LinkKind {
    /// Symlink (or junction) pointing at a directory.
    DirSymlink,
    /// Symlink pointing at a file.
    FileSymlink,
    /// Hard link to a file.
    Hardlink,
}

/// One planned link: `dest` will resolve to `src`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedLink {
    pub src: PathBuf,
    pub dest: PathBuf,
    pub kind: LinkKind,
    /// Owning component; `None` for links that belong to no component.
    pub component: Option<ComponentId>,
}

impl PlannedLink {
    pub fn new(src: impl Into<PathBuf>, dest: impl Into<PathBuf>, kind: LinkKind) -> Self {
        Self {
            src: src.into(),
            dest: dest.into(),
            kind,
            component: None,
        }
    }

    pub fn owned_by(mut self, component: &ComponentId) -> Self {
        self.component = Some(component.clone());
        self
    }
}

/// A file the plan writes verbatim (synthesized manifests).
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedFile {
    pub path: PathBuf,
    pub contents: Vec<u8>,
    pub component: Option<ComponentId>,
}

/// Everything one link operation will do to disk, in execution order:
/// removals first, then links, then files.
///
/// Destinations are unique across links and files.
#[derive(Debug, Default, Clone)]
pub struct LinkPlan {
    removals: Vec<PathBuf>,
    links: Vec<PlannedLink>,
    files: Vec<PlannedFile>,
    link_dests: HashMap<PathBuf, usize>,
}

impl LinkPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove whatever is at `path` before any link is created.
    pub fn add_removal(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.removals.contains(&path) {
            self.removals.push(path);
        }
    }

    /// Add a link. Re-adding the same source for the same destination is a
    /// no-op; a different source for a taken destination is a conflict.
    pub fn add_link(&mut self, link: PlannedLink) -> Result<()> {
        if let Some(&index) = self.link_dests.get(&link.dest) {
            let existing = &self.links[index];
            if existing.src == link.src && existing.kind == link.kind {
                return Ok(());
            }
            return Err(LinkError::LinkConflict {
                dest: link.dest,
                expected: existing.src.clone(),
                actual: link.src,
            }
            .into());
        }
        if self.files.iter().any(|f| f.path == link.dest) {
            return Err(LinkError::LinkConflict {
                dest: link.dest.clone(),
                expected: link.dest,
                actual: link.src,
            }
            .into());
        }
        self.link_dests.insert(link.dest.clone(), self.links.len());
        self.links.push(link);
        Ok(())
    }

    /// Add a generated file. Re-adding identical contents from the same
    /// owner is a no-op; anything else at a taken path is a conflict.
    pub fn add_file(&mut self, file: PlannedFile) -> Result<()> {
        if let Some(&index) = self.link_dests.get(&file.path) {
            return Err(LinkError::LinkConflict {
                dest: file.path.clone(),
                expected: file.path,
                actual: self.links[index].src.clone(),
            }
            .into());
        }
        if let Some(existing) = self.files.iter().find(|f| f.path == file.path) {
            if existing.component == file.component && existing.contents == file.contents {
                return Ok(());
            }
            return Err(LinkError::LinkConflict {
                dest: file.path.clone(),
                expected: file.path.clone(),
                actual: file.path,
            }
            .into());
        }
        self.files.push(file);
        Ok(())
    }

    pub fn removals(&self) -> &[PathBuf] {
        &self.removals
    }

    pub fn links(&self) -> &[PlannedLink] {
        &self.links
    }

    pub fn files(&self) -> &[PlannedFile] {
        &self.files
    }

    pub fn link_for(&self, dest: &Path) -> Option<&PlannedLink> {
        self.link_dests.get(dest).map(|&i| &self.links[i])
    }

    pub fn is_empty(&self) -> bool {
        self.removals.is_empty() && self.links.is_empty() && self.files.is_empty()
    }

    /// Per-component bindings, in first-seen order, followed by any of
    /// `components` that got no links at all.
    pub fn link_results(&self, components: &[&Component]) -> Vec<ComponentLinks> {
        let mut results: Vec<ComponentLinks> = Vec::new();
        for link in &self.links {
            let Some(id) = &link.component else {
                continue;
            };
            let detail = LinkDetail {
                from: link.src.clone(),
                to: link.dest.clone(),
            };
            match results.iter_mut().find(|r| &r.id == id) {
                Some(existing) => existing.bound.push(detail),
                None => results.push(ComponentLinks {
                    id: id.clone(),
                    bound: vec![detail],
                }),
            }
        }
        for component in components {
            if !results.iter().any(|r| r.id == component.id) {
                results.push(ComponentLinks {
                    id: component.id.clone(),
                    bound: Vec::new(),
                });
            }
        }
        results
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct LinkDetail {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// Realized bindings of one component.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ComponentLinks {
    pub id: ComponentId,
    pub bound: Vec<LinkDetail>,
}

/// What the materializer did for one planned link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Created,
    /// The destination already pointed at the planned source.
    AlreadyLinked,
    /// A stale file or directory was removed and the link created.
    Replaced,
}
