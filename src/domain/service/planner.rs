//! Link planning: which links and files expose each component at its
//! module-resolution path.

use anyhow::{Context, Result, bail};
use log::debug;
use std::path::{Path, PathBuf};

use crate::config::{LinkerConfig, SOURCE_MARKER_DIR};
use crate::domain::model::{
    Component, LinkKind, LinkPlan, PACKAGE_JSON, PlannedFile, PlannedLink,
};
use crate::domain::service::ManifestSynthesizer;
use crate::domain::service::naming::resolution_path;
use crate::error::LinkError;
use crate::runtime::{Runtime, is_path_under, path::join_member_path};

/// Computes a [`LinkPlan`] for a set of components. Reads the filesystem
/// (to find stale symlinks) but never writes to it.
pub struct LinkPlanner<'a, R: Runtime> {
    runtime: &'a R,
    config: LinkerConfig,
    synthesizer: &'a ManifestSynthesizer,
}

impl<'a, R: Runtime> LinkPlanner<'a, R> {
    pub fn new(runtime: &'a R, config: LinkerConfig, synthesizer: &'a ManifestSynthesizer) -> Self {
        Self {
            runtime,
            config,
            synthesizer,
        }
    }

    pub fn config(&self) -> &LinkerConfig {
        &self.config
    }

    /// Plan links for `components`. Repeated ids are planned once, first
    /// occurrence wins.
    #[tracing::instrument(skip(self, components))]
    pub fn plan(&self, components: &[Component]) -> Result<LinkPlan> {
        let mut plan = LinkPlan::new();
        for component in Component::unique(components) {
            self.plan_component(component, &mut plan)?;
        }
        Ok(plan)
    }

    fn plan_component(&self, component: &Component, plan: &mut LinkPlan) -> Result<()> {
        debug!("Linking component to node_modules: {}", component.id);
        let link_path = resolution_path(component, &self.config);

        match self.plan_file_links(component, &link_path, plan) {
            Ok(()) => {}
            Err(e)
                if matches!(
                    e.downcast_ref::<LinkError>(),
                    Some(LinkError::MissingComponentRoot { .. })
                ) =>
            {
                debug!(
                    "{} has no root directory, exposing it through a generated package.json only",
                    component.id
                );
            }
            Err(e) => return Err(e),
        }

        // A package manager may have linked the whole package directory; replace
        // it rather than writing into whatever it points at.
        if self.runtime.is_symlink(&link_path) {
            debug!("Removing existing symlink at {:?}", link_path);
            plan.add_removal(&link_path);
        }

        if let Some(manifest) = self.synthesizer.synthesize(component)? {
            let contents = manifest
                .to_pretty_json()
                .with_context(|| format!("Failed to serialize package.json of {}", component.id))?;
            plan.add_file(PlannedFile {
                path: link_path.join(PACKAGE_JSON),
                contents: contents.into_bytes(),
                component: Some(component.id.clone()),
            })?;
        }
        Ok(())
    }

    /// Plan one symlink per member file from the component root into
    /// `link_path`, plus the source-marker link when configured.
    ///
    /// Fails with [`LinkError::MissingComponentRoot`] when the component has
    /// no root directory.
    pub fn plan_file_links(
        &self,
        component: &Component,
        link_path: &Path,
        plan: &mut LinkPlan,
    ) -> Result<()> {
        let Some(root_dir) = &component.root_dir else {
            return Err(LinkError::MissingComponentRoot {
                component: component.id.to_string(),
            }
            .into());
        };
        let root_dir = self.absolute(root_dir);

        for file in &component.files {
            let src = join_member_path(&root_dir, file);
            let dest = join_member_path(link_path, file);
            if !is_path_under(&dest, link_path) {
                bail!(
                    "File {:?} of {} resolves outside its package directory",
                    file,
                    component.id
                );
            }
            plan.add_link(PlannedLink::new(src, dest, LinkKind::FileSymlink).owned_by(&component.id))?;
        }

        if self.config.source_marker {
            plan.add_link(
                PlannedLink::new(
                    &root_dir,
                    link_path.join(SOURCE_MARKER_DIR),
                    LinkKind::DirSymlink,
                )
                .owned_by(&component.id),
            )?;
        }
        Ok(())
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config.workspace_dir.join(path)
        }
    }
}
