//! Minimal `package.json` generation for linked components.

use anyhow::{Context, Result};
use log::debug;
use serde_json::json;

use crate::config::{LinkerConfig, SOURCE_MARKER_DIR};
use crate::domain::model::{Component, ComponentId, Manifest};
use crate::domain::service::naming::{effective_scope, package_name, package_name_for_id};

/// Version the draft carries while transformers run when the component
/// has none. Stripped before the manifest is returned.
const PLACEHOLDER_VERSION: &str = "latest";

/// Hook that may rewrite a synthesized manifest before it is finalized.
pub trait ManifestTransformer: Send + Sync {
    fn transform(&self, component: &Component, manifest: Manifest) -> Result<Manifest>;
}

impl<F> ManifestTransformer for F
where
    F: Fn(&Component, Manifest) -> Result<Manifest> + Send + Sync,
{
    fn transform(&self, component: &Component, manifest: Manifest) -> Result<Manifest> {
        self(component, manifest)
    }
}

/// Builds the manifest placed at a component's module-resolution root.
pub struct ManifestSynthesizer {
    config: LinkerConfig,
    transformers: Vec<Box<dyn ManifestTransformer>>,
}

impl ManifestSynthesizer {
    pub fn new(config: LinkerConfig) -> Self {
        Self {
            config,
            transformers: Vec::new(),
        }
    }

    /// Register a transformer. Transformers run in registration order.
    pub fn register(&mut self, transformer: impl ManifestTransformer + 'static) {
        self.transformers.push(Box::new(transformer));
    }

    pub fn with_transformer(mut self, transformer: impl ManifestTransformer + 'static) -> Self {
        self.register(transformer);
        self
    }

    /// Manifest for `component`, or `None` when the component ships its own
    /// `package.json`.
    #[tracing::instrument(skip(self, component), fields(component = %component.id))]
    pub fn synthesize(&self, component: &Component) -> Result<Option<Manifest>> {
        if component.has_own_package_json() {
            debug!(
                "{} has its own package.json, not generating one",
                component.id
            );
            return Ok(None);
        }

        let mut manifest = self.draft(component);
        for transformer in &self.transformers {
            manifest = transformer
                .transform(component, manifest)
                .with_context(|| format!("Failed to transform package.json of {}", component.id))?;
        }

        if self.config.source_marker {
            // Editors resolve types through the real source tree.
            manifest.types = Some(format!("{}/{}", SOURCE_MARKER_DIR, component.main_file));
        }
        // Never persisted: it would have to follow every tag of the component.
        manifest.version = None;

        Ok(Some(manifest))
    }

    fn draft(&self, component: &Component) -> Manifest {
        let id = &component.id;
        let mut manifest = Manifest::named(package_name(component, &self.config));
        manifest.version = Some(
            id.version
                .clone()
                .unwrap_or_else(|| PLACEHOLDER_VERSION.to_string()),
        );
        manifest.main = Some(if self.config.source_marker {
            format!("{}/{}", SOURCE_MARKER_DIR, component.main_file)
        } else {
            component.main_file.clone()
        });
        manifest.set_property(
            "componentId",
            json!({
                "scope": effective_scope(component, &self.config),
                "name": id.name,
            }),
        );

        for dependency in &component.dependencies {
            manifest.add_dependency(self.dependency_name(dependency), dependency_range(dependency));
        }
        for (name, range) in &component.packages {
            manifest.add_dependency(name.clone(), range.clone());
        }
        manifest
    }

    fn dependency_name(&self, id: &ComponentId) -> String {
        package_name_for_id(id, None, None, &self.config)
    }
}

fn dependency_range(id: &ComponentId) -> String {
    id.version.clone().unwrap_or_else(|| "*".to_string())
}
