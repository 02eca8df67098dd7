//! Link action - exposes workspace components under node_modules.
//!
//! Plans the links for a set of components, applies the plan and reports
//! the realized bindings per component. Callers that cache dependency data
//! per component must invalidate it for every reported id.

use std::sync::Arc;

use anyhow::Result;
use log::info;

use crate::config::LinkerConfig;
use crate::domain::model::{Component, ComponentLinks, LinkPlan};
use crate::domain::service::{
    CancelFlag, LinkPlanner, ManifestSynthesizer, ManifestTransformer, MaterializeReport,
    Materializer, materialize_concurrent,
};
use crate::runtime::Runtime;

/// Result of linking a set of components.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkSummary {
    /// One entry per distinct component, including those with no bindings.
    pub results: Vec<ComponentLinks>,
    pub report: MaterializeReport,
}

impl LinkSummary {
    pub fn linked_files(&self) -> usize {
        self.results.iter().map(|r| r.bound.len()).sum()
    }
}

pub struct LinkAction<R: Runtime> {
    runtime: Arc<R>,
    config: LinkerConfig,
    synthesizer: ManifestSynthesizer,
}

impl<R: Runtime + 'static> LinkAction<R> {
    pub fn new(runtime: Arc<R>, config: LinkerConfig) -> Self {
        let synthesizer = ManifestSynthesizer::new(config.clone());
        Self {
            runtime,
            config,
            synthesizer,
        }
    }

    /// Register a manifest transformer; see [`ManifestSynthesizer::register`].
    pub fn with_transformer(mut self, transformer: impl ManifestTransformer + 'static) -> Self {
        self.synthesizer.register(transformer);
        self
    }

    pub fn config(&self) -> &LinkerConfig {
        &self.config
    }

    pub fn plan(&self, components: &[Component]) -> Result<LinkPlan> {
        LinkPlanner::new(self.runtime.as_ref(), self.config.clone(), &self.synthesizer)
            .plan(components)
    }

    /// Plan and apply links one at a time.
    #[tracing::instrument(skip(self, components), fields(count = components.len()))]
    pub fn link_components(&self, components: &[Component]) -> Result<LinkSummary> {
        let plan = self.plan(components)?;
        let report = Materializer::new(self.runtime.as_ref()).materialize(&plan)?;
        Ok(self.summarize(components, &plan, report))
    }

    /// Plan, then apply with up to `config.concurrency` links in flight.
    #[tracing::instrument(skip(self, components, cancel), fields(count = components.len()))]
    pub async fn link_components_concurrent(
        &self,
        components: &[Component],
        cancel: CancelFlag,
    ) -> Result<LinkSummary> {
        let plan = self.plan(components)?;
        let report = materialize_concurrent(
            self.runtime.clone(),
            plan.clone(),
            self.config.concurrency,
            cancel,
        )
        .await?;
        Ok(self.summarize(components, &plan, report))
    }

    fn summarize(
        &self,
        components: &[Component],
        plan: &LinkPlan,
        report: MaterializeReport,
    ) -> LinkSummary {
        let unique = Component::unique(components);
        let results = plan.link_results(&unique);
        info!(
            "Linked {} component(s) into {:?}",
            results.len(),
            self.config.node_modules_dir()
        );
        LinkSummary { results, report }
    }
}
