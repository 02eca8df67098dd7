use anyhow::{Context, Result};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::application::{LinkAction, LinkSummary};
use crate::config::LinkerConfig;
use crate::domain::model::Component;
use crate::domain::service::CancelFlag;
use crate::runtime::Runtime;

/// Link the components listed in `components_file` into the workspace's
/// node_modules and print a line per component.
#[tracing::instrument(skip(runtime))]
pub async fn link<R: Runtime + 'static>(
    runtime: R,
    components_file: &Path,
    root: Option<PathBuf>,
    default_scope: Option<String>,
) -> Result<()> {
    let runtime = Arc::new(runtime);
    let workspace_dir = match root {
        Some(root) => root,
        None => runtime.current_dir()?,
    };

    let mut config = LinkerConfig::load(runtime.as_ref(), &workspace_dir)?;
    if let Some(scope) = default_scope {
        config.default_scope = Some(scope);
    }

    let components = load_components(runtime.as_ref(), components_file)?;
    debug!(
        "Linking {} component(s) into {:?}",
        components.len(),
        config.node_modules_dir()
    );

    let cancel = CancelFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing links already in progress");
            on_interrupt.cancel();
        }
    });

    let action = LinkAction::new(runtime, config);
    let summary = action.link_components_concurrent(&components, cancel).await?;
    print_summary(&summary);
    Ok(())
}

pub(crate) fn load_components<R: Runtime>(runtime: &R, path: &Path) -> Result<Vec<Component>> {
    let content = runtime.read_to_string(path)?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse components from {:?}", path))
}

fn print_summary(summary: &LinkSummary) {
    for result in &summary.results {
        println!("{}: {} file(s) linked", result.id, result.bound.len());
    }
}
