use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::domain::model::Manifest;
use crate::domain::service::{InstallGroups, group_for_install};
use crate::runtime::Runtime;

/// Print the install chunks of the manifests in `manifests_file`
/// (a JSON object mapping project dir to manifest).
#[tracing::instrument(skip(runtime))]
pub fn group<R: Runtime>(runtime: R, manifests_file: &Path) -> Result<()> {
    let groups = load_and_group(&runtime, manifests_file)?;
    print!("{}", render(&groups));
    Ok(())
}

fn load_and_group<R: Runtime>(runtime: &R, path: &Path) -> Result<InstallGroups> {
    let content = runtime.read_to_string(path)?;
    let manifests: BTreeMap<PathBuf, Manifest> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse manifests from {:?}", path))?;
    group_for_install(&manifests)
}

fn render(groups: &InstallGroups) -> String {
    let mut out = String::new();
    for chunk in &groups.chunks {
        out.push_str(&format!("chunk {}:\n", chunk.index));
        for (dir, manifest) in &chunk.projects {
            match &manifest.name {
                Some(name) => out.push_str(&format!("  {} ({})\n", dir.display(), name)),
                None => out.push_str(&format!("  {}\n", dir.display())),
            }
        }
    }
    out
}
