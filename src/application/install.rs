//! Install action - runs the package manager over the workspace.
//!
//! This use case coordinates:
//! - Root-component aliases in the root manifest
//! - Grouping workspace projects into build chunks
//! - Store controller reuse
//! - Hard-linking generated manifests into injected copies

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};

use crate::config::NODE_MODULES;
use crate::domain::model::{
    DependencyMeta, LinkKind, LinkPlan, Manifest, Mutation, PACKAGE_JSON, PlannedLink,
    ProjectToInstall, StoreConfig, WORKSPACE_PROTOCOL,
};
use crate::domain::service::{
    InstallOptions, InstallRequest, MaterializeReport, Materializer, PackageInstaller,
    PeerCheckRequest, PeerDependencyIssues, ROOT_IMPORTER_KEY, ReadPackageHook, StoreCache,
    StoreConnector, group_for_install, index_workspace, root_alias,
};
use crate::runtime::{Runtime, path::join_member_path};

/// The workspace root project.
#[derive(Debug, Clone, PartialEq)]
pub struct RootManifest {
    pub root_dir: PathBuf,
    pub manifest: Manifest,
}

/// What an install did besides the installer's own work.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallReport {
    /// Number of build chunks handed to the installer.
    pub chunks: usize,
    pub projects: usize,
    /// Result of hard-linking generated manifests into injected copies.
    pub injected_links: MaterializeReport,
}

pub struct InstallAction<'a, R, I, S>
where
    R: Runtime,
    I: PackageInstaller,
    S: StoreConnector<Controller = I::Store>,
{
    runtime: &'a R,
    installer: &'a I,
    connector: &'a S,
    stores: &'a StoreCache<I::Store>,
}

impl<'a, R, I, S> InstallAction<'a, R, I, S>
where
    R: Runtime,
    I: PackageInstaller,
    S: StoreConnector<Controller = I::Store>,
{
    pub fn new(
        runtime: &'a R,
        installer: &'a I,
        connector: &'a S,
        stores: &'a StoreCache<I::Store>,
    ) -> Self {
        Self {
            runtime,
            installer,
            connector,
            stores,
        }
    }

    /// Install `manifests_by_path` plus the root project.
    #[tracing::instrument(skip_all, fields(workspace = ?root.root_dir, manifests = manifests_by_path.len()))]
    pub async fn install(
        &self,
        mut root: RootManifest,
        manifests_by_path: &BTreeMap<PathBuf, Manifest>,
        store_config: &StoreConfig,
        options: InstallOptions,
    ) -> Result<InstallReport> {
        add_root_component_aliases(&mut root.manifest, &options.root_components);

        let mut all = manifests_by_path.clone();
        all.insert(root.root_dir.clone(), root.manifest.clone());
        let groups = group_for_install(&all)?;
        info!(
            "Installing {} project(s) in {} chunk(s)",
            groups.projects.len(),
            groups.chunks.len()
        );

        let store = self.stores.get_or_connect(self.connector, store_config).await?;

        let (hoisting_limits, read_package_hook) = if options.root_components.is_empty() {
            (BTreeMap::new(), None)
        } else {
            let aliases: BTreeSet<String> =
                options.root_components.iter().map(|c| root_alias(c)).collect();
            (
                BTreeMap::from([(ROOT_IMPORTER_KEY.to_string(), aliases)]),
                Some(ReadPackageHook::new(options.root_components.iter().cloned())),
            )
        };

        let chunks = groups.chunks.len();
        let projects = groups.projects.len();
        let request = InstallRequest {
            root_dir: root.root_dir.clone(),
            projects: groups.projects,
            workspace_packages: groups.index,
            registries: store_config.registries.to_map(),
            prefer_frozen_lockfile: true,
            options,
            hoisting_limits,
            read_package_hook,
        };
        let outcome = self
            .installer
            .install(store, request)
            .await
            .context("Package installation failed")?;

        let injected_links =
            self.link_injected_manifests(&root.root_dir, manifests_by_path, &outcome.injected_deps)?;

        Ok(InstallReport {
            chunks,
            projects,
            injected_links,
        })
    }

    /// Hard-link `node_modules/<pkg>/package.json` of every injected project
    /// into each of its injected copies.
    pub fn link_injected_manifests(
        &self,
        root_dir: &Path,
        manifests_by_path: &BTreeMap<PathBuf, Manifest>,
        injected_deps: &BTreeMap<String, Vec<PathBuf>>,
    ) -> Result<MaterializeReport> {
        let mut plan = LinkPlan::new();
        for (project_dir, targets) in injected_deps {
            let Some(name) = manifests_by_path
                .get(&join_member_path(root_dir, project_dir))
                .and_then(|m| m.name.as_deref())
            else {
                debug!("No workspace manifest for injected project {}", project_dir);
                continue;
            };
            let src = join_member_path(&root_dir.join(NODE_MODULES), name).join(PACKAGE_JSON);
            for target in targets {
                plan.add_link(PlannedLink::new(
                    &src,
                    root_dir.join(target).join(PACKAGE_JSON),
                    LinkKind::Hardlink,
                ))?;
            }
        }
        if plan.is_empty() {
            return Ok(MaterializeReport::default());
        }
        Materializer::new(self.runtime).materialize(&plan)
    }

    /// Peer dependency issues of the workspace, without installing.
    #[tracing::instrument(skip_all, fields(workspace = ?root.root_dir))]
    pub async fn peer_dependency_issues(
        &self,
        root: &RootManifest,
        manifests_by_path: &BTreeMap<PathBuf, Manifest>,
        store_config: &StoreConfig,
        overrides: BTreeMap<String, String>,
    ) -> Result<PeerDependencyIssues> {
        let mut projects: Vec<ProjectToInstall> = manifests_by_path
            .iter()
            .map(|(dir, manifest)| ProjectToInstall {
                build_index: 0,
                root_dir: dir.clone(),
                manifest: manifest.clone(),
                mutation: Mutation::Install,
            })
            .collect();
        projects.push(ProjectToInstall {
            build_index: 0,
            root_dir: root.root_dir.clone(),
            manifest: root.manifest.clone(),
            mutation: Mutation::Install,
        });

        let store = self.stores.get_or_connect(self.connector, store_config).await?;
        let request = PeerCheckRequest {
            projects,
            workspace_packages: index_workspace(manifests_by_path),
            registries: store_config.registries.to_map(),
            overrides,
        };
        self.installer.peer_dependency_issues(store, request).await
    }
}

/// Add `<name>__root` = `workspace:<name>@*` as an injected dev dependency of
/// the root manifest for every root component.
pub fn add_root_component_aliases(manifest: &mut Manifest, root_components: &[String]) {
    for component in root_components {
        let alias = root_alias(component);
        manifest.dev_dependencies.insert(
            alias.clone(),
            format!("{}{}@*", WORKSPACE_PROTOCOL, component),
        );
        manifest.dependencies_meta.insert(
            alias,
            DependencyMeta {
                injected: Some(true),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Registries;
    use crate::domain::service::{InstallOutcome, MockPackageInstaller, PeerDependencyIssue};
    use crate::runtime::MockRuntime;
    use async_trait::async_trait;
    use mockall::predicate::eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct UnitConnector {
        connects: AtomicUsize,
    }

    #[async_trait]
    impl StoreConnector for UnitConnector {
        type Controller = ();

        async fn connect(&self, _config: &StoreConfig) -> Result<()> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn store_config() -> StoreConfig {
        StoreConfig {
            root_dir: PathBuf::from("/ws"),
            store_dir: PathBuf::from("/store"),
            cache_dir: PathBuf::from("/cache"),
            registries: Registries::default(),
            proxy: Default::default(),
            network: Default::default(),
        }
    }

    fn workspace() -> BTreeMap<PathBuf, Manifest> {
        BTreeMap::from([
            (
                PathBuf::from("/ws/apps/shop"),
                Manifest::named("@acme/shop").with_dependency("@acme/ui.button", "workspace:*"),
            ),
            (
                PathBuf::from("/ws/components/button"),
                Manifest::named("@acme/ui.button").with_version("1.0.0"),
            ),
        ])
    }

    fn root() -> RootManifest {
        RootManifest {
            root_dir: PathBuf::from("/ws"),
            manifest: Manifest::named("workspace"),
        }
    }

    #[test]
    fn test_root_component_aliases() {
        let mut manifest = Manifest::named("workspace");
        add_root_component_aliases(&mut manifest, &["@acme/shop".to_string()]);
        assert_eq!(
            manifest.dev_dependencies["@acme/shop__root"],
            "workspace:@acme/shop@*"
        );
        assert_eq!(
            manifest.dependencies_meta["@acme/shop__root"].injected,
            Some(true)
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_install_groups_projects_and_links_injected_manifests() {
        let mut runtime = MockRuntime::new();
        runtime.expect_create_dir_all().returning(|_| Ok(()));
        runtime
            .expect_hard_link()
            .with(
                eq(PathBuf::from(
                    "/ws/node_modules/@acme/ui.button/package.json",
                )),
                eq(PathBuf::from(
                    "/ws/node_modules/.pnpm/button/node_modules/@acme/ui.button/package.json",
                )),
            )
            .times(1)
            .returning(|_, _| Ok(()));

        let mut installer = MockPackageInstaller::new();
        installer
            .expect_install()
            .withf(|_, request| {
                let button = request
                    .projects
                    .iter()
                    .find(|p| p.root_dir == Path::new("/ws/components/button"))
                    .map(|p| p.build_index);
                let shop = request
                    .projects
                    .iter()
                    .find(|p| p.root_dir == Path::new("/ws/apps/shop"))
                    .map(|p| p.build_index);
                button == Some(0)
                    && shop == Some(1)
                    && request.projects.len() == 3
                    && request.prefer_frozen_lockfile
                    && request.workspace_packages.contains("@acme/ui.button")
                    && request.hoisting_limits[ROOT_IMPORTER_KEY].contains("@acme/shop__root")
                    && request.read_package_hook.is_some()
            })
            .times(1)
            .returning(|_, _| {
                Ok(InstallOutcome {
                    injected_deps: BTreeMap::from([(
                        "components/button".to_string(),
                        vec![PathBuf::from(
                            "node_modules/.pnpm/button/node_modules/@acme/ui.button",
                        )],
                    )]),
                })
            });

        let connector = UnitConnector::default();
        let stores = StoreCache::new();
        let action = InstallAction::new(&runtime, &installer, &connector, &stores);

        let options = InstallOptions {
            root_components: vec!["@acme/shop".to_string()],
            ..Default::default()
        };
        let report = action
            .install(root(), &workspace(), &store_config(), options)
            .await
            .unwrap();

        assert_eq!(report.projects, 3);
        assert_eq!(report.injected_links.created, 1);
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_install_without_root_components_has_no_hook() {
        let runtime = MockRuntime::new();
        let mut installer = MockPackageInstaller::new();
        installer
            .expect_install()
            .withf(|_, request| {
                request.read_package_hook.is_none() && request.hoisting_limits.is_empty()
            })
            .times(2)
            .returning(|_, _| Ok(InstallOutcome::default()));

        let connector = UnitConnector::default();
        let stores = StoreCache::new();
        let action = InstallAction::new(&runtime, &installer, &connector, &stores);

        for _ in 0..2 {
            let report = action
                .install(root(), &workspace(), &store_config(), InstallOptions::default())
                .await
                .unwrap();
            assert_eq!(report.chunks, 2);
            assert_eq!(report.injected_links, MaterializeReport::default());
        }
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_install_surfaces_cycles_before_installing() {
        let runtime = MockRuntime::new();
        let mut installer = MockPackageInstaller::new();
        installer.expect_install().never();

        let manifests = BTreeMap::from([
            (
                PathBuf::from("/ws/a"),
                Manifest::named("a").with_dependency("b", "workspace:*"),
            ),
            (
                PathBuf::from("/ws/b"),
                Manifest::named("b").with_dependency("a", "workspace:*"),
            ),
        ]);
        let connector = UnitConnector::default();
        let stores = StoreCache::new();
        let action = InstallAction::new(&runtime, &installer, &connector, &stores);

        let err = action
            .install(root(), &manifests, &store_config(), InstallOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Cyclic dependency"));
    }

    #[tokio::test]
    async fn test_peer_dependency_issues_delegates_with_index() {
        let runtime = MockRuntime::new();
        let mut installer = MockPackageInstaller::new();
        installer
            .expect_peer_dependency_issues()
            .withf(|_, request| {
                request.projects.len() == 3
                    && request.projects.iter().all(|p| p.build_index == 0)
                    && request.workspace_packages.len() == 2
                    && !request.workspace_packages.contains("workspace")
            })
            .times(1)
            .returning(|_, _| {
                Ok(BTreeMap::from([(
                    PathBuf::from("/ws/apps/shop"),
                    vec![PeerDependencyIssue {
                        package: "@acme/ui.button".to_string(),
                        peer: "react".to_string(),
                        wanted_range: "^18.0.0".to_string(),
                        found_version: None,
                    }],
                )]))
            });

        let connector = UnitConnector::default();
        let stores = StoreCache::new();
        let action = InstallAction::new(&runtime, &installer, &connector, &stores);

        let issues = action
            .peer_dependency_issues(&root(), &workspace(), &store_config(), BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(issues[Path::new("/ws/apps/shop")].len(), 1);
    }
}
