//! Remote version resolution through the package manager's resolver.

use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::model::{Manifest, Registries};
use crate::error::LinkError;

/// Failure classes the resolver reports.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The preference is not a version or range; it may be a git URL or path.
    #[error("{0} is not a valid version string")]
    InvalidVersion(String),

    #[error("No matching version found for {0}")]
    NotFound(String),
}

/// What to resolve: an optional package alias and a preference (version,
/// range, tag, URL or path).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WantedDependency {
    pub alias: Option<String>,
    pub pref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveOptions {
    pub project_dir: PathBuf,
    pub registry: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPackage {
    pub manifest: Manifest,
    pub normalized_pref: Option<String>,
    /// Channel the package came through, e.g. `npm-registry` or `git-repository`.
    pub resolved_via: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPackageVersion {
    pub package_name: Option<String>,
    pub version: Option<String>,
    pub is_semver: bool,
    pub resolved_via: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PackageResolver: Send + Sync {
    async fn resolve(
        &self,
        wanted: &WantedDependency,
        options: &ResolveOptions,
    ) -> Result<ResolvedPackage>;
}

/// Split `name[@version]`. A leading `@` belongs to the scope.
pub fn parse_package_spec(spec: &str) -> (String, Option<String>) {
    let search_from = usize::from(spec.starts_with('@'));
    match spec[search_from..].find('@') {
        Some(at) => {
            let at = at + search_from;
            let version = &spec[at + 1..];
            (
                spec[..at].to_string(),
                (!version.is_empty()).then(|| version.to_string()),
            )
        }
        None => (spec.to_string(), None),
    }
}

fn is_valid_range(version: &str) -> bool {
    semver::VersionReq::parse(version).is_ok()
}

fn is_invalid_version(error: &anyhow::Error) -> bool {
    matches!(
        error.downcast_ref::<ResolveError>(),
        Some(ResolveError::InvalidVersion(_))
    )
}

fn unresolved(spec: &str, error: anyhow::Error) -> anyhow::Error {
    LinkError::UnresolvedReference {
        reference: spec.to_string(),
        reason: format!("{:#}", error),
    }
    .into()
}

/// Resolve `spec` against the registry serving it.
///
/// A requested version that is a valid range is reported as is; otherwise
/// the resolved manifest's version is. When the resolver rejects the
/// preference as a version string, the whole spec is retried once as a raw
/// preference (git URL or path).
#[tracing::instrument(skip(resolver, registries))]
pub async fn resolve_remote_version<P: PackageResolver + ?Sized>(
    resolver: &P,
    spec: &str,
    root_dir: &Path,
    registries: &Registries,
) -> Result<ResolvedPackageVersion> {
    let (name, version) = parse_package_spec(spec);
    let options = ResolveOptions {
        project_dir: root_dir.to_path_buf(),
        registry: registries.pick_for_package(&name),
    };
    let wanted = WantedDependency {
        alias: Some(name),
        pref: version.clone(),
    };

    match resolver.resolve(&wanted, &options).await {
        Ok(resolved) => {
            let version = match version {
                Some(requested) if is_valid_range(&requested) => Some(requested),
                _ => resolved.manifest.version,
            };
            Ok(ResolvedPackageVersion {
                package_name: resolved.manifest.name,
                version,
                is_semver: true,
                resolved_via: resolved.resolved_via,
            })
        }
        Err(e) if is_invalid_version(&e) => {
            debug!("{} is not a registry version, resolving it as a raw preference", spec);
            let wanted = WantedDependency {
                alias: None,
                pref: Some(spec.to_string()),
            };
            let resolved = resolver
                .resolve(&wanted, &options)
                .await
                .map_err(|e| unresolved(spec, e))?;
            Ok(ResolvedPackageVersion {
                package_name: resolved.manifest.name,
                version: resolved.normalized_pref,
                is_semver: false,
                resolved_via: resolved.resolved_via,
            })
        }
        Err(e) => Err(unresolved(spec, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Registry;
    use mockall::Sequence;

    fn registries() -> Registries {
        let mut registries = Registries::default();
        registries
            .scopes
            .insert("acme".to_string(), Registry::new("https://npm.acme.dev/"));
        registries
    }

    fn resolved(name: &str, version: &str, via: &str) -> ResolvedPackage {
        ResolvedPackage {
            manifest: Manifest::named(name).with_version(version),
            normalized_pref: None,
            resolved_via: via.to_string(),
        }
    }

    #[test]
    fn test_parse_package_spec() {
        assert_eq!(parse_package_spec("lodash"), ("lodash".to_string(), None));
        assert_eq!(
            parse_package_spec("lodash@^4.0.0"),
            ("lodash".to_string(), Some("^4.0.0".to_string()))
        );
        assert_eq!(
            parse_package_spec("@acme/ui.button@1.2.3"),
            ("@acme/ui.button".to_string(), Some("1.2.3".to_string()))
        );
        assert_eq!(
            parse_package_spec("@acme/ui.button"),
            ("@acme/ui.button".to_string(), None)
        );
        assert_eq!(parse_package_spec("react@"), ("react".to_string(), None));
    }

    #[tokio::test]
    async fn test_valid_range_is_reported_as_requested() {
        let mut resolver = MockPackageResolver::new();
        resolver
            .expect_resolve()
            .withf(|wanted, options| {
                wanted.alias.as_deref() == Some("@acme/ui.button")
                    && wanted.pref.as_deref() == Some("^1.0.0")
                    && options.registry == "https://npm.acme.dev/"
            })
            .times(1)
            .returning(|_, _| Ok(resolved("@acme/ui.button", "1.4.2", "npm-registry")));

        let result = resolve_remote_version(
            &resolver,
            "@acme/ui.button@^1.0.0",
            Path::new("/ws"),
            &registries(),
        )
        .await
        .unwrap();
        assert_eq!(result.version.as_deref(), Some("^1.0.0"));
        assert_eq!(result.package_name.as_deref(), Some("@acme/ui.button"));
        assert!(result.is_semver);
    }

    #[tokio::test]
    async fn test_tag_is_replaced_by_resolved_version() {
        let mut resolver = MockPackageResolver::new();
        resolver
            .expect_resolve()
            .withf(|_, options| options.registry == "https://registry.npmjs.org/")
            .returning(|_, _| Ok(resolved("lodash", "4.17.21", "npm-registry")));

        let result =
            resolve_remote_version(&resolver, "lodash@latest", Path::new("/ws"), &registries())
                .await
                .unwrap();
        assert_eq!(result.version.as_deref(), Some("4.17.21"));
    }

    #[tokio::test]
    async fn test_invalid_version_retries_once_as_raw_preference() {
        let spec = "github:acme/widgets#main";
        let mut resolver = MockPackageResolver::new();
        let mut seq = Sequence::new();
        resolver
            .expect_resolve()
            .withf(|wanted, _| wanted.alias.is_some())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|wanted, _| {
                Err(ResolveError::InvalidVersion(wanted.pref.clone().unwrap_or_default()).into())
            });
        resolver
            .expect_resolve()
            .withf(move |wanted, _| wanted.alias.is_none() && wanted.pref.as_deref() == Some(spec))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| {
                Ok(ResolvedPackage {
                    manifest: Manifest::named("widgets").with_version("0.3.0"),
                    normalized_pref: Some("github:acme/widgets#abc123".to_string()),
                    resolved_via: "git-repository".to_string(),
                })
            });

        let result = resolve_remote_version(&resolver, spec, Path::new("/ws"), &registries())
            .await
            .unwrap();
        assert_eq!(result.version.as_deref(), Some("github:acme/widgets#abc123"));
        assert!(!result.is_semver);
        assert_eq!(result.resolved_via, "git-repository");
    }

    #[tokio::test]
    async fn test_other_failures_are_unresolved_references() {
        let mut resolver = MockPackageResolver::new();
        resolver
            .expect_resolve()
            .times(1)
            .returning(|_, _| Err(ResolveError::NotFound("nope@9.9.9".to_string()).into()));

        let err = resolve_remote_version(&resolver, "nope@9.9.9", Path::new("/ws"), &registries())
            .await
            .unwrap_err();
        match err.downcast_ref::<LinkError>() {
            Some(LinkError::UnresolvedReference { reference, reason }) => {
                assert_eq!(reference, "nope@9.9.9");
                assert!(reason.contains("No matching version"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_retry_is_not_retried_again() {
        let mut resolver = MockPackageResolver::new();
        resolver
            .expect_resolve()
            .times(2)
            .returning(|_, _| Err(ResolveError::InvalidVersion("x".to_string()).into()));

        let err = resolve_remote_version(&resolver, "./local/dir", Path::new("/ws"), &registries())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LinkError>(),
            Some(LinkError::UnresolvedReference { .. })
        ));
    }
}
