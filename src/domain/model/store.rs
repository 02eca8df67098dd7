//! Registry and package-store configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const NPM_REGISTRY: &str = "https://registry.npmjs.org/";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub struct Registry {
    pub uri: String,
    #[serde(default)]
    pub always_auth: bool,
}

impl Registry {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            always_auth: false,
        }
    }
}

/// Default registry plus per-scope registries (scope names without `@`).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub struct Registries {
    pub default_registry: Registry,
    #[serde(default)]
    pub scopes: BTreeMap<String, Registry>,
}

impl Registries {
    /// Map handed to the package manager: `default` plus `@scope` keys.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        let default = if self.default_registry.uri.is_empty() {
            NPM_REGISTRY.to_string()
        } else {
            self.default_registry.uri.clone()
        };
        map.insert("default".to_string(), default);
        for (scope, registry) in &self.scopes {
            map.insert(format!("@{}", scope), registry.uri.clone());
        }
        map
    }

    /// Registry serving `package_name`: its scope's registry when configured,
    /// the default otherwise.
    pub fn pick_for_package(&self, package_name: &str) -> String {
        let map = self.to_map();
        if let Some(scope) = package_name
            .strip_prefix('@')
            .and_then(|rest| rest.split_once('/'))
            .map(|(scope, _)| format!("@{}", scope))
        {
            if let Some(uri) = map.get(&scope) {
                return uri.clone();
            }
        }
        map["default"].clone()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    pub http_proxy: Option<String>,
    pub https_proxy: Option<String>,
    pub no_proxy: Option<String>,
    pub ca: Option<String>,
    pub cert: Option<String>,
    pub key: Option<String>,
    pub strict_ssl: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub local_address: Option<String>,
    pub max_sockets: Option<u32>,
    pub network_concurrency: Option<u32>,
    pub fetch_timeout_ms: Option<u64>,
    pub fetch_retries: Option<u32>,
}

/// Everything that identifies a store controller. Two equal configs share
/// one controller.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    pub root_dir: PathBuf,
    pub store_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub registries: Registries,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}
