//! `package.json` as read by the installer and written by the synthesizer.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Prefix of dependency ranges that point into the workspace.
pub const WORKSPACE_PROTOCOL: &str = "workspace:";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct DependencyMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub injected: Option<bool>,
}

/// A package manifest. Fields the linker does not interpret are preserved
/// in `extra`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<String>,
    /// `None` when the section is absent; an empty map is kept as written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dev_dependencies: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub peer_dependencies: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub optional_dependencies: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies_meta: BTreeMap<String, DependencyMeta>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Manifest {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_dependency(mut self, name: impl Into<String>, range: impl Into<String>) -> Self {
        self.add_dependency(name, range);
        self
    }

    /// Insert into `dependencies`, creating the section if needed.
    pub fn add_dependency(&mut self, name: impl Into<String>, range: impl Into<String>) {
        self.dependencies
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), range.into());
    }

    pub fn dependency(&self, name: &str) -> Option<&str> {
        self.dependencies
            .as_ref()
            .and_then(|deps| deps.get(name))
            .map(String::as_str)
    }

    /// All declared dependency names with their ranges, across every
    /// dependency section.
    pub fn all_dependencies(&self) -> impl Iterator<Item = (&String, &String)> {
        self.dependencies
            .iter()
            .flatten()
            .chain(self.dev_dependencies.iter())
            .chain(self.optional_dependencies.iter())
            .chain(self.peer_dependencies.iter())
    }

    /// Set or replace an arbitrary top-level property.
    pub fn set_property(&mut self, key: &str, value: Value) {
        match key {
            "main" => self.main = value.as_str().map(str::to_string),
            "types" => self.types = value.as_str().map(str::to_string),
            "version" => self.version = value.as_str().map(str::to_string),
            "name" => self.name = value.as_str().map(str::to_string),
            _ => {
                self.extra.insert(key.to_string(), value);
            }
        }
    }

    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_manifest_round_trips_unknown_fields() {
        let raw = r#"{
            "name": "@acme/ui.button",
            "version": "1.2.3",
            "scripts": { "build": "tsc" },
            "dependenciesMeta": { "@acme/ui.icon": { "injected": true } }
        }"#;
        let manifest: Manifest = serde_json::from_str(raw).unwrap();
        assert_eq!(manifest.name.as_deref(), Some("@acme/ui.button"));
        assert_eq!(manifest.extra["scripts"], json!({ "build": "tsc" }));
        assert_eq!(
            manifest.dependencies_meta["@acme/ui.icon"].injected,
            Some(true)
        );

        let value = serde_json::to_value(&manifest).unwrap();
        assert_eq!(value["scripts"]["build"], "tsc");
        assert!(value.get("dependencies").is_none());
    }

    #[test]
    fn test_empty_dependencies_section_is_kept_apart_from_absent() {
        let empty: Manifest = serde_json::from_str(r#"{ "name": "a", "dependencies": {} }"#).unwrap();
        assert_eq!(empty.dependencies, Some(BTreeMap::new()));
        assert_eq!(serde_json::to_value(&empty).unwrap()["dependencies"], json!({}));

        let absent: Manifest = serde_json::from_str(r#"{ "name": "a" }"#).unwrap();
        assert!(absent.dependencies.is_none());
        assert!(absent.dependency("b").is_none());
    }

    #[test]
    fn test_all_dependencies_spans_sections() {
        let mut manifest = Manifest::named("a").with_dependency("b", "workspace:*");
        manifest.dev_dependencies.insert("c".into(), "^1.0.0".into());
        manifest.peer_dependencies.insert("d".into(), "*".into());
        let names: Vec<&str> = manifest.all_dependencies().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["b", "c", "d"]);
    }

    #[test]
    fn test_set_property_routes_known_keys() {
        let mut manifest = Manifest::named("a");
        manifest.set_property("types", json!("_src/index.ts"));
        manifest.set_property("sideEffects", json!(false));
        assert_eq!(manifest.types.as_deref(), Some("_src/index.ts"));
        assert_eq!(manifest.extra["sideEffects"], json!(false));
    }
}
