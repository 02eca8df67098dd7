use assert_cmd::Command;
use assert_cmd::cargo;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn complink() -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("complink"));
    cmd.env_remove("COMPLINK_ROOT")
        .env_remove("COMPLINK_DEFAULT_SCOPE")
        .env("RUST_LOG", "warn");
    cmd
}

fn write_manifests(dir: &Path, json: &str) -> std::path::PathBuf {
    let path = dir.join("manifests.json");
    fs::write(&path, json).unwrap();
    path
}

#[test]
fn test_group_prints_chunks_in_dependency_order() {
    let dir = tempdir().unwrap();
    let manifests = write_manifests(
        dir.path(),
        r#"{
            "/ws/apps/shop": { "name": "@acme/shop", "dependencies": { "@acme/ui.button": "^1.0.0" } },
            "/ws/components/button": { "name": "@acme/ui.button", "version": "1.2.0" },
            "/ws/components/theme": { "name": "@acme/ui.theme" }
        }"#,
    );

    complink()
        .arg("group")
        .arg("--manifests")
        .arg(&manifests)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "chunk 0:\n  /ws/components/button (@acme/ui.button)\n  /ws/components/theme (@acme/ui.theme)\n",
        ))
        .stdout(predicate::str::contains("chunk 1:\n  /ws/apps/shop (@acme/shop)\n"));
}

#[test]
fn test_group_fails_on_cycle() {
    let dir = tempdir().unwrap();
    let manifests = write_manifests(
        dir.path(),
        r#"{
            "/ws/a": { "name": "a", "dependencies": { "b": "workspace:*" } },
            "/ws/b": { "name": "b", "devDependencies": { "a": "workspace:*" } }
        }"#,
    );

    complink()
        .arg("group")
        .arg("--manifests")
        .arg(&manifests)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cyclic dependency"))
        .stdout(predicate::str::contains("chunk").not());
}

#[test]
fn test_group_missing_file_fails() {
    let dir = tempdir().unwrap();
    complink()
        .arg("group")
        .arg("--manifests")
        .arg(dir.path().join("nope.json"))
        .assert()
        .failure();
}

#[cfg(unix)]
mod link {
    use super::*;

    fn setup_workspace(ws: &Path) -> std::path::PathBuf {
        let button = ws.join("components").join("button");
        fs::create_dir_all(button.join("src")).unwrap();
        fs::write(button.join("index.js"), "module.exports = require('./src/button');\n").unwrap();
        fs::write(button.join("src").join("button.js"), "module.exports = {};\n").unwrap();

        let components = ws.join("components.json");
        fs::write(
            &components,
            r#"[
                {
                    "id": { "scope": "acme.ui", "name": "button" },
                    "rootDir": "components/button",
                    "files": ["index.js", "src/button.js"]
                },
                { "id": { "name": "theme" }, "defaultScope": "acme.ui" }
            ]"#,
        )
        .unwrap();
        components
    }

    #[test]
    fn test_link_creates_links_and_manifest_idempotently() {
        let dir = tempdir().unwrap();
        let ws = dir.path();
        let components = setup_workspace(ws);

        for _ in 0..2 {
            complink()
                .arg("--root")
                .arg(ws)
                .arg("link")
                .arg("--components")
                .arg(&components)
                .assert()
                .success()
                .stdout(predicate::str::contains("acme.ui/button: 2 file(s) linked"))
                .stdout(predicate::str::contains("theme: 0 file(s) linked"));
        }

        let package_dir = ws.join("node_modules").join("@acme").join("ui.button");
        let index = package_dir.join("index.js");
        assert!(fs::symlink_metadata(&index).unwrap().file_type().is_symlink());
        assert_eq!(
            fs::canonicalize(&index).unwrap(),
            fs::canonicalize(ws.join("components/button/index.js")).unwrap()
        );
        assert!(package_dir.join("src").join("button.js").exists());

        let manifest: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(package_dir.join("package.json")).unwrap())
                .unwrap();
        assert_eq!(manifest["name"], "@acme/ui.button");
        assert_eq!(manifest["main"], "index.js");
        assert!(manifest.get("version").is_none());

        let theme = ws.join("node_modules/@acme/ui.theme/package.json");
        assert!(theme.exists());
    }

    #[test]
    fn test_link_conflict_leaves_existing_link_untouched() {
        let dir = tempdir().unwrap();
        let ws = dir.path();
        let components = setup_workspace(ws);

        let other = ws.join("elsewhere.js");
        fs::write(&other, "// not the button\n").unwrap();
        let package_dir = ws.join("node_modules").join("@acme").join("ui.button");
        fs::create_dir_all(&package_dir).unwrap();
        std::os::unix::fs::symlink(&other, package_dir.join("index.js")).unwrap();

        complink()
            .arg("--root")
            .arg(ws)
            .arg("link")
            .arg("--components")
            .arg(&components)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Link conflict"));

        assert_eq!(fs::read_link(package_dir.join("index.js")).unwrap(), other);
    }

    #[test]
    fn test_link_replaces_stale_plain_file() {
        let dir = tempdir().unwrap();
        let ws = dir.path();
        let components = setup_workspace(ws);

        let package_dir = ws.join("node_modules").join("@acme").join("ui.button");
        fs::create_dir_all(&package_dir).unwrap();
        fs::write(package_dir.join("index.js"), "// copied by an older install\n").unwrap();

        complink()
            .arg("--root")
            .arg(ws)
            .arg("link")
            .arg("--components")
            .arg(&components)
            .assert()
            .success();

        assert!(
            fs::symlink_metadata(package_dir.join("index.js"))
                .unwrap()
                .file_type()
                .is_symlink()
        );
    }

    #[test]
    fn test_link_uses_default_scope_from_env() {
        let dir = tempdir().unwrap();
        let ws = dir.path();
        fs::create_dir_all(ws.join("lib")).unwrap();
        fs::write(ws.join("lib/index.js"), "").unwrap();
        let components = ws.join("components.json");
        fs::write(
            &components,
            r#"[{ "id": { "name": "strings" }, "rootDir": "lib", "files": ["index.js"] }]"#,
        )
        .unwrap();

        complink()
            .env("COMPLINK_DEFAULT_SCOPE", "tools")
            .arg("--root")
            .arg(ws)
            .arg("link")
            .arg("--components")
            .arg(&components)
            .assert()
            .success();

        assert!(ws.join("node_modules/@bit/tools.strings/index.js").exists());
    }
}
