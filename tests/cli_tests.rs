use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn project(dir: &std::path::Path, project: &str) -> std::path::PathBuf {
    std::fs::create_dir_all(dir.join("src")).unwrap();
    std::fs::write(dir.join("package.json"), r#"{ "name": "@acme/widgets", "version": "1.0.0" }"#).unwrap();
    std::fs::write(dir.join("src/index.js"), "export const answer = 42;\n").unwrap();
    let path = dir.join("libpack.json");
    std::fs::write(&path, project).unwrap();
    path
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("libpack").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Build publishable JavaScript/TypeScript library packages"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("libpack").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_init_command() {
    let temp_dir = TempDir::new().unwrap();

    let mut cmd = Command::cargo_bin("libpack").unwrap();
    cmd.arg("init")
        .arg("--output-dir")
        .arg(temp_dir.path())
        .assert()
        .success();

    // Check that config file was created
    let config_path = temp_dir.path().join("libpack.toml");
    assert!(config_path.exists());
    let content = std::fs::read_to_string(config_path).unwrap();
    assert!(content.contains("[tools]"));
}

#[test]
fn test_plan_command() {
    let temp_dir = TempDir::new().unwrap();
    let path = project(
        temp_dir.path(),
        r#"{ "bundles": [
            { "libraryTarget": "esm", "entry": "src/index.js" },
            { "libraryTarget": "umd", "entryRoot": "prevBundleOutput", "scriptTarget": "es5" }
        ] }"#,
    );

    let mut cmd = Command::cargo_bin("libpack").unwrap();
    cmd.arg("plan")
        .arg("--project")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("@acme/widgets 1.0.0"))
        .stdout(predicate::str::contains("src/index.js -> fesm2015/widgets.js"))
        .stdout(predicate::str::contains(
            "bundles[1] umd ES2015 -> ES5 via rollup: fesm2015/widgets.js -> bundles/widgets.umd.js [transform] [minify]",
        ));
}

#[test]
fn test_plan_rejects_dangling_chain() {
    let temp_dir = TempDir::new().unwrap();
    let path = project(
        temp_dir.path(),
        r#"{ "bundles": [ { "libraryTarget": "umd", "entryRoot": "prevBundleOutput" } ] }"#,
    );

    let mut cmd = Command::cargo_bin("libpack").unwrap();
    cmd.arg("plan")
        .arg("--project")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("prevBundleOutput"));
}

#[test]
fn test_build_missing_project() {
    let temp_dir = TempDir::new().unwrap();

    let mut cmd = Command::cargo_bin("libpack").unwrap();
    cmd.arg("build")
        .arg("--project")
        .arg(temp_dir.path().join("libpack.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Project file not found"));
}
