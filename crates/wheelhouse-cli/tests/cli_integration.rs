//! CLI subprocess integration tests.
//!
//! These tests invoke the `wheelhouse` binary as a subprocess and verify
//! exit codes, stdout content, and JSON output stability.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn wheelhouse_bin(cache: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_wheelhouse"));
    cmd.arg("--tool-cache").arg(cache);
    cmd.env_remove("WHEELHOUSE_LOG");
    cmd
}

fn write_config(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("wheelhouse.toml");
    std::fs::write(&path, content).unwrap();
    path
}

const SCENARIO: &str = r#"
helmfile_bin = "/opt/helmfile"
namespace = "prod"
selectors = ["tier=web"]
environment_template = "{{ .Workspace }}"

[values_template]
data = "img: {{.Input.DockerImageName}}:{{.Input.DockerImageTag}}"
"#;

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn cli_version_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let output = wheelhouse_bin(dir.path()).arg("--version").output().unwrap();
    assert!(output.status.success(), "wheelhouse --version must exit 0");
    assert!(stdout(&output).contains("wheelhouse"));
}

#[test]
fn cli_help_lists_commands() {
    let dir = tempfile::tempdir().unwrap();
    let output = wheelhouse_bin(dir.path()).arg("--help").output().unwrap();
    assert!(output.status.success());
    let out = stdout(&output);
    for cmd in ["deploy", "validate", "render", "plan", "doctor"] {
        assert!(out.contains(cmd), "help must list '{cmd}': {out}");
    }
}

#[test]
fn validate_accepts_good_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), SCENARIO);
    let output = wheelhouse_bin(dir.path())
        .args(["--json", "validate", "--config"])
        .arg(&config)
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["valid"], true);
    assert_eq!(json["config"]["namespace"], "prod");
    assert_eq!(json["config"]["selectors"][0], "tier=web");
}

#[test]
fn validate_rejects_conflicting_tools_with_config_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        "helmfile_version = \"0.162.0\"\nhelmfile_bin = \"/opt/helmfile\"\n[values_template]\ndata = \"a: 1\"\n",
    );
    let output = wheelhouse_bin(dir.path())
        .args(["validate", "--config"])
        .arg(&config)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("helmfile_bin and helmfile_version cannot be set concurrently"));
}

#[test]
fn validate_rejects_missing_template_source() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "namespace = \"prod\"\n");
    let output = wheelhouse_bin(dir.path())
        .args(["validate", "--config"])
        .arg(&config)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("values_template"));
}

#[test]
fn missing_config_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = wheelhouse_bin(dir.path())
        .args(["validate", "--config"])
        .arg(dir.path().join("absent.toml"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).starts_with("error: config error:"));
}

#[test]
fn render_prints_values_and_environment() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), SCENARIO);
    let output = wheelhouse_bin(dir.path())
        .args(["render", "--app", "web", "--image", "web:v1", "--workspace", "staging", "--config"])
        .arg(&config)
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("img: web:v1"), "{out}");
    assert!(out.contains("# environment: staging"), "{out}");
}

#[test]
fn plan_json_shows_argument_order() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), SCENARIO);
    let output = wheelhouse_bin(dir.path())
        .args(["--json", "plan", "--app", "web", "--image", "web:v1", "--config"])
        .arg(&config)
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let argv: Vec<String> = json["command"]["argv"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_owned())
        .collect();
    assert_eq!(argv[0], "/opt/helmfile");
    assert_eq!(argv[1..3], ["-f", "helmfile.yaml"]);
    assert_eq!(argv[3], "--state-values-file");
    assert_eq!(argv[5..9], ["-n", "prod", "-l", "tier=web"]);
    assert_eq!(argv[9..11], ["-e", "default"]);
    assert_eq!(argv[11..], ["apply", "--detailed-exitcode", "--suppress-secrets"]);
}

#[test]
fn bad_image_reference_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), SCENARIO);
    let output = wheelhouse_bin(dir.path())
        .args(["plan", "--app", "web", "--image", "web:", "--config"])
        .arg(&config)
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(stderr(&output).contains("invalid image reference"));
}

#[test]
fn completions_bash_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let output = wheelhouse_bin(dir.path())
        .args(["completions", "bash"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(stdout(&output).contains("wheelhouse"));
}

#[test]
fn man_pages_written() {
    let dir = tempfile::tempdir().unwrap();
    let man = dir.path().join("man");
    let output = wheelhouse_bin(dir.path())
        .arg("man-pages")
        .arg(&man)
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(man.join("wheelhouse.1").exists());
    assert!(man.join("wheelhouse-deploy.1").exists());
}

#[test]
fn doctor_json_reports_checks() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), SCENARIO);
    let output = wheelhouse_bin(dir.path())
        .args(["--json", "doctor", "--config"])
        .arg(&config)
        .output()
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let checks = json["checks"].as_array().unwrap();
    assert!(checks.iter().any(|c| c["name"] == "config" && c["status"] == "pass"));
    assert!(checks.iter().any(|c| c["name"] == "helmfile"));
}

#[cfg(unix)]
mod with_fake_helmfile {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn fake_helmfile(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("helmfile");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn config_for(dir: &Path, helmfile: &Path) -> PathBuf {
        write_config(
            dir,
            &SCENARIO.replace("/opt/helmfile", &helmfile.display().to_string()),
        )
    }

    #[test]
    fn deploy_applied_changes() {
        let dir = tempfile::tempdir().unwrap();
        let helmfile = fake_helmfile(dir.path(), "echo 'UPDATED RELEASES:'\nexit 2");
        let config = config_for(dir.path(), &helmfile);
        let output = wheelhouse_bin(dir.path())
            .args(["--json", "deploy", "--app", "Web", "--image", "web:v1", "--config"])
            .arg(&config)
            .arg("--app-path")
            .arg(dir.path())
            .output()
            .unwrap();
        assert!(output.status.success(), "stderr: {}", stderr(&output));
        let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
        assert_eq!(json["outcome"], "applied");
        let name = json["name"].as_str().unwrap();
        let id = json["id"].as_str().unwrap();
        assert_eq!(name, format!("web-{}", id.to_lowercase()));
    }

    #[test]
    fn deploy_failure_exits_with_deploy_code() {
        let dir = tempfile::tempdir().unwrap();
        let helmfile = fake_helmfile(dir.path(), "echo 'Error: release web failed' >&2\nexit 7");
        let config = config_for(dir.path(), &helmfile);
        let output = wheelhouse_bin(dir.path())
            .args(["deploy", "--app", "web", "--image", "web:v1", "--config"])
            .arg(&config)
            .arg("--app-path")
            .arg(dir.path())
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(3));
        let err = stderr(&output);
        assert!(err.contains("exited with code 7"), "{err}");
        assert!(err.contains("release web failed"), "{err}");
    }

    #[test]
    fn deploy_timeout_cancels() {
        let dir = tempfile::tempdir().unwrap();
        let helmfile = fake_helmfile(dir.path(), "exec sleep 30");
        let config = config_for(dir.path(), &helmfile);
        let started = std::time::Instant::now();
        let output = wheelhouse_bin(dir.path())
            .args(["deploy", "--app", "web", "--image", "web:v1", "--timeout", "1", "--config"])
            .arg(&config)
            .arg("--app-path")
            .arg(dir.path())
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(130));
        assert!(started.elapsed() < std::time::Duration::from_secs(15));
        assert!(stderr(&output).contains("timed out after 1s"));
    }
}
