//! Helmfile argument assembly.
//!
//! Flag order is fixed. helmfile treats repeated flags positionally, so
//! reordering the output of [`build_args`] changes behavior.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use wheelhouse_runtime::{BinaryResolver, CommandSpec, RuntimeError, Tool};
use wheelhouse_schema::{PluginConfig, ToolSelection};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),
}

/// Binaries located for one deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBinaries {
    pub helmfile: PathBuf,
    /// Passed as `--helm-binary` when set. `None` lets helmfile find helm itself.
    pub helm: Option<PathBuf>,
    /// Directory holding the pinned helm-diff plugin, exported as `HELM_PLUGINS`.
    pub helm_plugins: Option<PathBuf>,
}

pub fn resolve_binaries(
    config: &PluginConfig,
    resolver: &dyn BinaryResolver,
) -> Result<ResolvedBinaries, RuntimeError> {
    let helmfile = match &config.helmfile {
        ToolSelection::Explicit(path) => path.clone(),
        ToolSelection::Pinned(version) => resolver.resolve(Tool::Helmfile, Some(version))?,
        ToolSelection::Default => resolver.resolve(Tool::Helmfile, None)?,
    };
    let helm = match &config.helm {
        ToolSelection::Explicit(path) => Some(path.clone()),
        ToolSelection::Pinned(version) => Some(resolver.resolve(Tool::Helm, Some(version))?),
        ToolSelection::Default => None,
    };
    let helm_plugins = config
        .helm_diff
        .as_ref()
        .map(|version| resolver.resolve(Tool::HelmDiff, Some(version)))
        .transpose()?;

    debug!(
        "resolved helmfile={} helm={:?} helm_plugins={:?}",
        helmfile.display(),
        helm,
        helm_plugins
    );
    Ok(ResolvedBinaries {
        helmfile,
        helm,
        helm_plugins,
    })
}

/// Build the full argument vector, binary first.
pub fn build_args(
    config: &PluginConfig,
    binaries: &ResolvedBinaries,
    values_path: &Path,
    environment: &str,
) -> Result<Vec<String>, CommandError> {
    let mut args = vec![
        path_arg(&binaries.helmfile)?,
        "-f".to_owned(),
        path_arg(&config.chart_file)?,
        "--state-values-file".to_owned(),
        path_arg(values_path)?,
    ];

    if let Some(namespace) = &config.namespace {
        args.extend(["-n".to_owned(), namespace.clone()]);
    }
    for selector in &config.selectors {
        args.extend(["-l".to_owned(), selector.clone()]);
    }
    if let Some(context) = &config.kube_context {
        args.extend(["--kube-context".to_owned(), context.clone()]);
    }
    if config.allow_no_matching_release {
        args.push("--allow-no-matching-release".to_owned());
    }
    if let Some(helm) = &binaries.helm {
        args.extend(["--helm-binary".to_owned(), path_arg(helm)?]);
    }
    if !environment.is_empty() {
        args.extend(["-e".to_owned(), environment.to_owned()]);
    }

    args.extend(
        ["apply", "--detailed-exitcode", "--suppress-secrets"]
            .iter()
            .map(|s| (*s).to_owned()),
    );

    if let Some(n) = config.diff_context.filter(|n| *n > 0) {
        args.extend(["--context".to_owned(), n.to_string()]);
    }

    Ok(args)
}

/// Wrap [`build_args`] into a runnable [`CommandSpec`] for an application rooted at `app_path`.
pub fn build_command(
    config: &PluginConfig,
    binaries: &ResolvedBinaries,
    values_path: &Path,
    environment: &str,
    app_path: &Path,
) -> Result<CommandSpec, CommandError> {
    let argv = build_args(config, binaries, values_path, environment)?;
    let mut env = Vec::new();
    if let Some(plugins) = &binaries.helm_plugins {
        env.push(("HELM_PLUGINS".to_owned(), path_arg(plugins)?));
    }
    Ok(CommandSpec {
        argv,
        working_dir: config.resolve_working_dir(app_path),
        env,
        exit_code_policy: config.exit_code_policy,
    })
}

fn path_arg(path: &Path) -> Result<String, CommandError> {
    path.to_str()
        .map(str::to_owned)
        .ok_or_else(|| CommandError::NonUtf8Path(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wheelhouse_runtime::ToolCache;
    use wheelhouse_schema::{parse_config_str, ExitCodePolicy, ToolVersion};

    fn config(toml: &str) -> PluginConfig {
        parse_config_str(toml).unwrap().validate().unwrap()
    }

    fn binaries(helm: Option<&str>) -> ResolvedBinaries {
        ResolvedBinaries {
            helmfile: PathBuf::from("/opt/helmfile"),
            helm: helm.map(PathBuf::from),
            helm_plugins: None,
        }
    }

    #[test]
    fn minimal_args() {
        let cfg = config("[values_template]\ndata = \"a: 1\"\n");
        let args = build_args(&cfg, &binaries(None), Path::new("/tmp/w/values.yaml"), "").unwrap();
        assert_eq!(
            args,
            vec![
                "/opt/helmfile",
                "-f",
                "helmfile.yaml",
                "--state-values-file",
                "/tmp/w/values.yaml",
                "apply",
                "--detailed-exitcode",
                "--suppress-secrets",
            ]
        );
    }

    #[test]
    fn full_args_in_fixed_order() {
        let cfg = config(
            r#"
path = "deploy/helmfile.yaml"
namespace = "prod"
selectors = ["tier=web", "app=api"]
kube_context = "eu-1"
allow_no_matching_release = true
diff_context = 3
helm_bin = "/usr/local/bin/helm3"

[values_template]
data = "a: 1"
"#,
        );
        let bins = binaries(Some("/usr/local/bin/helm3"));
        let args = build_args(&cfg, &bins, Path::new("/tmp/w/values.yaml"), "staging").unwrap();
        assert_eq!(
            args,
            vec![
                "/opt/helmfile",
                "-f",
                "deploy/helmfile.yaml",
                "--state-values-file",
                "/tmp/w/values.yaml",
                "-n",
                "prod",
                "-l",
                "tier=web",
                "-l",
                "app=api",
                "--kube-context",
                "eu-1",
                "--allow-no-matching-release",
                "--helm-binary",
                "/usr/local/bin/helm3",
                "-e",
                "staging",
                "apply",
                "--detailed-exitcode",
                "--suppress-secrets",
                "--context",
                "3",
            ]
        );

        let again = build_args(&cfg, &bins, Path::new("/tmp/w/values.yaml"), "staging").unwrap();
        assert_eq!(args, again);
    }

    #[test]
    fn zero_diff_context_is_omitted() {
        let cfg = config("diff_context = 0\n[values_template]\ndata = \"a: 1\"\n");
        let args = build_args(&cfg, &binaries(None), Path::new("v.yaml"), "").unwrap();
        assert!(!args.iter().any(|a| a == "--context"));
        assert_eq!(args.last().map(String::as_str), Some("--suppress-secrets"));
    }

    #[test]
    fn explicit_binaries_are_used_verbatim() {
        let cfg = config(
            "helmfile_bin = \"/bin/hf\"\nhelm_bin = \"/bin/h\"\n[values_template]\ndata = \"a: 1\"\n",
        );
        let cache = ToolCache::new("/nonexistent");
        let bins = resolve_binaries(&cfg, &cache).unwrap();
        assert_eq!(bins.helmfile, PathBuf::from("/bin/hf"));
        assert_eq!(bins.helm, Some(PathBuf::from("/bin/h")));
        assert_eq!(bins.helm_plugins, None);
    }

    #[test]
    fn pinned_versions_resolve_through_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ToolCache::new(dir.path());
        for (tool, version) in [(Tool::Helmfile, "0.162.0"), (Tool::Helm, "3.14.2")] {
            let path = cache.binary_path(tool, &ToolVersion::new(version));
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, "").unwrap();
        }
        std::fs::create_dir_all(cache.binary_path(Tool::HelmDiff, &ToolVersion::new("3.9.5"))).unwrap();

        let cfg = config(
            "helmfile_version = \"0.162.0\"\nhelm_version = \"3.14.2\"\nhelm_diff_version = \"3.9.5\"\n[values_template]\ndata = \"a: 1\"\n",
        );
        let bins = resolve_binaries(&cfg, &cache).unwrap();
        assert!(bins.helmfile.ends_with("helmfile/0.162.0/helmfile"));
        assert!(bins.helm.unwrap().ends_with("helm/3.14.2/helm"));
        assert!(bins.helm_plugins.unwrap().ends_with("helm-diff/3.9.5"));
    }

    #[test]
    fn unprovisioned_pin_fails() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ToolCache::new(dir.path());
        let cfg = config("helmfile_version = \"9.9.9\"\n[values_template]\ndata = \"a: 1\"\n");
        assert!(matches!(
            resolve_binaries(&cfg, &cache),
            Err(RuntimeError::ToolNotProvisioned { .. })
        ));
    }

    #[test]
    fn command_spec_carries_env_and_working_dir() {
        let cfg = config(
            "dir = \"deploy\"\nexit_code_policy = \"strict\"\n[values_template]\ndata = \"a: 1\"\n",
        );
        let mut bins = binaries(None);
        bins.helm_plugins = Some(PathBuf::from("/cache/helm-diff/3.9.5"));
        let spec = build_command(&cfg, &bins, Path::new("/tmp/v.yaml"), "", Path::new("/src/app")).unwrap();
        assert_eq!(spec.working_dir, PathBuf::from("/src/app/deploy"));
        assert_eq!(
            spec.env,
            vec![("HELM_PLUGINS".to_owned(), "/cache/helm-diff/3.9.5".to_owned())]
        );
        assert_eq!(spec.exit_code_policy, ExitCodePolicy::Strict);
        assert_eq!(spec.program(), Some("/opt/helmfile"));
    }
}
