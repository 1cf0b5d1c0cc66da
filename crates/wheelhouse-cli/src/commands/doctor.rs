use super::{tool_cache_root, EXIT_FAILURE, EXIT_SUCCESS};
use std::path::Path;
use wheelhouse_core::resolve_binaries;
use wheelhouse_runtime::{check_path_prereqs, format_missing, Tool, ToolCache};
use wheelhouse_schema::{load_config_file, PluginConfig, TemplateSource, ToolSelection};

pub fn run(config_path: &Path, tool_cache: Option<&Path>, json_output: bool) -> Result<u8, String> {
    let mut checks: Vec<Check> = Vec::new();
    let mut all_pass = true;

    let cache = check_tool_cache(tool_cache, &mut checks);

    match load_config_file(config_path) {
        Ok(config) => {
            checks.push(Check::pass(
                "config",
                &format!("Configuration {} is valid", config_path.display()),
            ));
            check_values_template(&config, &mut checks, &mut all_pass);
            match &cache {
                Some(cache) => check_binaries(&config, cache, &mut checks, &mut all_pass),
                None => check_prereqs(&mut checks, &mut all_pass),
            }
        }
        Err(e) => {
            all_pass = false;
            checks.push(Check::fail(
                "config",
                &format!("Configuration {}: {e}", config_path.display()),
            ));
            check_prereqs(&mut checks, &mut all_pass);
        }
    }

    print_results(&checks, all_pass, json_output)
}

fn check_tool_cache(explicit: Option<&Path>, checks: &mut Vec<Check>) -> Option<ToolCache> {
    match tool_cache_root(explicit) {
        Ok(root) if root.is_dir() => {
            checks.push(Check::pass(
                "tool_cache",
                &format!("Tool cache at {}", root.display()),
            ));
            Some(ToolCache::new(root))
        }
        Ok(root) => {
            checks.push(Check::info(
                "tool_cache",
                &format!(
                    "Tool cache {} does not exist (only needed for pinned versions)",
                    root.display()
                ),
            ));
            Some(ToolCache::new(root))
        }
        Err(e) => {
            checks.push(Check::warn("tool_cache", &e));
            None
        }
    }
}

fn check_prereqs(checks: &mut Vec<Check>, all_pass: &mut bool) {
    let missing = check_path_prereqs(&[Tool::Helmfile, Tool::Helm]);
    if missing.is_empty() {
        checks.push(Check::pass("prereqs", "helmfile and helm found on PATH"));
    } else {
        *all_pass = false;
        checks.push(Check::fail("prereqs", &format_missing(&missing)));
    }
}

fn check_values_template(config: &PluginConfig, checks: &mut Vec<Check>, all_pass: &mut bool) {
    match &config.values_template {
        TemplateSource::Inline(_) => {
            checks.push(Check::info("values_template", "Values template is inline"));
        }
        TemplateSource::File(path) if path.is_file() => checks.push(Check::pass(
            "values_template",
            &format!("Values template {} exists", path.display()),
        )),
        TemplateSource::File(path) => {
            *all_pass = false;
            checks.push(Check::fail(
                "values_template",
                &format!("Values template {} is not a readable file", path.display()),
            ));
        }
    }
}

fn check_binaries(
    config: &PluginConfig,
    cache: &ToolCache,
    checks: &mut Vec<Check>,
    all_pass: &mut bool,
) {
    match resolve_binaries(config, cache) {
        Ok(bins) => {
            checks.push(Check::pass(
                "helmfile",
                &format!("helmfile: {}", bins.helmfile.display()),
            ));
            match (&config.helm, &bins.helm) {
                (ToolSelection::Default, _) => {
                    if check_path_prereqs(&[Tool::Helm]).is_empty() {
                        checks.push(Check::pass("helm", "helm found on PATH"));
                    } else {
                        checks.push(Check::warn(
                            "helm",
                            "helm not found on PATH; helmfile will fail unless helm_bin or helm_version is set",
                        ));
                    }
                }
                (_, Some(helm)) => {
                    checks.push(Check::pass("helm", &format!("helm: {}", helm.display())));
                }
                (_, None) => {}
            }
            if let Some(plugins) = &bins.helm_plugins {
                checks.push(Check::pass(
                    "helm_diff",
                    &format!("helm-diff plugin: {}", plugins.display()),
                ));
            }
        }
        Err(e) => {
            *all_pass = false;
            checks.push(Check::fail("binaries", &format!("Binary resolution failed: {e}")));
        }
    }
}

fn print_results(checks: &[Check], all_pass: bool, json_output: bool) -> Result<u8, String> {
    if json_output {
        let json = serde_json::json!({
            "healthy": all_pass,
            "checks": checks.iter().map(|c| serde_json::json!({
                "name": c.name,
                "status": c.status,
                "message": c.message,
            })).collect::<Vec<_>>(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&json).map_err(|e| e.to_string())?
        );
    } else {
        println!("Wheelhouse Doctor\n");
        for check in checks {
            let icon = match check.status.as_str() {
                "pass" => "✓",
                "fail" => "✗",
                "warn" => "⚠",
                _ => "ℹ",
            };
            println!("  {icon} {}", check.message);
        }
        println!();
        if all_pass {
            println!("All checks passed.");
        } else {
            println!("Some checks failed. See above for details.");
        }
    }
    Ok(if all_pass { EXIT_SUCCESS } else { EXIT_FAILURE })
}

struct Check {
    name: String,
    status: String,
    message: String,
}

impl Check {
    fn new(name: &str, status: &str, message: &str) -> Self {
        Self {
            name: name.to_owned(),
            status: status.to_owned(),
            message: message.to_owned(),
        }
    }

    fn pass(name: &str, message: &str) -> Self {
        Self::new(name, "pass", message)
    }

    fn fail(name: &str, message: &str) -> Self {
        Self::new(name, "fail", message)
    }

    fn warn(name: &str, message: &str) -> Self {
        Self::new(name, "warn", message)
    }

    fn info(name: &str, message: &str) -> Self {
        Self::new(name, "info", message)
    }
}
