pub mod completions;
pub mod deploy;
pub mod doctor;
pub mod man_pages;
pub mod plan;
pub mod render;
pub mod validate;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use wheelhouse_core::{CoreError, GeneratedIdentity, HelmfilePlatform, Platform, Step, Ui};
use wheelhouse_runtime::{ProcessRunner, ToolCache};

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;
pub const EXIT_DEPLOY_FAILED: u8 = 3;
pub const EXIT_CANCELLED: u8 = 130;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("valid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✗ {msg}"));
}

pub fn colorize_outcome(outcome: &str) -> String {
    use console::Style;
    match outcome {
        "changes applied" => Style::new().green().bold().apply_to(outcome).to_string(),
        "no changes" => Style::new().dim().apply_to(outcome).to_string(),
        other => Style::new().red().apply_to(other).to_string(),
    }
}

/// Terminal progress: one spinner per step, helmfile output printed above them.
#[derive(Default)]
pub struct SpinnerUi {
    multi: MultiProgress,
}

impl SpinnerUi {
    pub fn new() -> Self {
        Self::default()
    }
}

struct SpinnerStep {
    pb: ProgressBar,
    message: String,
}

impl Step for SpinnerStep {
    fn update(&mut self, message: &str) {
        self.pb.set_message(message.to_owned());
    }

    fn done(self: Box<Self>) {
        spin_ok(&self.pb, &self.message);
    }

    fn abort(self: Box<Self>) {
        spin_fail(&self.pb, &self.message);
    }
}

impl Ui for SpinnerUi {
    fn step(&self, message: &str) -> Box<dyn Step + '_> {
        let pb = self.multi.add(spinner(message));
        Box::new(SpinnerStep {
            pb,
            message: message.trim_end_matches("...").to_owned(),
        })
    }

    fn output(&self, line: &str) {
        let _ = self.multi.println(line);
    }
}

pub fn tool_cache_root(explicit: Option<&Path>) -> Result<PathBuf, String> {
    explicit
        .map(Path::to_path_buf)
        .or_else(ToolCache::default_root)
        .ok_or_else(|| "cannot determine tool cache directory; pass --tool-cache".to_owned())
}

/// Load `config_path` and build a configured platform backed by real processes.
pub fn configured_platform(
    config_path: &Path,
    tool_cache: Option<&Path>,
) -> Result<HelmfilePlatform, String> {
    let raw = wheelhouse_schema::parse_config_file(config_path)
        .map_err(|e| format!("config error: {}: {e}", config_path.display()))?;
    let mut platform = HelmfilePlatform::new(
        Arc::new(ToolCache::new(tool_cache_root(tool_cache)?)),
        Arc::new(ProcessRunner::new()),
        Arc::new(GeneratedIdentity::new()),
    );
    platform.configure(&raw).map_err(|e| e.to_string())?;
    debug!("loaded configuration from {}", config_path.display());
    Ok(platform)
}

pub fn exit_code_for(err: &CoreError) -> u8 {
    if err.is_cancelled() {
        EXIT_CANCELLED
    } else if matches!(err, CoreError::Config(_)) {
        EXIT_CONFIG_ERROR
    } else {
        EXIT_DEPLOY_FAILED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_pretty_serializes_string() {
        let val = serde_json::json!({"key": "value"});
        let result = json_pretty(&val).unwrap();
        assert!(result.contains("\"key\""));
        assert!(result.contains("\"value\""));
    }

    #[test]
    fn colorize_outcome_keeps_text() {
        assert!(colorize_outcome("changes applied").contains("changes applied"));
        assert!(colorize_outcome("no changes").contains("no changes"));
        assert!(colorize_outcome("failed").contains("failed"));
    }

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_FAILURE,
            EXIT_CONFIG_ERROR,
            EXIT_DEPLOY_FAILED,
            EXIT_CANCELLED,
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn core_errors_map_to_exit_codes() {
        assert_eq!(exit_code_for(&CoreError::Cancelled), EXIT_CANCELLED);
        assert_eq!(
            exit_code_for(&CoreError::Config(
                wheelhouse_schema::ConfigError::MissingTemplateSource
            )),
            EXIT_CONFIG_ERROR
        );
        assert_eq!(
            exit_code_for(&CoreError::Subprocess {
                code: Some(1),
                stderr: String::new()
            }),
            EXIT_DEPLOY_FAILED
        );
    }

    #[test]
    fn explicit_tool_cache_wins() {
        let root = tool_cache_root(Some(Path::new("/srv/tools"))).unwrap();
        assert_eq!(root, PathBuf::from("/srv/tools"));
    }

    #[test]
    fn missing_config_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = configured_platform(&dir.path().join("wheelhouse.toml"), Some(dir.path()))
            .err()
            .unwrap();
        assert!(err.starts_with("config error:"));
    }

    #[test]
    fn spinner_ui_steps_finish() {
        let ui = SpinnerUi::new();
        let mut step = ui.step("Rendering values template...");
        step.update("still rendering");
        step.done();
        ui.step("Executing helmfile apply...").abort();
        ui.output("UPDATED RELEASES:");
    }
}
