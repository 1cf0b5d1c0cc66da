use crate::config::{parse_config_file, ConfigError, ExitCodePolicy, RawConfig};
use crate::types::ToolVersion;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Chart-of-charts file used when `path` is left empty.
pub const DEFAULT_CHART_FILE: &str = "helmfile.yaml";

/// How a wrapped tool binary is obtained.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum ToolSelection {
    /// Neither a version nor a path was configured.
    #[default]
    Default,
    Pinned(ToolVersion),
    Explicit(PathBuf),
}

impl ToolSelection {
    fn from_fields(tool: &'static str, version: &str, bin: &str) -> Result<Self, ConfigError> {
        match (version.is_empty(), bin.is_empty()) {
            (false, false) => Err(ConfigError::ConflictingToolSelection { tool }),
            (false, true) => Ok(Self::Pinned(ToolVersion::new(version))),
            (true, false) => Ok(Self::Explicit(PathBuf::from(bin))),
            (true, true) => Ok(Self::Default),
        }
    }
}

/// Where the values template text comes from.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum TemplateSource {
    Inline(String),
    File(PathBuf),
}

/// Validated plugin configuration. Immutable once built and safe to share
/// between concurrent deployments.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PluginConfig {
    pub helmfile: ToolSelection,
    pub helm: ToolSelection,
    pub helm_diff: Option<ToolVersion>,
    pub chart_file: PathBuf,
    pub working_dir: Option<PathBuf>,
    pub namespace: Option<String>,
    pub selectors: Vec<String>,
    pub kube_context: Option<String>,
    pub values_template: TemplateSource,
    pub environment_template: Option<String>,
    pub allow_no_matching_release: bool,
    pub diff_context: Option<u32>,
    pub exit_code_policy: ExitCodePolicy,
}

impl RawConfig {
    /// Check cross-field constraints and resolve defaults.
    pub fn validate(&self) -> Result<PluginConfig, ConfigError> {
        let helmfile =
            ToolSelection::from_fields("helmfile", &self.helmfile_version, &self.helmfile_bin)?;
        let helm = ToolSelection::from_fields("helm", &self.helm_version, &self.helm_bin)?;

        let values_template = template_source(&self.values_template.data, &self.values_template.path)?;

        let diff_context = match self.diff_context {
            Some(n) if n < 0 => return Err(ConfigError::NegativeDiffContext(n)),
            Some(n) => Some(u32::try_from(n).map_err(|_| ConfigError::DiffContextTooLarge(n))?),
            None => None,
        };

        let chart_file = non_empty(&self.path).map_or_else(|| PathBuf::from(DEFAULT_CHART_FILE), PathBuf::from);

        // Selectors become one `-l` each, verbatim and in order.
        if let Some(index) = self.selectors.iter().position(|s| s.trim().is_empty()) {
            return Err(ConfigError::BlankSelector { index });
        }

        Ok(PluginConfig {
            helmfile,
            helm,
            helm_diff: non_empty(&self.helm_diff_version).map(ToolVersion::new),
            chart_file,
            working_dir: non_empty(&self.dir).map(PathBuf::from),
            namespace: non_empty(&self.namespace),
            selectors: self.selectors.clone(),
            kube_context: non_empty(&self.kube_context),
            values_template,
            environment_template: non_empty(&self.environment_template),
            allow_no_matching_release: self.allow_no_matching_release,
            diff_context,
            exit_code_policy: self.exit_code_policy,
        })
    }
}

impl PluginConfig {
    /// Working directory of the helmfile process for an application rooted at `app_path`.
    pub fn resolve_working_dir(&self, app_path: &Path) -> PathBuf {
        match &self.working_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => app_path.join(dir),
            None => app_path.to_path_buf(),
        }
    }
}

pub fn load_config_file(path: impl AsRef<Path>) -> Result<PluginConfig, ConfigError> {
    parse_config_file(path)?.validate()
}

fn template_source(data: &str, path: &str) -> Result<TemplateSource, ConfigError> {
    match (data.is_empty(), path.is_empty()) {
        (true, true) => Err(ConfigError::MissingTemplateSource),
        (false, false) => {
            warn!("both values_template.data and values_template.path are set; using path {path}");
            Ok(TemplateSource::File(PathBuf::from(path)))
        }
        (true, false) => Ok(TemplateSource::File(PathBuf::from(path))),
        (false, true) => Ok(TemplateSource::Inline(data.to_owned())),
    }
}

/// Empty means unset. Anything else is passed through untouched.
fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_owned())
    }
}
