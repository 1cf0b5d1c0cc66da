use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("{tool}_bin and {tool}_version cannot be set concurrently")]
    ConflictingToolSelection { tool: &'static str },
    #[error("either values_template.data or values_template.path needs to be set")]
    MissingTemplateSource,
    #[error("diff_context must not be negative, got {0}")]
    NegativeDiffContext(i64),
    #[error("diff_context {0} is larger than {max}", max = u32::MAX)]
    DiffContextTooLarge(i64),
    #[error("selectors[{index}] is blank")]
    BlankSelector { index: usize },
}

/// Plugin configuration exactly as written by the user.
///
/// Every field is optional; [`RawConfig::validate`] turns this into a
/// [`crate::PluginConfig`] where conflicting combinations cannot be expressed.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    #[serde(default)]
    pub helmfile_version: String,
    #[serde(default)]
    pub helm_version: String,
    #[serde(default)]
    pub helm_diff_version: String,
    #[serde(default)]
    pub helmfile_bin: String,
    #[serde(default)]
    pub helm_bin: String,
    #[serde(default)]
    pub namespace: String,
    /// Path to the helmfile.yaml handed to `-f`.
    #[serde(default)]
    pub path: String,
    /// Working directory of the helmfile process. Relative to the application path.
    #[serde(default)]
    pub dir: String,
    #[serde(default)]
    pub selectors: Vec<String>,
    #[serde(default)]
    pub environment_template: String,
    #[serde(default)]
    pub values_template: ValuesTemplateSection,
    #[serde(default)]
    pub allow_no_matching_release: bool,
    #[serde(default)]
    pub kube_context: String,
    #[serde(default)]
    pub diff_context: Option<i64>,
    #[serde(default)]
    pub exit_code_policy: ExitCodePolicy,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ValuesTemplateSection {
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub path: String,
}

/// How the exit status of `helmfile apply --detailed-exitcode` is interpreted.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExitCodePolicy {
    /// 0 means nothing changed, 2 means changes were applied, anything else failed.
    #[default]
    Detailed,
    /// Only 0 counts as success.
    Strict,
}

pub fn parse_config_str(input: &str) -> Result<RawConfig, ConfigError> {
    Ok(toml::from_str(input)?)
}

pub fn parse_config_file(path: impl AsRef<Path>) -> Result<RawConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config_str(&content)
}
