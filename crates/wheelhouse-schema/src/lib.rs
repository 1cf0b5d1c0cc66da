//! Plugin configuration model for wheelhouse.
//!
//! This crate parses the TOML plugin configuration (`RawConfig`), validates it
//! into an immutable `PluginConfig` where conflicting tool selections and
//! missing template sources cannot be represented, and defines the string
//! newtypes shared by the other crates.

pub mod config;
pub mod types;
pub mod validate;

pub use config::{
    parse_config_file, parse_config_str, ConfigError, ExitCodePolicy, RawConfig,
    ValuesTemplateSection,
};
pub use types::{ComponentId, DeploymentName, InvalidComponentId, ToolVersion};
pub use validate::{load_config_file, PluginConfig, TemplateSource, ToolSelection, DEFAULT_CHART_FILE};
