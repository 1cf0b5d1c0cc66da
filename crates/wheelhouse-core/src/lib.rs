//! Deployment orchestration for wheelhouse.
//!
//! This crate ties together the validated plugin configuration, the values and
//! environment-name template renderer, helmfile argument assembly, and the
//! process runner into `HelmfilePlatform`, the implementation of the
//! `configure`/`deploy` contract. It also provides the per-deployment stage
//! state machine, progress reporting, deployment identities, and Ctrl-C wiring.

pub mod command;
pub mod concurrency;
pub mod identity;
pub mod lifecycle;
pub mod platform;
pub mod progress;
pub mod render;
pub mod request;

pub use command::{build_args, build_command, resolve_binaries, CommandError, ResolvedBinaries};
pub use concurrency::{install_signal_handler, shutdown_requested};
pub use identity::{deployment_name, FixedIdentity, GeneratedIdentity, IdentityError, IdentitySource};
pub use lifecycle::{validate_transition, DeployStage};
pub use platform::{HelmfilePlatform, JobContext, Plan, Platform, RenderedArtifacts};
pub use progress::{LogUi, NoopUi, RecordingUi, Step, Ui, UiEvent};
pub use render::{normalize_go_syntax, render_inline, RenderError, RenderWorkspace, TemplateContext, TemplateOrigin};
pub use request::{DeploymentRequest, DeploymentResult, ImageRef, InvalidImageRef};

use thiserror::Error;
use wheelhouse_runtime::RuntimeError;
use wheelhouse_schema::ConfigError;

/// Coarse classification of a [`CoreError`], for hosts that map failures onto
/// status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    InvalidArgument,
    FailedPrecondition,
    Internal,
    Cancelled,
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("plugin has not been configured")]
    NotConfigured,
    #[error("component must have an ID: {0}")]
    IdentityUnavailable(String),
    #[error("rendering values template: {0}")]
    ValuesTemplate(#[source] RenderError),
    #[error("rendering environment_template: {0}")]
    EnvironmentTemplate(#[source] RenderError),
    #[error("failed fetching required binaries: {0}")]
    BinaryResolution(#[source] RuntimeError),
    #[error("assembling helmfile command: {0}")]
    Command(#[from] CommandError),
    #[error("helmfile {}: {}", exit_label(.code), .stderr.trim_end())]
    Subprocess { code: Option<i32>, stderr: String },
    #[error("deployment cancelled")]
    Cancelled,
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
    #[error("invalid stage transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with code {code}"),
        None => "was terminated by a signal".to_owned(),
    }
}

impl CoreError {
    pub fn status(&self) -> StatusClass {
        match self {
            Self::Config(_) | Self::ValuesTemplate(RenderError::Parse { .. }) => {
                StatusClass::InvalidArgument
            }
            Self::NotConfigured
            | Self::IdentityUnavailable(_)
            | Self::ValuesTemplate(RenderError::NotAFile { .. } | RenderError::Stat { .. })
            | Self::EnvironmentTemplate(_)
            | Self::BinaryResolution(_) => StatusClass::FailedPrecondition,
            Self::Cancelled | Self::Runtime(RuntimeError::Cancelled) => StatusClass::Cancelled,
            _ => StatusClass::Internal,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.status() == StatusClass::Cancelled
    }
}
