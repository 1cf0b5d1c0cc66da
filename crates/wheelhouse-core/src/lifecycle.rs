use crate::CoreError;
use serde::Serialize;
use std::fmt;

/// Stages of a single deployment, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployStage {
    Start,
    ResolveIdentity,
    RenderValues,
    RenderEnvironmentName,
    ResolveBinaries,
    BuildArgs,
    Execute,
    AssembleResult,
    Failed,
}

impl DeployStage {
    /// The stage that follows a successful `self`.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Start => Some(Self::ResolveIdentity),
            Self::ResolveIdentity => Some(Self::RenderValues),
            Self::RenderValues => Some(Self::RenderEnvironmentName),
            Self::RenderEnvironmentName => Some(Self::ResolveBinaries),
            Self::ResolveBinaries => Some(Self::BuildArgs),
            Self::BuildArgs => Some(Self::Execute),
            Self::Execute => Some(Self::AssembleResult),
            Self::AssembleResult | Self::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::AssembleResult | Self::Failed)
    }

    /// Progress message announced when the stage begins.
    pub fn step_message(self) -> Option<&'static str> {
        match self {
            Self::ResolveIdentity => Some("Resolving deployment identity..."),
            Self::RenderValues => Some("Rendering values template..."),
            Self::RenderEnvironmentName => Some("Rendering Helmfile environment name..."),
            Self::ResolveBinaries => Some("Setting up Helmfile runtime configuration..."),
            Self::BuildArgs => Some("Building helmfile command..."),
            Self::Execute => Some("Executing helmfile apply..."),
            Self::Start | Self::AssembleResult | Self::Failed => None,
        }
    }
}

impl fmt::Display for DeployStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Start => "start",
            Self::ResolveIdentity => "resolve_identity",
            Self::RenderValues => "render_values",
            Self::RenderEnvironmentName => "render_environment_name",
            Self::ResolveBinaries => "resolve_binaries",
            Self::BuildArgs => "build_args",
            Self::Execute => "execute",
            Self::AssembleResult => "assemble_result",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

pub fn validate_transition(from: DeployStage, to: DeployStage) -> Result<(), CoreError> {
    let valid = from.next() == Some(to) || (to == DeployStage::Failed && !from.is_terminal());

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
