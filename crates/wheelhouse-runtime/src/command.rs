use crate::cancel::CancelToken;
use crate::RuntimeError;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use wheelhouse_schema::ExitCodePolicy;

/// A fully assembled helmfile invocation.
///
/// `argv[0]` is the resolved helmfile binary. Nothing outside this struct
/// influences how the process is started.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CommandSpec {
    pub argv: Vec<String>,
    pub working_dir: PathBuf,
    /// Extra environment variables layered over the inherited environment.
    pub env: Vec<(String, String)>,
    pub exit_code_policy: ExitCodePolicy,
}

impl CommandSpec {
    pub fn program(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.argv.join(" "))
    }
}

/// Result of one helmfile run, following the `--detailed-exitcode` convention.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Exit 0: nothing to apply.
    NoChange,
    /// Exit 2: changes were applied.
    Applied,
    /// Any other exit status. `code` is `None` when the process died from a signal.
    Failed { code: Option<i32>, stderr: String },
}

impl Outcome {
    pub fn from_exit(policy: ExitCodePolicy, code: Option<i32>, stderr: String) -> Self {
        match (policy, code) {
            (_, Some(0)) => Self::NoChange,
            (ExitCodePolicy::Detailed, Some(2)) => Self::Applied,
            _ => Self::Failed { code, stderr },
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoChange => f.write_str("no changes"),
            Self::Applied => f.write_str("changes applied"),
            Self::Failed { code: Some(code), .. } => write!(f, "failed with exit code {code}"),
            Self::Failed { code: None, .. } => f.write_str("terminated by signal"),
        }
    }
}

pub trait ToolRunner: Send + Sync {
    /// Run `spec` to completion, passing each stdout line to `on_stdout` as it
    /// arrives. Returns [`RuntimeError::Cancelled`] once `cancel` fires.
    fn run(
        &self,
        spec: &CommandSpec,
        cancel: &CancelToken,
        on_stdout: &mut dyn FnMut(&str),
    ) -> Result<Outcome, RuntimeError>;
}
