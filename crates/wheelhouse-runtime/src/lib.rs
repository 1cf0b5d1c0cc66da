//! Execution layer for wheelhouse.
//!
//! This crate runs the assembled helmfile command: the `ToolRunner` trait with a
//! real subprocess implementation (`ProcessRunner`) and a scripted one
//! (`MockRunner`), cancellation tokens, exit-code interpretation, resolution of
//! pinned tool versions from a local cache, and prerequisite checking.

pub mod cancel;
pub mod command;
pub mod mock;
pub mod prereq;
pub mod process;
pub mod tools;

pub use cancel::CancelToken;
pub use command::{CommandSpec, Outcome, ToolRunner};
pub use mock::{MockCall, MockRunner};
pub use prereq::{check_path_prereqs, format_missing, MissingPrereq};
pub use process::ProcessRunner;
pub use tools::{find_on_path, BinaryResolver, Tool, ToolCache};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("command has no program to run")]
    EmptyCommand,
    #[error("execution cancelled")]
    Cancelled,
    #[error("{0} not found on PATH")]
    ToolNotFound(String),
    #[error("{tool} {version} is not provisioned (expected {})", path.display())]
    ToolNotProvisioned {
        tool: String,
        version: String,
        path: PathBuf,
    },
    #[error("runtime execution failed: {0}")]
    ExecFailed(String),
}
