use crate::RuntimeError;
use std::fmt;
use std::path::{Path, PathBuf};
use wheelhouse_schema::ToolVersion;

/// External tools a deployment may need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Helmfile,
    Helm,
    /// The helm-diff plugin. Resolves to a plugin directory, not an executable.
    HelmDiff,
}

impl Tool {
    pub fn name(self) -> &'static str {
        match self {
            Self::Helmfile => "helmfile",
            Self::Helm => "helm",
            Self::HelmDiff => "helm-diff",
        }
    }

    fn is_plugin(self) -> bool {
        matches!(self, Self::HelmDiff)
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Maps `(tool, version)` to something runnable on this machine.
pub trait BinaryResolver: Send + Sync {
    /// `version == None` means "whatever is installed".
    fn resolve(&self, tool: Tool, version: Option<&ToolVersion>) -> Result<PathBuf, RuntimeError>;
}

/// Local cache of provisioned tool versions.
///
/// Layout: `<root>/<tool>/<version>/<tool>` for executables and
/// `<root>/<tool>/<version>/` for plugins.
#[derive(Debug, Clone)]
pub struct ToolCache {
    root: PathBuf,
}

impl ToolCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `$WHEELHOUSE_TOOL_CACHE`, else `$XDG_CACHE_HOME/wheelhouse/tools`, else
    /// `~/.cache/wheelhouse/tools`.
    pub fn default_root() -> Option<PathBuf> {
        if let Some(dir) = std::env::var_os("WHEELHOUSE_TOOL_CACHE").filter(|v| !v.is_empty()) {
            return Some(PathBuf::from(dir));
        }
        if let Some(dir) = std::env::var_os("XDG_CACHE_HOME").filter(|v| !v.is_empty()) {
            return Some(PathBuf::from(dir).join("wheelhouse").join("tools"));
        }
        std::env::var_os("HOME")
            .filter(|v| !v.is_empty())
            .map(|home| PathBuf::from(home).join(".cache").join("wheelhouse").join("tools"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn version_dir(&self, tool: Tool, version: &ToolVersion) -> PathBuf {
        self.root.join(tool.name()).join(version.as_str())
    }

    pub fn binary_path(&self, tool: Tool, version: &ToolVersion) -> PathBuf {
        let dir = self.version_dir(tool, version);
        if tool.is_plugin() {
            dir
        } else {
            dir.join(tool.name())
        }
    }
}

impl BinaryResolver for ToolCache {
    fn resolve(&self, tool: Tool, version: Option<&ToolVersion>) -> Result<PathBuf, RuntimeError> {
        let Some(version) = version else {
            if tool.is_plugin() {
                return Err(RuntimeError::ToolNotFound(tool.name().to_owned()));
            }
            return find_on_path(tool.name())
                .ok_or_else(|| RuntimeError::ToolNotFound(tool.name().to_owned()));
        };

        let path = self.binary_path(tool, version);
        let present = if tool.is_plugin() {
            path.is_dir()
        } else {
            path.is_file()
        };
        if present {
            Ok(path)
        } else {
            Err(RuntimeError::ToolNotProvisioned {
                tool: tool.name().to_owned(),
                version: version.to_string(),
                path,
            })
        }
    }
}

/// Search `PATH` for an executable file named `name`.
pub fn find_on_path(name: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt as _;
    path.metadata()
        .is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
