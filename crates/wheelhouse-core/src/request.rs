use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use wheelhouse_runtime::Outcome;
use wheelhouse_schema::{ComponentId, DeploymentName};

pub const DEFAULT_WORKSPACE: &str = "default";
pub const DEFAULT_TAG: &str = "latest";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid image reference '{0}': expected NAME[:TAG]")]
pub struct InvalidImageRef(pub String);

/// Container image being deployed, split into repository and tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub name: String,
    pub tag: String,
}

impl ImageRef {
    pub fn new(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
        }
    }
}

impl FromStr for ImageRef {
    type Err = InvalidImageRef;

    /// The tag separator is the last `:` after the last `/`, so registry ports
    /// (`localhost:5000/web:v1`) stay part of the name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let last_segment = s.rfind('/').map_or(0, |i| i + 1);
        let (name, tag) = match s[last_segment..].rfind(':') {
            Some(i) => {
                let split = last_segment + i;
                (&s[..split], &s[split + 1..])
            }
            None => (s, DEFAULT_TAG),
        };
        if name.is_empty() || tag.is_empty() || name.ends_with('/') {
            return Err(InvalidImageRef(s.to_owned()));
        }
        Ok(Self::new(name, tag))
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.tag)
    }
}

/// Everything the host supplies for one deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRequest {
    /// Application name, used as the prefix of the deployment name.
    pub app: String,
    pub image: ImageRef,
    pub env: BTreeMap<String, String>,
    pub workspace: String,
    /// Free-form template inputs. `DockerImageName` and `DockerImageTag` are
    /// always overwritten from `image`.
    pub input: BTreeMap<String, String>,
    /// Root of the application source; `dir` in the config is relative to it.
    pub app_path: PathBuf,
}

impl DeploymentRequest {
    pub fn new(app: impl Into<String>, image: ImageRef) -> Self {
        Self {
            app: app.into(),
            image,
            env: BTreeMap::new(),
            workspace: DEFAULT_WORKSPACE.to_owned(),
            input: BTreeMap::new(),
            app_path: PathBuf::from("."),
        }
    }
}

/// Record of a successful deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentResult {
    pub id: ComponentId,
    pub name: DeploymentName,
    pub outcome: Outcome,
    pub deployed_at: String,
}
