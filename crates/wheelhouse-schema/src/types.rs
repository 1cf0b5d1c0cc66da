//! String identifiers shared across crates. All serialize as plain strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use thiserror::Error;

macro_rules! string_id {
    (@str $name:ident) => {
        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }
        }

        string_id!(@str $name);
    };
}

string_id!(
    /// Version pin of a wrapped tool, e.g. `0.162.0`.
    ToolVersion
);

string_id!(
    /// Lower-cased `<app>-<component id>` name of a deployment.
    DeploymentName
);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("component id must be non-blank and free of whitespace, got '{0}'")]
pub struct InvalidComponentId(pub String);

/// Unique component identity handed out by the host for one deployment.
///
/// Never empty and never contains whitespace, since it ends up in the
/// deployment name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ComponentId(String);

impl ComponentId {
    pub fn new(s: impl Into<String>) -> Result<Self, InvalidComponentId> {
        let s = s.into();
        if s.is_empty() || s.chars().any(char::is_whitespace) {
            return Err(InvalidComponentId(s));
        }
        Ok(Self(s))
    }
}

string_id!(@str ComponentId);

impl FromStr for ComponentId {
    type Err = InvalidComponentId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ComponentId {
    type Error = InvalidComponentId;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ComponentId> for String {
    fn from(id: ComponentId) -> Self {
        id.0
    }
}
