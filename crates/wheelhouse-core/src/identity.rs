use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use wheelhouse_schema::{ComponentId, DeploymentName};

/// Length of a generated component id in hex characters.
pub const ID_LEN: usize = 26;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct IdentityError(pub String);

/// Supplies the unique component id for each deployment.
pub trait IdentitySource: Send + Sync {
    fn component_id(&self) -> Result<ComponentId, IdentityError>;
}

/// Generates ids from the clock, the process id, and a per-source counter.
#[derive(Debug, Default)]
pub struct GeneratedIdentity {
    counter: AtomicU64,
}

impl GeneratedIdentity {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentitySource for GeneratedIdentity {
    fn component_id(&self) -> Result<ComponentId, IdentityError> {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        let nanos = chrono::Utc::now()
            .timestamp_nanos_opt()
            .ok_or_else(|| IdentityError("system clock is out of range".to_owned()))?;

        let mut hasher = blake3::Hasher::new();
        hasher.update(&nanos.to_le_bytes());
        hasher.update(&std::process::id().to_le_bytes());
        hasher.update(&seq.to_le_bytes());
        let hex = hasher.finalize().to_hex();
        ComponentId::new(&hex.as_str()[..ID_LEN]).map_err(|e| IdentityError(e.to_string()))
    }
}

/// Always returns the same id. Used when the host assigns ids itself.
#[derive(Debug, Clone)]
pub struct FixedIdentity(pub ComponentId);

impl IdentitySource for FixedIdentity {
    fn component_id(&self) -> Result<ComponentId, IdentityError> {
        Ok(self.0.clone())
    }
}

pub fn deployment_name(app: &str, id: &ComponentId) -> DeploymentName {
    DeploymentName::new(format!("{app}-{id}").to_lowercase())
}
