//! Orchestration platform seam

use crate::error::PlatformError;
use crate::isolation::storage::ConfigArtifact;
use crate::task::Task;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A created config artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactHandle {
    pub name: String,
}

/// A created task with its platform-assigned identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskHandle {
    pub name: String,
    pub uid: String,
}

/// Owner reference written onto an artifact so it is collected with its task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerRef {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: String,
}

impl OwnerRef {
    #[must_use]
    pub fn task(handle: &TaskHandle) -> Self {
        Self {
            api_version: "batch/v1".into(),
            kind: "Job".into(),
            name: handle.name.clone(),
            uid: handle.uid.clone(),
        }
    }
}

/// Calls the core makes into the orchestration platform.
///
/// Each call is awaited to completion before the next one is issued.
#[async_trait]
pub trait Platform: Send + Sync {
    async fn create_config_artifact(
        &self,
        artifact: &ConfigArtifact,
    ) -> Result<ArtifactHandle, PlatformError>;

    async fn update_config_artifact(
        &self,
        handle: &ArtifactHandle,
        owner: &OwnerRef,
    ) -> Result<(), PlatformError>;

    async fn create_task(&self, task: &Task) -> Result<TaskHandle, PlatformError>;
}
