//! Ties the config artifact's lifetime to its task

use crate::platform::{ArtifactHandle, OwnerRef, Platform, TaskHandle};
use serde::{Deserialize, Serialize};

/// Outcome of the best-effort ownership update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkStatus {
    /// The artifact is owned by the task and collected with it
    Linked,
    /// The artifact has no owner and leaks until cleaned up externally
    Failed(String),
}

impl LinkStatus {
    #[must_use]
    pub const fn is_linked(&self) -> bool {
        matches!(self, Self::Linked)
    }
}

/// Mark `artifact` as owned by `task`.
///
/// Never fails the launch: an error is logged and returned as
/// [`LinkStatus::Failed`].
pub async fn link_artifact(
    platform: &dyn Platform,
    artifact: &ArtifactHandle,
    task: &TaskHandle,
) -> LinkStatus {
    let owner = OwnerRef::task(task);
    match platform.update_config_artifact(artifact, &owner).await {
        Ok(()) => {
            tracing::debug!(artifact = %artifact.name, task = %task.name, "config artifact linked to task");
            LinkStatus::Linked
        }
        Err(e) => {
            tracing::error!(
                artifact = %artifact.name,
                task = %task.name,
                error = %e,
                "failed to set owner reference on config artifact"
            );
            LinkStatus::Failed(e.to_string())
        }
    }
}
