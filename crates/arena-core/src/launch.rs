//! Match launch: the strictly ordered construction sequence

use crate::cleanup::link_artifact;
use crate::config::LaunchConfig;
use crate::error::{ConfigError, LaunchError};
use crate::ident::{IdentifierAllocator, IdentifierMapping, OsRandom, RandomSource};
use crate::isolation::profile::ContainmentPolicy;
use crate::isolation::storage::ConfigArtifact;
use crate::model::Match;
use crate::platform::{ArtifactHandle, Platform, TaskHandle};
use crate::task::{Task, TaskAssembler};
use crate::upload::UploadUrlIssuer;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use crate::cleanup::LinkStatus;

/// Everything built for a match before the platform is touched
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub task: Task,
    pub artifact: ConfigArtifact,
    pub mapping: IdentifierMapping,
}

/// Result of a successful launch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchOutcome {
    pub task: TaskHandle,
    pub artifact: ArtifactHandle,
    /// Short id → participant id, as handed to the server
    pub mapping: String,
    pub link: LinkStatus,
}

/// Injected clients and static configuration shared by every launch
pub struct LaunchContext {
    config: LaunchConfig,
    policy: ContainmentPolicy,
    platform: Arc<dyn Platform>,
    issuer: Arc<dyn UploadUrlIssuer>,
    random: Arc<dyn RandomSource>,
}

impl LaunchContext {
    pub fn new(
        config: LaunchConfig,
        platform: Arc<dyn Platform>,
        issuer: Arc<dyn UploadUrlIssuer>,
    ) -> std::result::Result<Self, ConfigError> {
        let policy = ContainmentPolicy::from_config(&config)?;
        Ok(Self {
            config,
            policy,
            platform,
            issuer,
            random: Arc::new(OsRandom),
        })
    }

    /// Replace the OS random source
    #[must_use]
    pub fn with_random_source(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &LaunchConfig {
        &self.config
    }

    /// Allocate identifiers and assemble the task; no platform call
    pub fn plan(&self, game: &Match, upload_url: &str) -> Result<LaunchPlan> {
        let mapping = IdentifierAllocator::new(self.random.as_ref(), self.config.id_width)?
            .allocate(&game.participants)?;
        let task = TaskAssembler::new(&self.config, &self.policy).assemble(game, &mapping, upload_url)?;
        Ok(LaunchPlan {
            task,
            artifact: ConfigArtifact::for_match(game),
            mapping,
        })
    }

    /// Launch `game`.
    ///
    /// Order: upload URL, identifiers, task assembly, config artifact, task,
    /// ownership link. Nothing is retried or rolled back; a task submission
    /// failure leaves the artifact without an owner.
    pub async fn launch(&self, game: &Match) -> Result<LaunchOutcome> {
        tracing::info!(
            match_id = %game.id,
            participants = game.participants.len(),
            "launching match"
        );

        let upload_url = self
            .issuer
            .issue(game.id)
            .await
            .map_err(|source| LaunchError::Issuance {
                match_id: game.id.to_string(),
                source,
            })?;

        let plan = self.plan(game, &upload_url)?;
        let mapping = plan.mapping.to_json().map_err(LaunchError::Serialization)?;

        let artifact = self
            .platform
            .create_config_artifact(&plan.artifact)
            .await
            .map_err(|source| LaunchError::ArtifactCreation {
                name: plan.artifact.name.clone(),
                source,
            })?;
        tracing::debug!(artifact = %artifact.name, "config artifact created");

        let task = match self.platform.create_task(&plan.task).await {
            Ok(task) => task,
            Err(source) => {
                tracing::error!(
                    task = %plan.task.name,
                    artifact = %artifact.name,
                    error = %source,
                    "task submission failed, config artifact left without owner"
                );
                return Err(LaunchError::Submission {
                    name: plan.task.name.clone(),
                    source,
                });
            }
        };

        let link = link_artifact(self.platform.as_ref(), &artifact, &task).await;

        tracing::info!(task = %task.name, uid = %task.uid, linked = link.is_linked(), "match task created");
        Ok(LaunchOutcome {
            task,
            artifact,
            mapping,
            link,
        })
    }
}
