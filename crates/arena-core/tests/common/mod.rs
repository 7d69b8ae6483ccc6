//! Test doubles shared by the launch tests

#![allow(dead_code)]

use arena_core::error::{AllocationError, IssuanceError, PlatformError};
use arena_core::ident::{OsRandom, RandomSource};
use arena_core::isolation::ConfigArtifact;
use arena_core::model::{Match, Participant};
use arena_core::platform::{ArtifactHandle, OwnerRef, Platform, TaskHandle};
use arena_core::task::Task;
use arena_core::upload::UploadUrlIssuer;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct StoredArtifact {
    pub artifact: ConfigArtifact,
    pub owner: Option<OwnerRef>,
}

#[derive(Debug, Default)]
pub struct State {
    pub artifacts: Vec<StoredArtifact>,
    pub tasks: Vec<Task>,
    /// Platform calls in the order they were made
    pub calls: Vec<&'static str>,
}

/// In-memory platform that records every call and can fail any step
#[derive(Debug, Default)]
pub struct RecordingPlatform {
    pub state: Mutex<State>,
    pub fail_artifact: bool,
    pub fail_task: bool,
    pub fail_link: bool,
}

impl RecordingPlatform {
    pub fn failing_task() -> Self {
        Self {
            fail_task: true,
            ..Self::default()
        }
    }

    pub fn failing_link() -> Self {
        Self {
            fail_link: true,
            ..Self::default()
        }
    }

    pub fn failing_artifact() -> Self {
        Self {
            fail_artifact: true,
            ..Self::default()
        }
    }
}

fn rejected(what: &str) -> PlatformError {
    PlatformError::Rejected {
        status: 500,
        body: format!("{what} refused"),
    }
}

#[async_trait]
impl Platform for RecordingPlatform {
    async fn create_config_artifact(
        &self,
        artifact: &ConfigArtifact,
    ) -> Result<ArtifactHandle, PlatformError> {
        let mut state = self.state.lock();
        state.calls.push("create_config_artifact");
        if self.fail_artifact {
            return Err(rejected("configmap"));
        }
        if state.artifacts.iter().any(|a| a.artifact.name == artifact.name) {
            return Err(PlatformError::Rejected {
                status: 409,
                body: format!("configmaps \"{}\" already exists", artifact.name),
            });
        }
        state.artifacts.push(StoredArtifact {
            artifact: artifact.clone(),
            owner: None,
        });
        Ok(ArtifactHandle {
            name: artifact.name.clone(),
        })
    }

    async fn update_config_artifact(
        &self,
        handle: &ArtifactHandle,
        owner: &OwnerRef,
    ) -> Result<(), PlatformError> {
        let mut state = self.state.lock();
        state.calls.push("update_config_artifact");
        if self.fail_link {
            return Err(rejected("owner update"));
        }
        let stored = state
            .artifacts
            .iter_mut()
            .find(|a| a.artifact.name == handle.name)
            .ok_or_else(|| PlatformError::Other(format!("no artifact {}", handle.name)))?;
        stored.owner = Some(owner.clone());
        Ok(())
    }

    async fn create_task(&self, task: &Task) -> Result<TaskHandle, PlatformError> {
        let mut state = self.state.lock();
        state.calls.push("create_task");
        if self.fail_task {
            return Err(rejected("job"));
        }
        if state.tasks.iter().any(|t| t.name == task.name) {
            return Err(PlatformError::Rejected {
                status: 409,
                body: format!("jobs \"{}\" already exists", task.name),
            });
        }
        state.tasks.push(task.clone());
        Ok(TaskHandle {
            name: task.name.clone(),
            uid: Uuid::new_v4().to_string(),
        })
    }
}

/// Fixed upload URL, or a failure
pub struct StaticIssuer(pub Option<String>);

#[async_trait]
impl UploadUrlIssuer for StaticIssuer {
    async fn issue(&self, match_id: Uuid) -> Result<String, IssuanceError> {
        self.0
            .as_ref()
            .map(|base| format!("{base}/{match_id}"))
            .ok_or_else(|| IssuanceError("signer unavailable".into()))
    }
}

/// OS randomness until the `fail_at`-th draw (zero based), then failure
pub struct FailingRandom {
    draws: AtomicUsize,
    fail_at: usize,
}

impl FailingRandom {
    pub const fn new(fail_at: usize) -> Self {
        Self {
            draws: AtomicUsize::new(0),
            fail_at,
        }
    }
}

impl RandomSource for FailingRandom {
    fn fill(&self, buf: &mut [u8]) -> Result<(), AllocationError> {
        if self.draws.fetch_add(1, Ordering::SeqCst) >= self.fail_at {
            return Err(AllocationError::RandomSource("entropy pool closed".into()));
        }
        OsRandom.fill(buf)
    }
}

pub fn participant(name: Option<&str>) -> Participant {
    Participant {
        id: Uuid::new_v4(),
        name: name.map(str::to_string),
        repo_url: "https://github.com/example/bot.git".into(),
        image: "ghcr.io/example/bot:latest".into(),
    }
}

pub fn game(participants: Vec<Participant>) -> Match {
    Match {
        id: Uuid::new_v4(),
        server_image: "ghcr.io/example/server:latest".into(),
        server_config: "{\"rounds\":100}".into(),
        participants,
    }
}
