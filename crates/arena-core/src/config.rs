//! Launch configuration

use crate::error::ConfigError;
use crate::ident::DEFAULT_ID_WIDTH;
use crate::isolation::resources::{Cpu, Memory, ResourceBudget, Resources};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Static configuration shared by every launch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchConfig {
    /// Platform namespace tasks and artifacts are created in
    pub namespace: String,

    /// Base URL of the results message bus management API
    pub results_bus_url: String,

    /// Image used by the code-fetch staging steps
    pub fetch_image: String,

    /// Image used by the network lockdown staging step
    pub lockdown_image: String,

    /// Execution identity shared by every participant process
    pub bot_uid: u32,

    /// Capacity ceiling of each participant's isolated storage
    pub storage_quota: Memory,

    /// Short identifier width in bytes
    pub id_width: usize,

    /// Wall-clock deadline after which the platform kills the task
    pub deadline: Duration,

    /// Retention after completion before the task is garbage-collected
    pub retention: Duration,

    /// Resource budgets per execution role
    pub budgets: Budgets,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            namespace: "default".into(),
            results_bus_url: "http://rabbitmq:15672".into(),
            fetch_image: "alpine/git".into(),
            lockdown_image: "ghcr.io/paulicstudios/alpine-iptables:latest".into(),
            bot_uid: 2000,
            storage_quota: Memory::mebibytes(250),
            id_width: DEFAULT_ID_WIDTH,
            deadline: Duration::from_secs(15 * 60),
            retention: Duration::from_secs(6 * 60 * 60),
            budgets: Budgets::default(),
        }
    }
}

impl LaunchConfig {
    /// Create a new config builder
    #[must_use]
    pub fn builder() -> LaunchConfigBuilder {
        LaunchConfigBuilder::default()
    }

    /// Publish endpoint on the results bus
    #[must_use]
    pub fn results_publish_url(&self) -> String {
        format!(
            "{}/api/exchanges/%2f/amq.direct/publish",
            self.results_bus_url.trim_end_matches('/')
        )
    }

    /// Reject budgets whose request exceeds the limit
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.budgets.server.validate("server")?;
        self.budgets.participant.validate("participant")?;
        self.budgets.fetch.validate("fetch")?;
        self.budgets.lockdown.validate("lockdown")
    }
}

/// Resource budgets for each execution role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Budgets {
    pub server: ResourceBudget,
    pub participant: ResourceBudget,
    pub fetch: ResourceBudget,
    pub lockdown: ResourceBudget,
}

impl Default for Budgets {
    fn default() -> Self {
        Self {
            server: ResourceBudget::new(
                Resources::new(Cpu::millis(500), Memory::mebibytes(512)),
                Resources::new(Cpu::cores(2), Memory::gibibytes(1)),
            ),
            participant: ResourceBudget::new(
                Resources::new(Cpu::millis(250), Memory::mebibytes(256)),
                Resources::new(Cpu::cores(1), Memory::mebibytes(512)),
            ),
            fetch: ResourceBudget::new(
                Resources::new(Cpu::millis(100), Memory::mebibytes(128)),
                Resources::new(Cpu::millis(500), Memory::mebibytes(512)),
            ),
            lockdown: ResourceBudget::new(
                Resources::new(Cpu::millis(10), Memory::mebibytes(32)),
                Resources::new(Cpu::millis(100), Memory::mebibytes(128)),
            ),
        }
    }
}

/// Builder for LaunchConfig
#[derive(Debug, Default)]
pub struct LaunchConfigBuilder {
    config: LaunchConfig,
}

impl LaunchConfigBuilder {
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.namespace = namespace.into();
        self
    }

    #[must_use]
    pub fn results_bus_url(mut self, url: impl Into<String>) -> Self {
        self.config.results_bus_url = url.into();
        self
    }

    #[must_use]
    pub fn fetch_image(mut self, image: impl Into<String>) -> Self {
        self.config.fetch_image = image.into();
        self
    }

    #[must_use]
    pub fn lockdown_image(mut self, image: impl Into<String>) -> Self {
        self.config.lockdown_image = image.into();
        self
    }

    #[must_use]
    pub const fn bot_uid(mut self, uid: u32) -> Self {
        self.config.bot_uid = uid;
        self
    }

    #[must_use]
    pub const fn storage_quota(mut self, quota: Memory) -> Self {
        self.config.storage_quota = quota;
        self
    }

    #[must_use]
    pub const fn id_width(mut self, bytes: usize) -> Self {
        self.config.id_width = bytes;
        self
    }

    #[must_use]
    pub const fn deadline(mut self, deadline: Duration) -> Self {
        self.config.deadline = deadline;
        self
    }

    #[must_use]
    pub const fn retention(mut self, retention: Duration) -> Self {
        self.config.retention = retention;
        self
    }

    #[must_use]
    pub const fn budgets(mut self, budgets: Budgets) -> Self {
        self.config.budgets = budgets;
        self
    }

    #[must_use]
    pub fn build(self) -> LaunchConfig {
        self.config
    }
}

/// Get default socket path from ARENA_SOCKET env var or system default
///
/// Returns:
/// - `$ARENA_SOCKET` if set (for development)
/// - `/run/arena/arena.sock` otherwise (production)
pub fn default_socket_path() -> PathBuf {
    std::env::var("ARENA_SOCKET")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/run/arena/arena.sock"))
}
