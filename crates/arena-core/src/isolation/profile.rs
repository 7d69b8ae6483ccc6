//! Trust tiers and the containment profile each one receives

use crate::config::LaunchConfig;
use crate::error::ConfigError;
use crate::isolation::resources::ResourceBudget;
use caps::Capability;

/// Syscall filtering profile applied by the container runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeccompProfile {
    /// The runtime's default filter
    RuntimeDefault,
}

/// Capability adjustments relative to the runtime's default set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    /// Drop every capability before adding `add`
    pub drop_all: bool,
    /// Capabilities granted on top
    pub add: Vec<Capability>,
}

impl CapabilitySet {
    #[must_use]
    pub const fn none() -> Self {
        Self {
            drop_all: true,
            add: Vec::new(),
        }
    }

    #[must_use]
    pub fn only(add: &[Capability]) -> Self {
        Self {
            drop_all: true,
            add: add.to_vec(),
        }
    }

    #[must_use]
    pub fn with(add: &[Capability]) -> Self {
        Self {
            drop_all: false,
            add: add.to_vec(),
        }
    }
}

/// Identity, privilege, filesystem, capability and syscall restrictions for one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainmentProfile {
    /// Fixed user id, `None` keeps the image default
    pub run_as_user: Option<u32>,
    /// Refuse to start as uid 0
    pub run_as_non_root: bool,
    pub allow_privilege_escalation: bool,
    pub read_only_root_filesystem: bool,
    pub seccomp: SeccompProfile,
    pub capabilities: CapabilitySet,
}

/// Staging steps, in the order they run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingStep {
    /// Fetch and re-own one participant's code
    Fetch,
    /// Install the egress rules for the participant identity
    Lockdown,
}

/// Role of an execution unit inside a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Staging(StagingStep),
    Participant,
}

impl Role {
    #[must_use]
    pub const fn is_staging(self) -> bool {
        matches!(self, Self::Staging(_))
    }
}

/// Maps roles to containment profiles and budgets
#[derive(Debug, Clone)]
pub struct ContainmentPolicy {
    bot_uid: u32,
    server: ResourceBudget,
    participant: ResourceBudget,
    fetch: ResourceBudget,
    lockdown: ResourceBudget,
}

impl ContainmentPolicy {
    /// Build the policy, rejecting any budget with request above limit
    pub fn from_config(config: &LaunchConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let budgets = config.budgets;
        Ok(Self {
            bot_uid: config.bot_uid,
            server: budgets.server,
            participant: budgets.participant,
            fetch: budgets.fetch,
            lockdown: budgets.lockdown,
        })
    }

    /// Identity every participant process runs as
    #[must_use]
    pub const fn bot_uid(&self) -> u32 {
        self.bot_uid
    }

    #[must_use]
    pub fn profile(&self, role: Role) -> ContainmentProfile {
        match role {
            // Participants are adversarial: fixed identity, nothing writable
            // outside their mounts, no capabilities at all.
            Role::Participant => ContainmentProfile {
                run_as_user: Some(self.bot_uid),
                run_as_non_root: true,
                allow_privilege_escalation: false,
                read_only_root_filesystem: true,
                seccomp: SeccompProfile::RuntimeDefault,
                capabilities: CapabilitySet::none(),
            },
            // The server keeps the image's identity.
            // TODO: confirm with the match owners whether the server should run as a fixed non-root uid.
            Role::Server => ContainmentProfile {
                run_as_user: None,
                run_as_non_root: false,
                allow_privilege_escalation: false,
                read_only_root_filesystem: false,
                seccomp: SeccompProfile::RuntimeDefault,
                capabilities: CapabilitySet::none(),
            },
            // chown/chmod of the fetched tree to the bot identity
            Role::Staging(StagingStep::Fetch) => ContainmentProfile {
                run_as_user: None,
                run_as_non_root: false,
                allow_privilege_escalation: false,
                read_only_root_filesystem: false,
                seccomp: SeccompProfile::RuntimeDefault,
                capabilities: CapabilitySet::only(&[
                    Capability::CAP_CHOWN,
                    Capability::CAP_FOWNER,
                    Capability::CAP_DAC_OVERRIDE,
                ]),
            },
            Role::Staging(StagingStep::Lockdown) => ContainmentProfile {
                run_as_user: Some(0),
                run_as_non_root: false,
                allow_privilege_escalation: false,
                read_only_root_filesystem: false,
                seccomp: SeccompProfile::RuntimeDefault,
                capabilities: CapabilitySet::with(&[Capability::CAP_NET_ADMIN]),
            },
        }
    }

    #[must_use]
    pub const fn budget(&self, role: Role) -> ResourceBudget {
        match role {
            Role::Server => self.server,
            Role::Participant => self.participant,
            Role::Staging(StagingStep::Fetch) => self.fetch,
            Role::Staging(StagingStep::Lockdown) => self.lockdown,
        }
    }
}
