//! Egress lockdown for the participant identity
//!
//! Every unit in a task shares one network namespace, so a single pair of
//! owner-matched rules covers all participants while the server, running as
//! a different identity, keeps outbound access for result reporting.

use crate::isolation::profile::{ContainmentPolicy, Role, StagingStep};
use crate::task::ExecutionUnit;

/// Name of the lockdown staging unit
pub const LOCKDOWN_UNIT: &str = "net-guard";

/// Rules dropping every non-loopback packet sent by `uid`, IPv4 and IPv6
#[must_use]
pub fn lockdown_script(uid: u32) -> String {
    format!(
        "set -eux;\n\
         iptables -I OUTPUT 1 -m owner --uid-owner {uid} ! -o lo -j DROP;\n\
         ip6tables -I OUTPUT 1 -m owner --uid-owner {uid} ! -o lo -j DROP;\n"
    )
}

#[derive(Debug, Clone)]
pub struct NetworkLockdown {
    image: String,
}

impl NetworkLockdown {
    #[must_use]
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
        }
    }

    /// The lockdown step; must be the last staging unit of the task
    #[must_use]
    pub fn unit(&self, policy: &ContainmentPolicy) -> ExecutionUnit {
        ExecutionUnit::new(
            Role::Staging(StagingStep::Lockdown),
            LOCKDOWN_UNIT,
            &self.image,
            policy,
        )
        .command(["sh", "-c"])
        .arg(lockdown_script(policy.bot_uid()))
    }
}
