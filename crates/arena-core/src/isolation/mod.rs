//! Containment for untrusted participants
//!
//! This module contains the isolation layers applied to a task:
//! - `profile` - trust tiers, containment profiles and budgets per role
//! - `resources` - compute/memory quantities and request ≤ limit budgets
//! - `storage` - per-participant volumes and the server-only config mount
//! - `network` - the egress lockdown staging step

pub mod network;
pub mod profile;
pub mod resources;
pub mod storage;

pub use self::network::NetworkLockdown;
pub use self::profile::{ContainmentPolicy, ContainmentProfile, Role, StagingStep};
pub use self::resources::{Cpu, Memory, ResourceBudget, Resources};
pub use self::storage::{ConfigArtifact, Mount, StorageTopology, StorageUnit};
