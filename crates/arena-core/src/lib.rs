//! # arena-core
//!
//! Isolated multi-process match topology for untrusted bot code.
//!
//! This crate builds one orchestration task per match:
//! - Short, non-sequential participant identifiers (`ident`)
//! - Per-participant isolated storage and a server-only config mount (`isolation::storage`)
//! - Code-fetch staging before any untrusted code runs (`staging`)
//! - Trust-tiered containment profiles and resource budgets (`isolation`)
//! - Egress lockdown for the untrusted identity (`isolation::network`)
//! - Task assembly with bounded lifetime (`task`)
//! - Submission and ownership linking against the platform (`launch`, `platform`)

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cleanup;
pub mod config;
pub mod error;
pub mod ident;
pub mod isolation;
pub mod kube;
pub mod launch;
pub mod manifest;
pub mod model;
pub mod platform;
pub mod protocol;
pub mod staging;
pub mod task;
pub mod upload;

pub use config::LaunchConfig;
pub use error::LaunchError;
pub use launch::{LaunchContext, LaunchOutcome, LinkStatus};
pub use model::{Match, Participant};

/// Crate-level result type
pub type Result<T> = std::result::Result<T, LaunchError>;
