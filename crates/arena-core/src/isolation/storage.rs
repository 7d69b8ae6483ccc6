//! Storage layout: one private volume per participant, one config entry for the server

use crate::isolation::resources::Memory;
use crate::model::Match;
use uuid::Uuid;

/// Mount point of a participant's private volume
pub const SHARED_DATA_PATH: &str = "/shared-data";

/// Volume backed by the config artifact
pub const CONFIG_VOLUME: &str = "game-config";

/// The single artifact entry exposed to the server
pub const CONFIG_ENTRY: &str = "server.game.config";

/// Where the server reads its config
pub const CONFIG_MOUNT_PATH: &str = "/core/configs/server.game.config";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageUnit {
    /// Scratch volume owned by exactly one participant, gone with the task
    Isolated {
        name: String,
        participant: Uuid,
        quota: Memory,
    },
    /// Read-only view of the config artifact, server only
    SharedConfig { name: String, artifact: String },
}

impl StorageUnit {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Isolated { name, .. } | Self::SharedConfig { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub volume: String,
    pub path: String,
    /// Mount one entry of the volume instead of all of it
    pub sub_path: Option<String>,
    pub read_only: bool,
}

/// Auxiliary artifact holding the server config blob under [`CONFIG_ENTRY`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigArtifact {
    pub name: String,
    pub entry: String,
    pub data: String,
}

impl ConfigArtifact {
    #[must_use]
    pub fn for_match(game: &Match) -> Self {
        Self {
            name: config_artifact_name(game.id),
            entry: CONFIG_ENTRY.to_string(),
            data: game.server_config.clone(),
        }
    }
}

#[must_use]
pub fn config_artifact_name(match_id: Uuid) -> String {
    format!("game-config-{match_id}")
}

/// Storage units for one task
#[derive(Debug, Clone)]
pub struct StorageTopology {
    config: StorageUnit,
    participants: Vec<StorageUnit>,
}

impl StorageTopology {
    /// Declare storage for `game`; no platform call is made here
    #[must_use]
    pub fn plan(game: &Match, quota: Memory) -> Self {
        let participants = game
            .participants
            .iter()
            .map(|p| StorageUnit::Isolated {
                name: format!("shared-data-{}", p.id),
                participant: p.id,
                quota,
            })
            .collect();

        Self {
            config: StorageUnit::SharedConfig {
                name: CONFIG_VOLUME.to_string(),
                artifact: config_artifact_name(game.id),
            },
            participants,
        }
    }

    /// Private volume mounts, in participant order
    pub fn participant_mounts(&self) -> impl Iterator<Item = Mount> + '_ {
        self.participants.iter().map(|unit| Mount {
            volume: unit.name().to_string(),
            path: SHARED_DATA_PATH.to_string(),
            sub_path: None,
            read_only: false,
        })
    }

    /// Mount of the config entry, only ever given to the server
    #[must_use]
    pub fn server_mount(&self) -> Mount {
        Mount {
            volume: self.config.name().to_string(),
            path: CONFIG_MOUNT_PATH.to_string(),
            sub_path: Some(CONFIG_ENTRY.to_string()),
            read_only: true,
        }
    }

    /// All units, config first
    #[must_use]
    pub fn into_units(self) -> Vec<StorageUnit> {
        std::iter::once(self.config).chain(self.participants).collect()
    }
}
