//! Short participant identifiers and the short-id → participant mapping
//!
//! Short ids obfuscate which participant is which to the other bots: each is
//! a fixed-width random integer rendered in decimal, used as the participant's
//! only argument and as the server's lookup key.

use crate::error::AllocationError;
use crate::model::Participant;
use rand::TryRngCore;
use rand::rngs::OsRng;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

/// Default identifier width in bytes
pub const DEFAULT_ID_WIDTH: usize = 2;

/// Redraws allowed per participant when a draw collides with an earlier id
pub const MAX_DRAWS: usize = 16;

/// Source of cryptographically secure random bytes
pub trait RandomSource: Send + Sync {
    /// Fill `buf` entirely or fail
    fn fill(&self, buf: &mut [u8]) -> Result<(), AllocationError>;
}

/// Operating system CSPRNG
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&self, buf: &mut [u8]) -> Result<(), AllocationError> {
        let mut rng = OsRng;
        rng.try_fill_bytes(buf)
            .map_err(|e| AllocationError::RandomSource(e.to_string()))
    }
}

/// A participant's short identifier, a decimal rendering of random bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShortId(String);

impl ShortId {
    fn from_bytes(bytes: &[u8]) -> (u64, Self) {
        let value = bytes
            .iter()
            .take(8)
            .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
        (value, Self(value.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    pub short_id: ShortId,
    pub participant_id: Uuid,
}

/// Ordered bijection from short id to stable participant id.
///
/// Entries keep participant order; the JSON form is an object keyed by short
/// id in that same order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierMapping {
    entries: Vec<MappingEntry>,
}

impl IdentifierMapping {
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MappingEntry> {
        self.entries.iter()
    }

    /// Short ids in participant order
    pub fn short_ids(&self) -> impl Iterator<Item = &ShortId> {
        self.entries.iter().map(|e| &e.short_id)
    }

    /// Short id assigned to the participant at `index`
    #[must_use]
    pub fn short_id(&self, index: usize) -> Option<&ShortId> {
        self.entries.get(index).map(|e| &e.short_id)
    }

    /// Stable participant id behind a short id
    #[must_use]
    pub fn lookup(&self, short_id: &str) -> Option<Uuid> {
        self.entries
            .iter()
            .find(|e| e.short_id.as_str() == short_id)
            .map(|e| e.participant_id)
    }

    /// Encode as the JSON object handed to the server
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode the JSON object form, preserving document order
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Serialize for IdentifierMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(entry.short_id.as_str(), &entry.participant_id.to_string())?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for IdentifierMapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MappingVisitor;

        impl<'de> Visitor<'de> for MappingVisitor {
            type Value = IdentifierMapping;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object of short id to participant id")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries: Vec<MappingEntry> = Vec::new();
                while let Some((short_id, participant_id)) = access.next_entry::<String, Uuid>()? {
                    if entries.iter().any(|e| e.short_id.0 == short_id) {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate short id {short_id}"
                        )));
                    }
                    entries.push(MappingEntry {
                        short_id: ShortId(short_id),
                        participant_id,
                    });
                }
                Ok(IdentifierMapping { entries })
            }
        }

        deserializer.deserialize_map(MappingVisitor)
    }
}

/// Fail on the first participant listed more than once
pub fn ensure_distinct(participants: &[Participant]) -> Result<(), AllocationError> {
    let mut listed = HashSet::with_capacity(participants.len());
    match participants.iter().find(|p| !listed.insert(p.id)) {
        Some(dup) => Err(AllocationError::DuplicateParticipant(dup.id)),
        None => Ok(()),
    }
}

/// Draws one unique short id per participant
pub struct IdentifierAllocator<'a> {
    source: &'a dyn RandomSource,
    width: usize,
}

impl<'a> IdentifierAllocator<'a> {
    pub fn new(source: &'a dyn RandomSource, width: usize) -> Result<Self, AllocationError> {
        if !(1..=8).contains(&width) {
            return Err(AllocationError::InvalidWidth(width));
        }
        Ok(Self { source, width })
    }

    /// Number of distinct ids for the configured width
    #[must_use]
    pub const fn space(&self) -> u128 {
        1u128 << (8 * self.width)
    }

    /// Allocate ids for `participants`, in order.
    ///
    /// A participant listed twice is rejected before any draw. A draw equal
    /// to an earlier id is redrawn, up to [`MAX_DRAWS`] times.
    pub fn allocate(&self, participants: &[Participant]) -> Result<IdentifierMapping, AllocationError> {
        ensure_distinct(participants)?;

        let space = self.space();
        if participants.len() as u128 > space {
            return Err(AllocationError::SpaceTooSmall {
                participants: participants.len(),
                width: self.width,
                space,
            });
        }

        let mut seen = HashSet::with_capacity(participants.len());
        let mut entries = Vec::with_capacity(participants.len());
        let mut buf = vec![0u8; self.width];

        for (index, participant) in participants.iter().enumerate() {
            let mut assigned = None;
            for attempt in 0..MAX_DRAWS {
                self.source.fill(&mut buf)?;
                let (value, short_id) = ShortId::from_bytes(&buf);
                if seen.insert(value) {
                    assigned = Some(short_id);
                    break;
                }
                tracing::debug!(index, attempt, "short id collision, redrawing");
            }
            let short_id = assigned.ok_or(AllocationError::Exhausted {
                index,
                attempts: MAX_DRAWS,
            })?;
            entries.push(MappingEntry {
                short_id,
                participant_id: participant.id,
            });
        }

        Ok(IdentifierMapping { entries })
    }
}
