//! Error types for arena-core

use thiserror::Error;
use uuid::Uuid;

/// Fatal failures of a match launch, one variant per construction step.
///
/// Link failures are not part of this enum: they are reported through
/// [`crate::LinkStatus`] on an otherwise successful launch.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("identifier allocation failed: {0}")]
    Allocation(#[from] AllocationError),

    #[error("upload url issuance failed for match {match_id}: {source}")]
    Issuance {
        match_id: String,
        #[source]
        source: IssuanceError,
    },

    #[error("failed to encode participant id mapping: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error("failed to create config artifact {name}: {source}")]
    ArtifactCreation {
        name: String,
        #[source]
        source: PlatformError,
    },

    #[error("failed to submit task {name}: {source}")]
    Submission {
        name: String,
        #[source]
        source: PlatformError,
    },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Error, Debug)]
pub enum AllocationError {
    #[error("random source unavailable: {0}")]
    RandomSource(String),

    #[error("identifier width must be between 1 and 8 bytes, got {0}")]
    InvalidWidth(usize),

    #[error("{participants} participants exceed the {space} identifiers of a {width}-byte id")]
    SpaceTooSmall {
        participants: usize,
        width: usize,
        space: u128,
    },

    #[error("participant {0} is listed more than once")]
    DuplicateParticipant(Uuid),

    #[error("mapping holds {actual} ids for {expected} participants")]
    Mismatch { expected: usize, actual: usize },

    #[error("no unique identifier after {attempts} draws for participant {index}")]
    Exhausted { index: usize, attempts: usize },
}

#[derive(Error, Debug)]
#[error("{0}")]
pub struct IssuanceError(pub String);

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("platform rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid platform response: {0}")]
    InvalidResponse(String),

    #[error("failed to read credentials from {path}: {source}")]
    Credentials {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid quantity {0:?}")]
    Quantity(String),

    #[error("{unit}: {resource} request {request} exceeds limit {limit}")]
    Budget {
        unit: String,
        resource: &'static str,
        request: String,
        limit: String,
    },

    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
