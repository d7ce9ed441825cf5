use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while defining or synthesizing a deployment.
///
/// None of these are recoverable: they all mean the deployment
/// description is structurally invalid.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    UnresolvedRegion(String),

    #[error("{0} must be part of a deployment stage")]
    NotInStage(String),

    #[error("Construct {0} is not inside a stack")]
    NotInStack(String),

    #[error("Cannot use {id:?} as a companion stack: {reason}")]
    InvalidCompanion { id: String, reason: String },

    #[error("Adding dependency {from} -> {to} would create a cycle")]
    DependencyCycle { from: String, to: String },

    #[error("There is already a construct with id {id:?} in {parent:?}")]
    DuplicateId { parent: String, id: String },

    #[error("Invalid construct id {0:?}: must be non-empty and must not contain '/'")]
    InvalidId(String),

    #[error("Invalid stack name {name}\n{reason}")]
    InvalidStackName { name: String, reason: String },

    #[error("{0}")]
    InvalidRegion(String),

    #[error("Validation failed on resource {path:?}\n{reason}")]
    InvalidResource { path: String, reason: String },

    #[error("{0}")]
    InvalidProps(String),

    #[error("{0}")]
    MissingVersionResource(String),

    #[error("{0}")]
    Unsupported(&'static str),

    #[error(
        "{consumer} references {producer} which is deployed to {producer_region} \
        while the consumer is deployed to {consumer_region}. \
        Cross-region values must go through the cross-region parameter channel"
    )]
    CrossRegionReference {
        consumer: String,
        consumer_region: String,
        producer: String,
        producer_region: String,
    },

    #[error("{consumer} references {producer} which belongs to a different stage")]
    CrossStageReference { consumer: String, producer: String },

    #[error("{consumer} references {producer} which is deployed to a different account")]
    CrossAccountReference { consumer: String, producer: String },

    #[error("Failed to serialize {path:?}\n{source}")]
    Serialize {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write {path:?}\n{source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
