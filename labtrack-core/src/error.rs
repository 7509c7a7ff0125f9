use thiserror::Error;

#[derive(Debug, Error)]
pub enum LabError {
    #[error("Vessel '{0}' not found")]
    VesselNotFound(String),

    #[error("A vessel labelled '{0}' already exists")]
    DuplicateLabel(String),

    #[error("Position {position} of '{container}' already holds '{existing}', cannot add '{incoming}'")]
    PositionOccupied {
        container: String,
        position: String,
        existing: String,
        incoming: String,
    },

    #[error("'{vessel}' already sits at {position} of '{container}'")]
    VesselAlreadyContained {
        container: String,
        vessel: String,
        position: String,
    },

    #[error("Position '{position}' is outside the {geometry} layout of '{container}'")]
    PositionOutOfGeometry {
        container: String,
        position: String,
        geometry: String,
    },

    #[error("'{0}' does not hold other vessels")]
    NotAContainer(String),

    #[error("Data integrity error in event {event} at '{vessel}' {position}: {detail}")]
    DataIntegrity {
        event: String,
        vessel: String,
        position: String,
        detail: String,
    },

    #[error("No molecular indexing scheme matches '{0}'")]
    IndexingSchemeNotFound(String),

    #[error("Invalid index sequence '{sequence}' for {position}")]
    InvalidIndexSequence { position: String, sequence: String },

    #[error("Invalid index pair set: {0}")]
    InvalidPairSet(String),

    #[error("Unknown index position '{0}'")]
    UnknownIndexPosition(String),

    #[error("Row has {found} columns but the header has {expected}")]
    UploadColumnCount { expected: usize, found: usize },

    #[error("Storage location '{0}' not found")]
    StorageLocationNotFound(String),

    #[error("Moving '{location}' under '{new_parent}' would make it its own ancestor")]
    StorageCycle { location: String, new_parent: String },

    #[error("Storage import left records with unresolvable parents: {0:?}")]
    UnresolvedStorageParents(Vec<String>),

    #[error("Storage import lists external id '{0}' more than once")]
    DuplicateStorageId(String),

    #[error("Unknown storage location type '{0}'")]
    UnknownStorageType(String),

    #[error("Storage location '{0}' cannot hold vessels directly")]
    NotLeafCapable(String),

    #[error("Traversal from '{0}' was cancelled")]
    TraversalCancelled(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to process CSV file '{0}': {1}")]
    CsvError(String, #[source] csv::Error),
}

pub type Result<T> = std::result::Result<T, LabError>;
