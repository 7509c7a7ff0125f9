use crate::{
    event::LabEventRecord, indexing::IndexingSchemeRecord, storage::StorageImportRecord,
    vessel::VesselRecord,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct VesselFile {
    pub schema_version: String,
    pub vessels: Vec<VesselRecord>,
}

#[derive(Debug, Deserialize)]
pub struct LabEventFile {
    pub schema_version: String,
    pub events: Vec<LabEventRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IndexingSchemeFile {
    pub schema_version: String,
    pub schemes: Vec<IndexingSchemeRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StorageFile {
    pub schema_version: String,
    pub locations: Vec<StorageImportRecord>,
}
