use crate::geometry::SbsSection;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The lab steps that move material between vessels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LabEventType {
    SamplesExtractionTransfer,
    SamplesDaughterPlateCreation,
    ShearingTransfer,
    PostShearingTransferCleanup,
    IndexedAdapterLigation,
    PondRegistration,
    PreSelectionPool,
    NormalizationTransfer,
    DenatureTransfer,
    StripTubeBTransfer,
    PoolingTransfer,
    ReArray,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionTransferRecord {
    pub source: String,
    pub source_section: SbsSection,
    pub target: String,
    pub target_section: SbsSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CherryPickRecord {
    pub source: String,
    pub source_position: String,
    pub target: String,
    pub target_position: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VesselTransferRecord {
    pub source: String,
    pub target: String,
}

/// A historical lab event as described in a dataset file. Vessels are referenced by label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabEventRecord {
    pub event_type: LabEventType,
    pub timestamp: DateTime<Utc>,
    pub location: String,
    pub operator: String,
    #[serde(default)]
    pub disambiguator: u32,
    #[serde(default)]
    pub section_transfers: Vec<SectionTransferRecord>,
    #[serde(default)]
    pub cherry_picks: Vec<CherryPickRecord>,
    #[serde(default)]
    pub vessel_transfers: Vec<VesselTransferRecord>,
}
