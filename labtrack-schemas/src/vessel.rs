use crate::geometry::GeometryKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Plate products with a fixed well layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PlateType {
    Eppendorf96,
    Eppendorf384,
    IndexedAdapterPlate96,
    Matrix96SameHeight,
    Plate24Well,
}

impl PlateType {
    pub fn geometry(&self) -> GeometryKind {
        match self {
            PlateType::Eppendorf96
            | PlateType::IndexedAdapterPlate96
            | PlateType::Matrix96SameHeight => GeometryKind::G12x8,
            PlateType::Eppendorf384 => GeometryKind::G24x16,
            PlateType::Plate24Well => GeometryKind::G6x4,
        }
    }
}

/// Racks that hold loose tubes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RackType {
    Matrix96,
    Matrix24,
    StripTube8,
    FlipperRack12,
}

impl RackType {
    pub fn geometry(&self) -> GeometryKind {
        match self {
            RackType::Matrix96 => GeometryKind::G12x8,
            RackType::Matrix24 => GeometryKind::G6x4,
            RackType::StripTube8 => GeometryKind::G8x1,
            RackType::FlipperRack12 => GeometryKind::G12x1,
        }
    }
}

/// Discriminant for the vessel variants, used in records and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VesselType {
    BarcodedTube,
    StaticPlate,
    PlateWell,
    RackOfTubes,
    TubeFormation,
}

/// A tube placed at a named rack position, as found in dataset files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TubePlacement {
    pub position: String,
    pub tube: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub name: String,
    pub value: f64,
    pub unit: Option<String>,
}

/// A reagent attached directly to a vessel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReagentRecord {
    MolecularIndex { scheme: String },
    Generic { name: String, lot: Option<String> },
}

/// One vessel as described in a dataset file.
///
/// Tube formations are not listed directly; a rack record with `tubes` describes the
/// arrangement and the formation is derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VesselRecord {
    /// The barcode printed on the vessel.
    pub label: String,
    pub vessel_type: VesselType,
    pub plate_type: Option<PlateType>,
    pub rack_type: Option<RackType>,
    pub created_on: Option<DateTime<Utc>>,
    /// Sample keys held by the vessel.
    #[serde(default)]
    pub samples: Vec<String>,
    #[serde(default)]
    pub metrics: Vec<MetricRecord>,
    #[serde(default)]
    pub reagents: Vec<ReagentRecord>,
    /// Tubes currently held by a rack.
    #[serde(default)]
    pub tubes: Vec<TubePlacement>,
    /// External id of the storage location the vessel sits in.
    pub storage_location: Option<String>,
}
