use crate::{container::VesselContainer, event::EventId, geometry::VesselPosition, storage::StorageId};
use chrono::{DateTime, Utc};
use labtrack_schemas::vessel::{MetricRecord, PlateType, RackType, ReagentRecord, VesselType};
use serde::Serialize;
use std::collections::BTreeSet;

pub type Metric = MetricRecord;
pub type Reagent = ReagentRecord;

/// Handle of a vessel inside a [`LabStore`](crate::store::LabStore).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VesselId(pub(crate) usize);

impl VesselId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// The closed set of vessel variants.
#[derive(Debug, Clone, PartialEq)]
pub enum VesselKind {
    BarcodedTube,
    StaticPlate {
        plate_type: PlateType,
    },
    PlateWell {
        plate: VesselId,
        position: VesselPosition,
    },
    /// A physical rack; the formations it has held are kept in order, latest last.
    RackOfTubes {
        rack_type: RackType,
        formations: Vec<VesselId>,
    },
    /// An arrangement of tubes, identified by the digest of its contents.
    TubeFormation {
        rack_type: RackType,
        digest: String,
        racks: Vec<VesselId>,
    },
}

impl VesselKind {
    pub fn vessel_type(&self) -> VesselType {
        match self {
            VesselKind::BarcodedTube => VesselType::BarcodedTube,
            VesselKind::StaticPlate { .. } => VesselType::StaticPlate,
            VesselKind::PlateWell { .. } => VesselType::PlateWell,
            VesselKind::RackOfTubes { .. } => VesselType::RackOfTubes,
            VesselKind::TubeFormation { .. } => VesselType::TubeFormation,
        }
    }
}

/// A physical vessel and everything recorded against it.
#[derive(Debug, Clone)]
pub struct LabVessel {
    pub(crate) id: VesselId,
    pub(crate) label: String,
    pub(crate) kind: VesselKind,
    pub(crate) created_on: DateTime<Utc>,
    pub(crate) samples: BTreeSet<String>,
    pub(crate) metrics: Vec<Metric>,
    pub(crate) reagents: Vec<Reagent>,
    pub(crate) storage_location: Option<StorageId>,
    pub(crate) container: Option<VesselContainer>,
    pub(crate) memberships: Vec<VesselId>,
    pub(crate) transfers_from: Vec<EventId>,
    pub(crate) transfers_to: Vec<EventId>,
}

impl LabVessel {
    pub(crate) fn new(id: VesselId, label: String, kind: VesselKind, created_on: DateTime<Utc>) -> Self {
        Self {
            id,
            label,
            kind,
            created_on,
            samples: BTreeSet::new(),
            metrics: Vec::new(),
            reagents: Vec::new(),
            storage_location: None,
            container: None,
            memberships: Vec::new(),
            transfers_from: Vec::new(),
            transfers_to: Vec::new(),
        }
    }

    pub fn id(&self) -> VesselId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> &VesselKind {
        &self.kind
    }

    pub fn vessel_type(&self) -> VesselType {
        self.kind.vessel_type()
    }

    pub fn created_on(&self) -> DateTime<Utc> {
        self.created_on
    }

    /// Sample keys; samples outlive any one vessel and are shared by reference.
    pub fn samples(&self) -> &BTreeSet<String> {
        &self.samples
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    pub fn reagents(&self) -> &[Reagent] {
        &self.reagents
    }

    pub fn storage_location(&self) -> Option<StorageId> {
        self.storage_location
    }

    /// The container role, present for plates and tube formations.
    pub fn container(&self) -> Option<&VesselContainer> {
        self.container.as_ref()
    }

    /// Containers this vessel has been placed in.
    pub fn memberships(&self) -> &[VesselId] {
        &self.memberships
    }

    /// Events in which this vessel was a transfer source.
    pub fn transfers_from(&self) -> &[EventId] {
        &self.transfers_from
    }

    /// Events in which this vessel was a transfer target.
    pub fn transfers_to(&self) -> &[EventId] {
        &self.transfers_to
    }

    pub fn is_plate(&self) -> bool {
        matches!(self.kind, VesselKind::StaticPlate { .. })
    }

    pub fn is_tube(&self) -> bool {
        matches!(self.kind, VesselKind::BarcodedTube)
    }

    /// Index scheme names attached as reagents.
    pub fn indexing_schemes(&self) -> impl Iterator<Item = &str> {
        self.reagents.iter().filter_map(|r| match r {
            ReagentRecord::MolecularIndex { scheme } => Some(scheme.as_str()),
            ReagentRecord::Generic { .. } => None,
        })
    }
}
