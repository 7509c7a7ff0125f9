use crate::{geometry::VesselPosition, vessel::VesselId};
use chrono::{DateTime, Utc};
use labtrack_schemas::{event::LabEventType, geometry::SbsSection};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EventId(pub(crate) usize);

impl EventId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One movement of material recorded by an event.
#[derive(Debug, Clone, PartialEq)]
pub enum Transfer {
    /// Whole-container transfer; index `i` of the source section feeds index `i` of
    /// the target section.
    Section {
        source: VesselId,
        source_section: SbsSection,
        target: VesselId,
        target_section: SbsSection,
    },
    CherryPick {
        source: VesselId,
        source_position: VesselPosition,
        target: VesselId,
        target_position: VesselPosition,
    },
    VesselToVessel {
        source: VesselId,
        target: VesselId,
    },
}

impl Transfer {
    pub fn source(&self) -> VesselId {
        match self {
            Transfer::Section { source, .. }
            | Transfer::CherryPick { source, .. }
            | Transfer::VesselToVessel { source, .. } => *source,
        }
    }

    pub fn target(&self) -> VesselId {
        match self {
            Transfer::Section { target, .. }
            | Transfer::CherryPick { target, .. }
            | Transfer::VesselToVessel { target, .. } => *target,
        }
    }
}

/// An immutable historical fact: material moved at a point in time.
#[derive(Debug, Clone)]
pub struct LabEvent {
    pub(crate) id: EventId,
    pub(crate) event_type: LabEventType,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) location: String,
    pub(crate) operator: String,
    pub(crate) disambiguator: u32,
    pub(crate) transfers: Vec<Transfer>,
}

impl LabEvent {
    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn event_type(&self) -> LabEventType {
        self.event_type
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn operator(&self) -> &str {
        &self.operator
    }

    pub fn disambiguator(&self) -> u32 {
        self.disambiguator
    }

    pub fn transfers(&self) -> &[Transfer] {
        &self.transfers
    }
}

/// A fluent builder for a [`LabEvent`], handed to
/// [`LabStore::record_event`](crate::store::LabStore::record_event).
#[derive(Debug, Clone)]
pub struct LabEventBuilder {
    pub(crate) event_type: LabEventType,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) location: String,
    pub(crate) operator: String,
    pub(crate) disambiguator: u32,
    pub(crate) transfers: Vec<Transfer>,
}

impl LabEventBuilder {
    pub fn new(event_type: LabEventType, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_type,
            timestamp,
            location: String::new(),
            operator: String::new(),
            disambiguator: 0,
            transfers: Vec::new(),
        }
    }

    pub fn location(mut self, location: &str) -> Self {
        self.location = location.to_string();
        self
    }

    pub fn operator(mut self, operator: &str) -> Self {
        self.operator = operator.to_string();
        self
    }

    /// Distinguishes events of the same type, time and place.
    pub fn disambiguator(mut self, disambiguator: u32) -> Self {
        self.disambiguator = disambiguator;
        self
    }

    pub fn section_transfer(
        mut self,
        source: VesselId,
        source_section: SbsSection,
        target: VesselId,
        target_section: SbsSection,
    ) -> Self {
        self.transfers.push(Transfer::Section {
            source,
            source_section,
            target,
            target_section,
        });
        self
    }

    pub fn cherry_pick(
        mut self,
        source: VesselId,
        source_position: VesselPosition,
        target: VesselId,
        target_position: VesselPosition,
    ) -> Self {
        self.transfers.push(Transfer::CherryPick {
            source,
            source_position,
            target,
            target_position,
        });
        self
    }

    pub fn vessel_transfer(mut self, source: VesselId, target: VesselId) -> Self {
        self.transfers.push(Transfer::VesselToVessel { source, target });
        self
    }
}
