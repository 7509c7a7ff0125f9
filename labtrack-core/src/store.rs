//! In-memory vessel and event graph.
//!
//! `LabStore` plays the persistence collaborator: it hands out [`VesselId`]s and
//! [`EventId`]s, answers load-by-label and load-by-digest, and is the only place where
//! containment and transfer history are mutated.

use crate::{
    container::{ContainmentConflict, VesselContainer},
    error::{LabError, Result},
    event::{EventId, LabEvent, LabEventBuilder, Transfer},
    geometry::{section_positions, VesselPosition},
    storage::{StorageId, StorageTree},
    vessel::{LabVessel, Metric, Reagent, VesselId, VesselKind},
};
use chrono::{DateTime, Utc};
use labtrack_schemas::{
    geometry::{GeometryKind, SbsSection},
    vessel::{PlateType, RackType},
};
use log::{debug, info};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct LabStore {
    vessels: Vec<LabVessel>,
    events: Vec<LabEvent>,
    labels: HashMap<String, VesselId>,
    storage: StorageTree,
}

/// Content digest of a tube arrangement.
///
/// SHA-256 over the rack type and the `position=label` lines in row-major order, so the
/// order tubes are listed in does not matter.
pub fn tube_formation_digest(rack_type: RackType, tubes: &[(VesselPosition, &str)]) -> String {
    let mut sorted: Vec<&(VesselPosition, &str)> = tubes.iter().collect();
    sorted.sort();
    let mut hasher = Sha256::new();
    hasher.update(format!("{:?}\n", rack_type));
    for (position, label) in sorted {
        hasher.update(format!("{}={}\n", position, label));
    }
    format!("{:x}", hasher.finalize())
}

impl LabStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: VesselId) -> Option<&LabVessel> {
        self.vessels.get(id.0)
    }

    /// # Panics
    ///
    /// If `id` was not issued by this store. Use [`get`](Self::get) for ids of unknown
    /// origin.
    pub fn vessel(&self, id: VesselId) -> &LabVessel {
        &self.vessels[id.0]
    }

    pub fn vessels(&self) -> &[LabVessel] {
        &self.vessels
    }

    /// # Panics
    ///
    /// If `id` was not issued by this store.
    pub fn label(&self, id: VesselId) -> &str {
        &self.vessels[id.0].label
    }

    /// # Panics
    ///
    /// If `id` was not issued by this store.
    pub fn event(&self, id: EventId) -> &LabEvent {
        &self.events[id.0]
    }

    pub fn events(&self) -> &[LabEvent] {
        &self.events
    }

    pub fn storage(&self) -> &StorageTree {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut StorageTree {
        &mut self.storage
    }

    pub fn load_by_label(&self, label: &str) -> Option<&LabVessel> {
        self.labels.get(label).map(|id| &self.vessels[id.0])
    }

    /// Tube formations are labelled by their digest.
    pub fn load_by_digest(&self, digest: &str) -> Option<&LabVessel> {
        self.load_by_label(digest)
            .filter(|v| matches!(v.kind, VesselKind::TubeFormation { .. }))
    }

    pub fn require(&self, label: &str) -> Result<VesselId> {
        self.labels
            .get(label)
            .copied()
            .ok_or_else(|| LabError::VesselNotFound(label.to_string()))
    }

    fn check_id(&self, id: VesselId) -> Result<()> {
        if id.0 < self.vessels.len() {
            Ok(())
        } else {
            Err(LabError::VesselNotFound(format!("{:?}", id)))
        }
    }

    fn insert_vessel(
        &mut self,
        label: &str,
        kind: VesselKind,
        created_on: DateTime<Utc>,
        geometry: Option<GeometryKind>,
    ) -> Result<VesselId> {
        if self.labels.contains_key(label) {
            return Err(LabError::DuplicateLabel(label.to_string()));
        }
        let id = VesselId(self.vessels.len());
        let mut vessel = LabVessel::new(id, label.to_string(), kind, created_on);
        vessel.container = geometry.map(|g| VesselContainer::new(id, g));
        self.vessels.push(vessel);
        self.labels.insert(label.to_string(), id);
        debug!("Registered vessel '{}'", label);
        Ok(id)
    }

    pub fn add_tube(&mut self, label: &str, created_on: DateTime<Utc>) -> Result<VesselId> {
        self.insert_vessel(label, VesselKind::BarcodedTube, created_on, None)
    }

    pub fn add_plate(
        &mut self,
        label: &str,
        plate_type: PlateType,
        created_on: DateTime<Utc>,
    ) -> Result<VesselId> {
        self.insert_vessel(
            label,
            VesselKind::StaticPlate { plate_type },
            created_on,
            Some(plate_type.geometry()),
        )
    }

    pub fn add_rack(
        &mut self,
        label: &str,
        rack_type: RackType,
        created_on: DateTime<Utc>,
    ) -> Result<VesselId> {
        let kind = VesselKind::RackOfTubes {
            rack_type,
            formations: Vec::new(),
        };
        self.insert_vessel(label, kind, created_on, None)
    }

    /// Returns the formation holding exactly these tubes, creating it on first sight.
    pub fn add_tube_formation(
        &mut self,
        rack_type: RackType,
        tubes: &[(VesselPosition, VesselId)],
        created_on: DateTime<Utc>,
    ) -> Result<VesselId> {
        for (_, tube) in tubes {
            self.check_id(*tube)?;
        }
        let labelled: Vec<(VesselPosition, &str)> =
            tubes.iter().map(|(p, t)| (*p, self.label(*t))).collect();
        let digest = tube_formation_digest(rack_type, &labelled);
        if let Some(existing) = self.labels.get(&digest) {
            return Ok(*existing);
        }

        let id = VesselId(self.vessels.len());
        let mut container = VesselContainer::new(id, rack_type.geometry());
        for (position, tube) in tubes {
            container
                .add_contained_vessel(*tube, *position)
                .map_err(|conflict| self.conflict_error(&digest, *tube, *position, conflict))?;
        }

        let kind = VesselKind::TubeFormation {
            rack_type,
            digest: digest.clone(),
            racks: Vec::new(),
        };
        self.insert_vessel(&digest, kind, created_on, None)?;
        self.vessels[id.0].container = Some(container);
        for (_, tube) in tubes {
            self.vessels[tube.0].memberships.push(id);
        }
        Ok(id)
    }

    fn conflict_error(
        &self,
        container: &str,
        vessel: VesselId,
        position: VesselPosition,
        conflict: ContainmentConflict,
    ) -> LabError {
        match conflict {
            ContainmentConflict::Occupied(existing) => LabError::PositionOccupied {
                container: container.to_string(),
                position: position.to_string(),
                existing: self.label(existing).to_string(),
                incoming: self.label(vessel).to_string(),
            },
            ContainmentConflict::AlreadyContained(current) => LabError::VesselAlreadyContained {
                container: container.to_string(),
                vessel: self.label(vessel).to_string(),
                position: current.to_string(),
            },
            ContainmentConflict::OutsideGeometry => LabError::PositionOutOfGeometry {
                container: container.to_string(),
                position: position.to_string(),
                geometry: "container".to_string(),
            },
        }
    }

    /// Records that `rack` now physically holds `formation`.
    pub fn place_formation_on_rack(&mut self, rack: VesselId, formation: VesselId) -> Result<()> {
        self.check_id(rack)?;
        self.check_id(formation)?;
        if !matches!(self.vessels[formation.0].kind, VesselKind::TubeFormation { .. }) {
            return Err(LabError::NotAContainer(self.label(formation).to_string()));
        }
        match &mut self.vessels[rack.0].kind {
            VesselKind::RackOfTubes { formations, .. } => {
                if formations.last() != Some(&formation) {
                    formations.push(formation);
                }
            }
            _ => return Err(LabError::NotAContainer(self.vessels[rack.0].label.clone())),
        }
        if let VesselKind::TubeFormation { racks, .. } = &mut self.vessels[formation.0].kind {
            if !racks.contains(&rack) {
                racks.push(rack);
            }
        }
        Ok(())
    }

    /// The formation a rack currently holds.
    pub fn current_formation(&self, rack: VesselId) -> Option<VesselId> {
        match &self.vessels.get(rack.0)?.kind {
            VesselKind::RackOfTubes { formations, .. } => formations.last().copied(),
            _ => None,
        }
    }

    /// The vessel whose container role a transfer addressed at `id` lands in. Racks
    /// resolve to their current formation.
    pub fn transfer_container(&self, id: VesselId) -> Result<VesselId> {
        self.check_id(id)?;
        let vessel = &self.vessels[id.0];
        match &vessel.kind {
            VesselKind::StaticPlate { .. } | VesselKind::TubeFormation { .. } => Ok(id),
            VesselKind::RackOfTubes { .. } => self
                .current_formation(id)
                .ok_or_else(|| LabError::NotAContainer(vessel.label.clone())),
            _ => Err(LabError::NotAContainer(vessel.label.clone())),
        }
    }

    /// The well entity at `position` of a plate, created and embedded on first request.
    pub fn well_at(&mut self, plate: VesselId, position: VesselPosition) -> Result<VesselId> {
        self.check_id(plate)?;
        let plate_vessel = &self.vessels[plate.0];
        let container = match (&plate_vessel.kind, &plate_vessel.container) {
            (VesselKind::StaticPlate { .. }, Some(container)) => container,
            _ => return Err(LabError::NotAContainer(plate_vessel.label.clone())),
        };
        if !container.geometry().contains(&position) {
            return Err(LabError::PositionOutOfGeometry {
                container: plate_vessel.label.clone(),
                position: position.to_string(),
                geometry: format!("{:?}", container.geometry().kind()),
            });
        }
        if let Some(existing) = container.vessel_at_position(&position) {
            return Ok(existing);
        }
        let label = format!("{}_{}", plate_vessel.label, position);
        let created_on = plate_vessel.created_on;
        let well = self.insert_vessel(
            &label,
            VesselKind::PlateWell { plate, position },
            created_on,
            None,
        )?;
        if let Some(container) = self.vessels[plate.0].container.as_mut() {
            container
                .add_contained_vessel(well, position)
                .map_err(|_| LabError::DuplicateLabel(label.clone()))?;
        }
        self.vessels[well.0].memberships.push(plate);
        Ok(well)
    }

    pub fn add_sample(&mut self, vessel: VesselId, sample_key: &str) -> Result<()> {
        self.check_id(vessel)?;
        self.vessels[vessel.0].samples.insert(sample_key.to_string());
        Ok(())
    }

    pub fn add_metric(&mut self, vessel: VesselId, metric: Metric) -> Result<()> {
        self.check_id(vessel)?;
        self.vessels[vessel.0].metrics.push(metric);
        Ok(())
    }

    pub fn add_reagent(&mut self, vessel: VesselId, reagent: Reagent) -> Result<()> {
        self.check_id(vessel)?;
        let reagents = &mut self.vessels[vessel.0].reagents;
        if !reagents.contains(&reagent) {
            reagents.push(reagent);
        }
        Ok(())
    }

    /// Puts a vessel in storage. Non-terminal locations store it in their loose bucket.
    pub fn store_vessel(&mut self, vessel: VesselId, location: StorageId) -> Result<StorageId> {
        self.check_id(vessel)?;
        let leaf = self.storage.leaf_for_vessel(location)?;
        self.vessels[vessel.0].storage_location = Some(leaf);
        Ok(leaf)
    }

    /// Records a new event after checking every transfer against container geometry.
    pub fn record_event(&mut self, event: LabEventBuilder) -> Result<EventId> {
        for transfer in &event.transfers {
            self.validate_transfer(transfer)?;
        }
        self.insert_event(event)
    }

    /// Loads a historical event as-is. Only vessel existence is checked; geometry
    /// problems surface later as traversal data-integrity errors.
    pub fn import_event(&mut self, event: LabEventBuilder) -> Result<EventId> {
        for transfer in &event.transfers {
            self.check_id(transfer.source())?;
            self.check_id(transfer.target())?;
        }
        self.insert_event(event)
    }

    fn insert_event(&mut self, event: LabEventBuilder) -> Result<EventId> {
        let id = EventId(self.events.len());
        for transfer in &event.transfers {
            let from = &mut self.vessels[transfer.source().0].transfers_from;
            if from.last() != Some(&id) {
                from.push(id);
            }
            let to = &mut self.vessels[transfer.target().0].transfers_to;
            if to.last() != Some(&id) {
                to.push(id);
            }
        }
        info!(
            "Recorded {:?} event {} with {} transfers",
            event.event_type,
            id,
            event.transfers.len()
        );
        self.events.push(LabEvent {
            id,
            event_type: event.event_type,
            timestamp: event.timestamp,
            location: event.location,
            operator: event.operator,
            disambiguator: event.disambiguator,
            transfers: event.transfers,
        });
        Ok(id)
    }

    fn require_container(&self, id: VesselId) -> Result<&VesselContainer> {
        self.check_id(id)?;
        self.vessels[id.0]
            .container
            .as_ref()
            .ok_or_else(|| LabError::NotAContainer(self.label(id).to_string()))
    }

    fn check_section(&self, container: VesselId, section: SbsSection) -> Result<()> {
        let geometry = self.require_container(container)?.geometry();
        if geometry.kind() != section.geometry() {
            return Err(LabError::PositionOutOfGeometry {
                container: self.label(container).to_string(),
                position: format!("{:?}", section),
                geometry: format!("{:?}", geometry.kind()),
            });
        }
        Ok(())
    }

    fn check_position(&self, container: VesselId, position: VesselPosition) -> Result<()> {
        let geometry = self.require_container(container)?.geometry();
        if !geometry.contains(&position) {
            return Err(LabError::PositionOutOfGeometry {
                container: self.label(container).to_string(),
                position: position.to_string(),
                geometry: format!("{:?}", geometry.kind()),
            });
        }
        Ok(())
    }

    fn validate_transfer(&self, transfer: &Transfer) -> Result<()> {
        match transfer {
            Transfer::Section {
                source,
                source_section,
                target,
                target_section,
            } => {
                self.check_section(*source, *source_section)?;
                self.check_section(*target, *target_section)?;
                let (from, to) = (
                    section_positions(*source_section).len(),
                    section_positions(*target_section).len(),
                );
                if from != to {
                    return Err(LabError::DataIntegrity {
                        event: "(new)".to_string(),
                        vessel: self.label(*target).to_string(),
                        position: format!("{:?}", target_section),
                        detail: format!(
                            "section {:?} has {} positions but {:?} has {}",
                            source_section, from, target_section, to
                        ),
                    });
                }
                Ok(())
            }
            Transfer::CherryPick {
                source,
                source_position,
                target,
                target_position,
            } => {
                self.check_position(*source, *source_position)?;
                self.check_position(*target, *target_position)
            }
            Transfer::VesselToVessel { source, target } => {
                self.check_id(*source)?;
                self.check_id(*target)
            }
        }
    }
}
