use crate::{
    geometry::{VesselGeometry, VesselPosition},
    vessel::VesselId,
};
use labtrack_schemas::geometry::GeometryKind;
use std::collections::{BTreeMap, HashMap};

/// Why a vessel could not be added to a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainmentConflict {
    /// The position already holds a different vessel.
    Occupied(VesselId),
    /// The vessel already sits at another position of this container.
    AlreadyContained(VesselPosition),
    OutsideGeometry,
}

/// The role a vessel plays when it holds other vessels at named positions.
///
/// Forward and reverse maps are only ever changed together, so
/// `position_of_vessel(vessel_at_position(p)) == p` holds for every occupied `p`.
#[derive(Debug, Clone)]
pub struct VesselContainer {
    embedder: VesselId,
    geometry: VesselGeometry,
    by_position: BTreeMap<VesselPosition, VesselId>,
    by_vessel: HashMap<VesselId, VesselPosition>,
}

impl VesselContainer {
    pub fn new(embedder: VesselId, kind: GeometryKind) -> Self {
        Self {
            embedder,
            geometry: VesselGeometry::of(kind),
            by_position: BTreeMap::new(),
            by_vessel: HashMap::new(),
        }
    }

    /// The vessel that owns this role.
    pub fn embedder(&self) -> VesselId {
        self.embedder
    }

    pub fn geometry(&self) -> &VesselGeometry {
        &self.geometry
    }

    pub fn vessel_at_position(&self, position: &VesselPosition) -> Option<VesselId> {
        self.by_position.get(position).copied()
    }

    pub fn position_of_vessel(&self, vessel: VesselId) -> Option<VesselPosition> {
        self.by_vessel.get(&vessel).copied()
    }

    /// Places `vessel` at `position`.
    ///
    /// Re-adding a vessel at the position it already occupies is a no-op. Any other
    /// overlap is refused, the container is left untouched.
    pub fn add_contained_vessel(
        &mut self,
        vessel: VesselId,
        position: VesselPosition,
    ) -> Result<(), ContainmentConflict> {
        if !self.geometry.contains(&position) {
            return Err(ContainmentConflict::OutsideGeometry);
        }
        match self.by_position.get(&position) {
            Some(existing) if *existing == vessel => return Ok(()),
            Some(existing) => return Err(ContainmentConflict::Occupied(*existing)),
            None => {}
        }
        if let Some(current) = self.by_vessel.get(&vessel) {
            return Err(ContainmentConflict::AlreadyContained(*current));
        }
        self.by_position.insert(position, vessel);
        self.by_vessel.insert(vessel, position);
        Ok(())
    }

    /// Contained vessels in row-major position order.
    pub fn contained_vessels(&self) -> impl Iterator<Item = (VesselPosition, VesselId)> + '_ {
        self.by_position.iter().map(|(p, v)| (*p, *v))
    }

    /// Occupied positions orthogonally adjacent to `position`.
    pub fn neighbors(&self, position: &VesselPosition) -> Vec<(VesselPosition, VesselId)> {
        self.geometry
            .adjacent(position)
            .into_iter()
            .filter_map(|p| self.vessel_at_position(&p).map(|v| (p, v)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_position.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_position.is_empty()
    }
}
