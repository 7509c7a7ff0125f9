//! Provenance queries built on the traversal engine.

use crate::{
    error::{LabError, Result},
    event::EventId,
    geometry::VesselPosition,
    store::LabStore,
    traversal::{
        criteria::{
            IndexReagentCriteria, LabEventCriteria, NearestPlateCriteria, NearestSampleCriteria,
        },
        evaluate_criteria, HopLimit, TraversalBuilder, TraversalDirection, TraversalStart,
    },
    vessel::VesselId,
};
use std::collections::BTreeSet;

fn sorted_by_label(store: &LabStore, vessels: BTreeSet<VesselId>) -> Vec<VesselId> {
    let mut vessels: Vec<VesselId> = vessels.into_iter().collect();
    vessels.sort_by(|a, b| store.label(*a).cmp(store.label(*b)));
    vessels
}

fn plates_one_hop_away(
    store: &LabStore,
    plate: VesselId,
    direction: TraversalDirection,
) -> Result<Vec<VesselId>> {
    let outcome = TraversalBuilder::new(store)
        .from_vessel(plate)
        .direction(direction)
        .hop_limit(HopLimit::AtMost(1))
        .build()?
        .evaluate_criteria(&NearestPlateCriteria)?;
    let mut plates = outcome.output;
    plates.remove(&plate);
    Ok(sorted_by_label(store, plates))
}

/// Plates that transferred directly into `plate`, sorted by label. Racks, tubes and
/// plates further back are not included.
pub fn immediate_plate_parents(store: &LabStore, plate: VesselId) -> Result<Vec<VesselId>> {
    plates_one_hop_away(store, plate, TraversalDirection::Ancestors)
}

/// Plates that `plate` transferred directly into, sorted by label.
pub fn immediate_plate_children(store: &LabStore, plate: VesselId) -> Result<Vec<VesselId>> {
    plates_one_hop_away(store, plate, TraversalDirection::Descendants)
}

/// Events upstream of a vessel, within `hop_count` hops (0 for no bound).
pub fn ancestor_events(store: &LabStore, vessel: VesselId, hop_count: u32) -> Result<BTreeSet<EventId>> {
    let outcome = evaluate_criteria(
        store,
        TraversalStart::Vessel(vessel),
        &LabEventCriteria,
        TraversalDirection::Ancestors,
        hop_count,
        None,
    )?;
    Ok(outcome.output)
}

/// Events downstream of a vessel, within `hop_count` hops (0 for no bound).
pub fn descendant_events(store: &LabStore, vessel: VesselId, hop_count: u32) -> Result<BTreeSet<EventId>> {
    let outcome = evaluate_criteria(
        store,
        TraversalStart::Vessel(vessel),
        &LabEventCriteria,
        TraversalDirection::Descendants,
        hop_count,
        None,
    )?;
    Ok(outcome.output)
}

/// Sample keys held by the nearest upstream vessels that carry samples.
///
/// With a position, only material that ended up at that position is considered.
pub fn nearest_samples(
    store: &LabStore,
    vessel: VesselId,
    position: Option<VesselPosition>,
) -> Result<BTreeSet<String>> {
    let start = match position {
        Some(position) => TraversalStart::Position {
            container: vessel,
            position,
        },
        None => TraversalStart::Vessel(vessel),
    };
    let outcome = evaluate_criteria(
        store,
        start,
        &NearestSampleCriteria,
        TraversalDirection::Ancestors,
        0,
        None,
    )?;
    Ok(outcome.output)
}

/// Names of molecular indexing schemes attached anywhere upstream of a vessel.
pub fn ancestor_indexing_schemes(store: &LabStore, vessel: VesselId) -> Result<BTreeSet<String>> {
    let outcome = evaluate_criteria(
        store,
        TraversalStart::Vessel(vessel),
        &IndexReagentCriteria,
        TraversalDirection::Ancestors,
        0,
        None,
    )?;
    Ok(outcome.output)
}

/// Vessels that could have exchanged material with `vessel` outside a transfer: those
/// that took part in any of its events, and occupied positions next to it.
pub fn contamination_neighbours(store: &LabStore, vessel: VesselId) -> Result<Vec<VesselId>> {
    let subject = store
        .get(vessel)
        .ok_or_else(|| LabError::VesselNotFound(format!("{:?}", vessel)))?;
    let mut neighbours = BTreeSet::new();

    let mut events: Vec<EventId> = subject
        .transfers_from()
        .iter()
        .chain(subject.transfers_to())
        .copied()
        .collect();
    events.sort();
    events.dedup();
    for event in events {
        for transfer in store.event(event).transfers() {
            neighbours.insert(transfer.source());
            neighbours.insert(transfer.target());
        }
    }

    for container_id in subject.memberships() {
        if let Some(container) = store.vessel(*container_id).container() {
            if let Some(position) = container.position_of_vessel(vessel) {
                neighbours.extend(container.neighbors(&position).into_iter().map(|(_, v)| v));
            }
        }
    }

    neighbours.remove(&vessel);
    Ok(sorted_by_label(store, neighbours))
}
