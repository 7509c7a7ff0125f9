use super::{
    criteria::TransferCriteria,
    state::{
        CancelToken, HopLimit, NodeKey, TraversalContext, TraversalControl, TraversalDirection,
        TraversalOutcome, TraversalStart,
    },
};
use crate::{
    error::{LabError, Result},
    event::{EventId, LabEvent, Transfer},
    geometry::{section_positions, VesselPosition},
    store::LabStore,
    vessel::{VesselId, VesselKind},
};
use chrono::{DateTime, Utc};
use labtrack_schemas::{event::LabEventType, geometry::SbsSection};
use log::debug;
use std::{collections::HashMap, time::Instant};

/// One transfer-level edge leaving a node in the walk direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Edge {
    timestamp: DateTime<Utc>,
    event: EventId,
    transfer_index: usize,
    from: NodeKey,
    to: NodeKey,
}

impl Edge {
    fn key(&self) -> (EventId, usize, NodeKey, NodeKey) {
        (self.event, self.transfer_index, self.from, self.to)
    }
}

/// A configured walk, built by [`TraversalBuilder`](super::TraversalBuilder).
#[derive(Debug, Clone)]
pub struct TransferTraverser<'a> {
    pub(super) store: &'a LabStore,
    pub(super) start: NodeKey,
    pub(super) direction: TraversalDirection,
    pub(super) hop_limit: HopLimit,
    pub(super) start_event_type: Option<LabEventType>,
    pub(super) cancel: Option<CancelToken>,
    pub(super) deadline: Option<std::time::Duration>,
}

impl<'a> TransferTraverser<'a> {
    /// Walks the graph, evaluating `criteria` at every node reached.
    ///
    /// Each call owns its accumulator and edge bookkeeping, so independent walks over
    /// the same store never interfere. An edge is only followed again when it is
    /// reached at a smaller hop count than before, which bounds the walk on cyclic
    /// data even without a hop limit.
    pub fn evaluate_criteria<C: TransferCriteria>(
        &self,
        criteria: &C,
    ) -> Result<TraversalOutcome<C::Output>> {
        let mut walk = Walk {
            traverser: self,
            criteria,
            deadline: self.deadline.map(|d| Instant::now() + d),
            followed: HashMap::new(),
            outcome: TraversalOutcome {
                output: C::Output::default(),
                max_hop: 0,
                nodes_visited: 0,
                edges_followed: 0,
                truncated: false,
            },
            stopped: false,
        };
        walk.visit(self.start, None, 0)?;
        debug!(
            "Traversal from {} ({:?}) visited {} nodes over {} edges, max hop {}{}",
            self.node_label(self.start),
            self.direction,
            walk.outcome.nodes_visited,
            walk.outcome.edges_followed,
            walk.outcome.max_hop,
            if walk.outcome.truncated { ", truncated by hop limit" } else { "" }
        );
        Ok(walk.outcome)
    }

    fn node_label(&self, node: NodeKey) -> String {
        match node {
            NodeKey::At(container, position) => {
                format!("{} {}", self.store.label(container), position)
            }
            NodeKey::Whole(vessel) => self.store.label(vessel).to_string(),
        }
    }

    fn integrity_error(
        &self,
        event: &LabEvent,
        container: VesselId,
        position: String,
        detail: String,
    ) -> LabError {
        LabError::DataIntegrity {
            event: format!("{} {:?}", event.id(), event.event_type()),
            vessel: self.store.label(container).to_string(),
            position,
            detail,
        }
    }

    /// Every address the material at `node` can be found under: the node itself, the
    /// vessel sitting there as a whole, the other containers that vessel has been
    /// placed in, and for whole containers each of their positions.
    fn addresses(&self, node: NodeKey) -> Vec<NodeKey> {
        let mut addresses = vec![node];
        let vessel = match node {
            NodeKey::At(container, position) => self
                .store
                .vessel(container)
                .container()
                .and_then(|c| c.vessel_at_position(&position)),
            NodeKey::Whole(vessel) => Some(vessel),
        };
        let Some(vessel_id) = vessel else {
            return addresses;
        };
        let vessel = self.store.vessel(vessel_id);
        if matches!(node, NodeKey::At(..)) {
            addresses.push(NodeKey::Whole(vessel_id));
        }
        for container_id in vessel.memberships() {
            let position = self
                .store
                .vessel(*container_id)
                .container()
                .and_then(|c| c.position_of_vessel(vessel_id));
            if let Some(position) = position {
                let address = NodeKey::At(*container_id, position);
                if !addresses.contains(&address) {
                    addresses.push(address);
                }
            }
        }
        if let (NodeKey::Whole(_), Some(container)) = (node, vessel.container()) {
            addresses.extend(
                container
                    .geometry()
                    .positions()
                    .iter()
                    .map(|p| NodeKey::At(vessel_id, *p)),
            );
        }
        addresses
    }

    fn edges(&self, node: NodeKey, hop: u32) -> Result<Vec<Edge>> {
        let mut edges = Vec::new();
        for address in self.addresses(node) {
            self.address_edges(address, &mut edges)?;
        }
        if hop == 0 {
            if let Some(event_type) = self.start_event_type {
                edges.retain(|e| self.store.event(e.event).event_type() == event_type);
            }
        }
        edges.sort();
        edges.dedup();
        Ok(edges)
    }

    fn address_edges(&self, address: NodeKey, edges: &mut Vec<Edge>) -> Result<()> {
        let anchor = match address {
            NodeKey::At(container, _) | NodeKey::Whole(container) => container,
        };
        let vessel = self.store.vessel(anchor);
        let events = match self.direction {
            TraversalDirection::Ancestors => vessel.transfers_to(),
            TraversalDirection::Descendants => vessel.transfers_from(),
        };
        for event_id in events {
            let event = self.store.event(*event_id);
            for (transfer_index, transfer) in event.transfers().iter().enumerate() {
                let (near, far) = match self.direction {
                    TraversalDirection::Ancestors => (transfer.target(), transfer.source()),
                    TraversalDirection::Descendants => (transfer.source(), transfer.target()),
                };
                if near != anchor {
                    continue;
                }
                let edge = match (address, transfer) {
                    (NodeKey::Whole(_), Transfer::VesselToVessel { .. }) => {
                        Some((address, NodeKey::Whole(far)))
                    }
                    // A whole-vessel transfer moves every position with it, so each
                    // position reports it as the same edge leaving the whole container.
                    (NodeKey::At(..), Transfer::VesselToVessel { .. }) => {
                        Some((NodeKey::Whole(anchor), NodeKey::Whole(far)))
                    }
                    (NodeKey::Whole(_), Transfer::Section { .. } | Transfer::CherryPick { .. }) => {
                        if vessel.container().is_some() {
                            // Handled through the container's position addresses.
                            None
                        } else {
                            return Err(self.integrity_error(
                                event,
                                anchor,
                                String::new(),
                                "positional transfer on a vessel with no positions".to_string(),
                            ));
                        }
                    }
                    (NodeKey::At(_, position), Transfer::CherryPick {
                        source_position,
                        target_position,
                        ..
                    }) => {
                        let (near_position, far_position) = match self.direction {
                            TraversalDirection::Ancestors => (*target_position, *source_position),
                            TraversalDirection::Descendants => (*source_position, *target_position),
                        };
                        self.check_position(event, anchor, near_position)?;
                        if near_position != position {
                            None
                        } else {
                            self.check_position(event, far, far_position)?;
                            Some((address, NodeKey::At(far, far_position)))
                        }
                    }
                    (NodeKey::At(_, position), Transfer::Section {
                        source_section,
                        target_section,
                        ..
                    }) => {
                        let (near_section, far_section) = match self.direction {
                            TraversalDirection::Ancestors => (*target_section, *source_section),
                            TraversalDirection::Descendants => (*source_section, *target_section),
                        };
                        self.map_section(event, anchor, position, near_section, far, far_section)?
                            .map(|far_position| (address, NodeKey::At(far, far_position)))
                    }
                };
                if let Some((from, to)) = edge {
                    edges.push(Edge {
                        timestamp: event.timestamp(),
                        event: event.id(),
                        transfer_index,
                        from,
                        to,
                    });
                }
            }
        }
        Ok(())
    }

    /// The far position paired with `position` by a section transfer, `None` when the
    /// position is not covered by the section.
    fn map_section(
        &self,
        event: &LabEvent,
        near: VesselId,
        position: VesselPosition,
        near_section: SbsSection,
        far: VesselId,
        far_section: SbsSection,
    ) -> Result<Option<VesselPosition>> {
        self.check_section(event, near, near_section)?;
        self.check_section(event, far, far_section)?;
        let near_positions = section_positions(near_section);
        let Some(index) = near_positions.iter().position(|p| *p == position) else {
            return Ok(None);
        };
        let far_positions = section_positions(far_section);
        match far_positions.get(index) {
            Some(far_position) => Ok(Some(*far_position)),
            None => Err(self.integrity_error(
                event,
                near,
                position.to_string(),
                format!(
                    "section {:?} has no position {} to pair with {:?}",
                    far_section, index, near_section
                ),
            )),
        }
    }

    fn check_section(&self, event: &LabEvent, container: VesselId, section: SbsSection) -> Result<()> {
        let geometry = self
            .store
            .vessel(container)
            .container()
            .map(|c| c.geometry().kind());
        match geometry {
            Some(kind) if kind == section.geometry() => Ok(()),
            Some(kind) => Err(self.integrity_error(
                event,
                container,
                format!("{:?}", section),
                format!("section does not fit the {:?} layout", kind),
            )),
            None => Err(self.integrity_error(
                event,
                container,
                format!("{:?}", section),
                "vessel has no positions".to_string(),
            )),
        }
    }

    fn check_position(&self, event: &LabEvent, container: VesselId, position: VesselPosition) -> Result<()> {
        let fits = self
            .store
            .vessel(container)
            .container()
            .map_or(false, |c| c.geometry().contains(&position));
        if fits {
            Ok(())
        } else {
            Err(self.integrity_error(
                event,
                container,
                position.to_string(),
                "position is outside the container layout".to_string(),
            ))
        }
    }

    fn context(&self, node: NodeKey, event: Option<EventId>, hop: u32) -> TraversalContext<'a> {
        let store = self.store;
        let (vessel, container, position) = match node {
            NodeKey::At(container_id, position) => {
                let container = store.vessel(container_id);
                let vessel = container
                    .container()
                    .and_then(|c| c.vessel_at_position(&position))
                    .map(|v| store.vessel(v));
                (vessel, Some(container), Some(position))
            }
            NodeKey::Whole(vessel_id) => {
                let vessel = store.vessel(vessel_id);
                let position = match vessel.kind() {
                    VesselKind::PlateWell { position, .. } => Some(*position),
                    _ => None,
                };
                (Some(vessel), None, position)
            }
        };
        TraversalContext {
            store,
            node,
            vessel,
            container,
            position,
            event: event.map(|e| store.event(e)),
            hop_count: hop,
            direction: self.direction,
        }
    }
}

struct Walk<'t, 'a, C: TransferCriteria> {
    traverser: &'t TransferTraverser<'a>,
    criteria: &'t C,
    deadline: Option<Instant>,
    followed: HashMap<(EventId, usize, NodeKey, NodeKey), u32>,
    outcome: TraversalOutcome<C::Output>,
    stopped: bool,
}

impl<'t, 'a, C: TransferCriteria> Walk<'t, 'a, C> {
    fn check_cancelled(&self) -> Result<()> {
        let cancelled = self.traverser.cancel.as_ref().map_or(false, |t| t.is_cancelled())
            || self.deadline.map_or(false, |d| Instant::now() >= d);
        if cancelled {
            return Err(LabError::TraversalCancelled(
                self.traverser.node_label(self.traverser.start),
            ));
        }
        Ok(())
    }

    fn visit(&mut self, node: NodeKey, event: Option<EventId>, hop: u32) -> Result<()> {
        self.check_cancelled()?;
        self.outcome.nodes_visited += 1;
        self.outcome.max_hop = self.outcome.max_hop.max(hop);

        let context = self.traverser.context(node, event, hop);
        match self.criteria.evaluate_pre_order(&context, &mut self.outcome.output) {
            TraversalControl::Stop => {
                self.stopped = true;
            }
            TraversalControl::StopBranch => {}
            TraversalControl::Continue => {
                let edges = self.traverser.edges(node, hop)?;
                if !edges.is_empty() && !self.traverser.hop_limit.allows(hop + 1) {
                    self.outcome.truncated = true;
                } else {
                    for edge in edges {
                        if self.stopped {
                            break;
                        }
                        let key = edge.key();
                        if self.followed.get(&key).map_or(false, |previous| *previous <= hop) {
                            continue;
                        }
                        self.followed.insert(key, hop);
                        self.outcome.edges_followed += 1;
                        self.visit(edge.to, Some(edge.event), hop + 1)?;
                    }
                }
            }
        }
        self.criteria.evaluate_post_order(&context, &mut self.outcome.output);
        Ok(())
    }
}

/// Resolves a start into the node the walk begins at, validating positions.
pub(super) fn start_node(store: &LabStore, start: TraversalStart) -> Result<NodeKey> {
    match start {
        TraversalStart::Vessel(vessel) => {
            let vessel = store
                .vessels()
                .get(vessel.index())
                .ok_or_else(|| LabError::VesselNotFound(format!("{:?}", vessel)))?;
            match vessel.kind() {
                VesselKind::RackOfTubes { .. } => {
                    Ok(NodeKey::Whole(store.transfer_container(vessel.id())?))
                }
                _ => Ok(NodeKey::Whole(vessel.id())),
            }
        }
        TraversalStart::Position {
            container,
            position,
        } => {
            let container = store.transfer_container(container)?;
            let vessel = store.vessel(container);
            let fits = vessel
                .container()
                .map_or(false, |c| c.geometry().contains(&position));
            if !fits {
                return Err(LabError::PositionOutOfGeometry {
                    container: vessel.label().to_string(),
                    position: position.to_string(),
                    geometry: vessel
                        .container()
                        .map(|c| format!("{:?}", c.geometry().kind()))
                        .unwrap_or_default(),
                });
            }
            Ok(NodeKey::At(container, position))
        }
    }
}

/// Single-call form of a traversal: `hop_count` 0 is unbounded, and
/// `start_event_type` restricts the first hop to events of that type.
pub fn evaluate_criteria<C: TransferCriteria>(
    store: &LabStore,
    start: TraversalStart,
    criteria: &C,
    direction: TraversalDirection,
    hop_count: u32,
    start_event_type: Option<LabEventType>,
) -> Result<TraversalOutcome<C::Output>> {
    let traverser = TransferTraverser {
        store,
        start: start_node(store, start)?,
        direction,
        hop_limit: HopLimit::from(hop_count),
        start_event_type,
        cancel: None,
        deadline: None,
    };
    traverser.evaluate_criteria(criteria)
}
