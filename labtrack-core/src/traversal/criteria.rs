use super::state::{NodeKey, TraversalContext, TraversalControl};
use crate::{
    event::EventId,
    vessel::{LabVessel, VesselId, VesselKind},
};
use labtrack_schemas::vessel::VesselType;
use serde::Serialize;
use std::collections::BTreeSet;

/// Decides what a walk collects.
///
/// Criteria hold configuration only; everything they find goes into the `Output`
/// accumulator the walk passes in, so one criteria value can drive many walks.
pub trait TransferCriteria {
    type Output: Default;

    fn evaluate_pre_order(
        &self,
        context: &TraversalContext<'_>,
        output: &mut Self::Output,
    ) -> TraversalControl;

    fn evaluate_post_order(&self, _context: &TraversalContext<'_>, _output: &mut Self::Output) {}
}

/// The plate a node belongs to, if any.
fn plate_at(context: &TraversalContext<'_>) -> Option<VesselId> {
    if let Some(container) = context.container.filter(|c| c.is_plate()) {
        return Some(container.id());
    }
    match context.vessel.map(LabVessel::kind) {
        Some(VesselKind::StaticPlate { .. }) => context.vessel.map(LabVessel::id),
        Some(VesselKind::PlateWell { plate, .. }) => Some(*plate),
        _ => None,
    }
}

/// Collects every event whose transfers were followed.
#[derive(Debug, Default, Clone, Copy)]
pub struct LabEventCriteria;

impl TransferCriteria for LabEventCriteria {
    type Output = BTreeSet<EventId>;

    fn evaluate_pre_order(
        &self,
        context: &TraversalContext<'_>,
        output: &mut Self::Output,
    ) -> TraversalControl {
        if let Some(event) = context.event {
            output.insert(event.id());
        }
        TraversalControl::Continue
    }
}

/// Collects the nearest plates away from the start and stops at each one found.
#[derive(Debug, Default, Clone, Copy)]
pub struct NearestPlateCriteria;

impl TransferCriteria for NearestPlateCriteria {
    type Output = BTreeSet<VesselId>;

    fn evaluate_pre_order(
        &self,
        context: &TraversalContext<'_>,
        output: &mut Self::Output,
    ) -> TraversalControl {
        if context.hop_count == 0 {
            return TraversalControl::Continue;
        }
        match plate_at(context) {
            Some(plate) => {
                output.insert(plate);
                TraversalControl::StopBranch
            }
            None => TraversalControl::Continue,
        }
    }
}

/// Collects the nearest barcoded tubes away from the start.
#[derive(Debug, Default, Clone, Copy)]
pub struct NearestTubeCriteria;

impl TransferCriteria for NearestTubeCriteria {
    type Output = BTreeSet<VesselId>;

    fn evaluate_pre_order(
        &self,
        context: &TraversalContext<'_>,
        output: &mut Self::Output,
    ) -> TraversalControl {
        match context.vessel.filter(|v| v.is_tube()) {
            Some(tube) if context.hop_count > 0 => {
                output.insert(tube.id());
                TraversalControl::StopBranch
            }
            _ => TraversalControl::Continue,
        }
    }
}

/// Collects sample keys from the nearest vessels that carry any, the start included.
#[derive(Debug, Default, Clone, Copy)]
pub struct NearestSampleCriteria;

impl TransferCriteria for NearestSampleCriteria {
    type Output = BTreeSet<String>;

    fn evaluate_pre_order(
        &self,
        context: &TraversalContext<'_>,
        output: &mut Self::Output,
    ) -> TraversalControl {
        match context.vessel.filter(|v| !v.samples().is_empty()) {
            Some(vessel) => {
                output.extend(vessel.samples().iter().cloned());
                TraversalControl::StopBranch
            }
            None => TraversalControl::Continue,
        }
    }
}

/// Collects every vessel reached, optionally restricted to some vessel types.
///
/// Position nodes without a vessel entity report their container instead.
#[derive(Debug, Default, Clone)]
pub struct VesselCollectorCriteria {
    pub vessel_types: Option<Vec<VesselType>>,
    pub include_start: bool,
}

impl TransferCriteria for VesselCollectorCriteria {
    type Output = BTreeSet<VesselId>;

    fn evaluate_pre_order(
        &self,
        context: &TraversalContext<'_>,
        output: &mut Self::Output,
    ) -> TraversalControl {
        if context.hop_count == 0 && !self.include_start {
            return TraversalControl::Continue;
        }
        let wanted = |vessel: &LabVessel| {
            self.vessel_types
                .as_ref()
                .map_or(true, |types| types.contains(&vessel.vessel_type()))
        };
        for vessel in [context.vessel, context.container].into_iter().flatten() {
            if wanted(vessel) {
                output.insert(vessel.id());
            }
        }
        TraversalControl::Continue
    }
}

/// Collects molecular indexing scheme names attached to any vessel reached.
#[derive(Debug, Default, Clone, Copy)]
pub struct IndexReagentCriteria;

impl TransferCriteria for IndexReagentCriteria {
    type Output = BTreeSet<String>;

    fn evaluate_pre_order(
        &self,
        context: &TraversalContext<'_>,
        output: &mut Self::Output,
    ) -> TraversalControl {
        for vessel in [context.vessel, context.container].into_iter().flatten() {
            output.extend(vessel.indexing_schemes().map(str::to_string));
        }
        TraversalControl::Continue
    }
}

/// One visited node, as written to traversal reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceRow {
    pub hop: u32,
    pub vessel: Option<String>,
    pub container: Option<String>,
    pub position: Option<String>,
    pub event: Option<String>,
    pub event_type: Option<String>,
    pub samples: Vec<String>,
}

/// Records every node in visit order, keeping position nodes that hold no vessel only
/// when `include_empty_positions` is set.
#[derive(Debug, Default, Clone, Copy)]
pub struct TraceCriteria {
    pub include_empty_positions: bool,
}

impl TransferCriteria for TraceCriteria {
    type Output = Vec<TraceRow>;

    fn evaluate_pre_order(
        &self,
        context: &TraversalContext<'_>,
        output: &mut Self::Output,
    ) -> TraversalControl {
        let empty_position = matches!(context.node, NodeKey::At(..)) && context.vessel.is_none();
        if empty_position && !self.include_empty_positions && context.hop_count > 0 {
            return TraversalControl::Continue;
        }
        output.push(TraceRow {
            hop: context.hop_count,
            vessel: context.vessel.map(|v| v.label().to_string()),
            container: context.container.map(|c| c.label().to_string()),
            position: context.position.map(|p| p.to_string()),
            event: context.event.map(|e| e.id().to_string()),
            event_type: context.event.map(|e| format!("{:?}", e.event_type())),
            samples: context
                .vessel
                .map(|v| v.samples().iter().cloned().collect())
                .unwrap_or_default(),
        });
        TraversalControl::Continue
    }
}

/// Stops the whole walk as soon as `target` is reached.
#[derive(Debug, Clone, Copy)]
pub struct ReachesVesselCriteria {
    pub target: VesselId,
}

impl TransferCriteria for ReachesVesselCriteria {
    type Output = bool;

    fn evaluate_pre_order(
        &self,
        context: &TraversalContext<'_>,
        output: &mut Self::Output,
    ) -> TraversalControl {
        let hit = [context.vessel, context.container]
            .into_iter()
            .flatten()
            .any(|v| v.id() == self.target);
        if hit && context.hop_count > 0 {
            *output = true;
            return TraversalControl::Stop;
        }
        TraversalControl::Continue
    }
}
