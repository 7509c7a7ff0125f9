use super::{
    engine::{start_node, TransferTraverser},
    state::{CancelToken, HopLimit, TraversalDirection, TraversalStart},
};
use crate::{
    error::{LabError, Result},
    geometry::VesselPosition,
    store::LabStore,
    vessel::VesselId,
};
use labtrack_schemas::event::LabEventType;
use std::time::Duration;

/// A fluent builder for constructing a [`TransferTraverser`].
///
/// Defaults: ancestors direction, no hop limit, no cancellation.
pub struct TraversalBuilder<'a> {
    store: &'a LabStore,
    start: Option<TraversalStart>,
    direction: TraversalDirection,
    hop_limit: HopLimit,
    start_event_type: Option<LabEventType>,
    cancel: Option<CancelToken>,
    deadline: Option<Duration>,
}

impl<'a> TraversalBuilder<'a> {
    pub fn new(store: &'a LabStore) -> Self {
        Self {
            store,
            start: None,
            direction: TraversalDirection::Ancestors,
            hop_limit: HopLimit::Unbounded,
            start_event_type: None,
            cancel: None,
            deadline: None,
        }
    }

    /// Starts from a whole vessel.
    pub fn from_vessel(mut self, vessel: VesselId) -> Self {
        self.start = Some(TraversalStart::Vessel(vessel));
        self
    }

    /// Starts from one position of a container.
    pub fn from_position(mut self, container: VesselId, position: VesselPosition) -> Self {
        self.start = Some(TraversalStart::Position {
            container,
            position,
        });
        self
    }

    pub fn direction(mut self, direction: TraversalDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Accepts a [`HopLimit`] or a raw hop count where `0` means unbounded.
    pub fn hop_limit(mut self, hop_limit: impl Into<HopLimit>) -> Self {
        self.hop_limit = hop_limit.into();
        self
    }

    /// Only follow events of this type on the first hop.
    pub fn start_event_type(mut self, event_type: LabEventType) -> Self {
        self.start_event_type = Some(event_type);
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Abandons each walk once it has run for `timeout`.
    pub fn deadline(mut self, timeout: Duration) -> Self {
        self.deadline = Some(timeout);
        self
    }

    /// Consumes the builder and returns a configured traverser.
    ///
    /// # Errors
    ///
    /// Fails when no start was given, or the start vessel or position does not exist.
    pub fn build(self) -> Result<TransferTraverser<'a>> {
        let start = self
            .start
            .ok_or_else(|| LabError::ConfigError("traversal start is missing".to_string()))?;
        Ok(TransferTraverser {
            store: self.store,
            start: start_node(self.store, start)?,
            direction: self.direction,
            hop_limit: self.hop_limit,
            start_event_type: self.start_event_type,
            cancel: self.cancel,
            deadline: self.deadline,
        })
    }
}
