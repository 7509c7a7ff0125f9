use crate::{
    event::LabEvent,
    geometry::VesselPosition,
    store::LabStore,
    vessel::{LabVessel, VesselId},
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraversalDirection {
    /// Follow transfers backwards, towards where material came from.
    Ancestors,
    /// Follow transfers forwards, towards where material went.
    Descendants,
}

/// How many transfer hops a walk may take from its start.
///
/// `AtMost(0)` evaluates the start only. The numeric form used by callers maps `0` to
/// `Unbounded`; see the `From<u32>` impl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HopLimit {
    #[default]
    Unbounded,
    AtMost(u32),
}

impl HopLimit {
    /// Whether a node `hop` transfers away from the start may be reached.
    pub fn allows(&self, hop: u32) -> bool {
        match self {
            HopLimit::Unbounded => true,
            HopLimit::AtMost(max) => hop <= *max,
        }
    }
}

impl From<u32> for HopLimit {
    /// `0` means no bound at all, any other value bounds the walk to that many hops.
    fn from(hop_count: u32) -> Self {
        if hop_count == 0 {
            HopLimit::Unbounded
        } else {
            HopLimit::AtMost(hop_count)
        }
    }
}

/// Where a walk begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalStart {
    /// A whole vessel. Containers are walked from every position they have.
    Vessel(VesselId),
    /// One position of a container (a rack resolves to its current formation).
    Position {
        container: VesselId,
        position: VesselPosition,
    },
}

/// A node of the walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKey {
    /// A position inside a container, whether or not a vessel entity sits there.
    At(VesselId, VesselPosition),
    /// A vessel addressed as a whole.
    Whole(VesselId),
}

/// Returned by criteria to steer the walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalControl {
    Continue,
    /// Do not walk past this node, siblings are still visited.
    StopBranch,
    /// End the whole walk.
    Stop,
}

/// What criteria see at each node.
#[derive(Debug, Clone, Copy)]
pub struct TraversalContext<'a> {
    pub store: &'a LabStore,
    pub node: NodeKey,
    /// The vessel at this node: the whole vessel, or the entity sitting at the position.
    pub vessel: Option<&'a LabVessel>,
    /// The container for position nodes.
    pub container: Option<&'a LabVessel>,
    pub position: Option<VesselPosition>,
    /// The event whose transfer led here, `None` at the start.
    pub event: Option<&'a LabEvent>,
    pub hop_count: u32,
    pub direction: TraversalDirection,
}

impl<'a> TraversalContext<'a> {
    /// The vessel most useful for reporting: the entity at the node, else its container.
    pub fn subject(&self) -> Option<&'a LabVessel> {
        self.vessel.or(self.container)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraversalOutcome<O> {
    pub output: O,
    /// Deepest hop reached.
    pub max_hop: u32,
    pub nodes_visited: usize,
    pub edges_followed: usize,
    /// Whether the hop limit withheld at least one edge.
    pub truncated: bool,
}

/// Cooperative cancellation shared between a caller and running walks.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn zero_hop_count_means_unbounded() {
        assert_eq!(HopLimit::from(0u32), HopLimit::Unbounded);
        assert_eq!(HopLimit::from(3u32), HopLimit::AtMost(3));
        assert!(HopLimit::Unbounded.allows(u32::MAX));
        assert!(HopLimit::AtMost(3).allows(3));
        assert!(!HopLimit::AtMost(3).allows(4));
        assert!(HopLimit::AtMost(0).allows(0));
        assert!(!HopLimit::AtMost(0).allows(1));
    }

    #[test]
    fn cancellation_is_shared_between_clones() {
        let token = CancelToken::new();
        let handle = token.clone();
        assert!(!handle.is_cancelled());
        token.cancel();
        assert!(handle.is_cancelled());
    }
}
