//! Walks the transfer graph from a vessel or container position.
//!
//! The walk is position-level: a section transfer between two 96-well plates is 96
//! parallel edges, a cherry pick is exactly its explicit pairs, and a vessel-to-vessel
//! transfer is one edge between whole vessels. Criteria are evaluated at every node
//! reached and fold what they find into an accumulator owned by the walk.

pub mod builder;
pub mod criteria;
pub mod engine;
pub mod state;

pub use builder::TraversalBuilder;
pub use criteria::TransferCriteria;
pub use engine::{evaluate_criteria, TransferTraverser};
pub use state::{
    CancelToken, HopLimit, NodeKey, TraversalContext, TraversalControl, TraversalDirection,
    TraversalOutcome, TraversalStart,
};
