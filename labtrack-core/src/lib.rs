//! Vessel tracking for a genomics lab: container geometry, the transfer graph between
//! tubes, plates and racks, traversal over that graph, molecular indexing schemes and
//! the physical storage hierarchy.

pub mod container;
pub mod error;
pub mod event;
pub mod geometry;
pub mod indexing;
pub mod logger;
pub mod provenance;
pub mod storage;
pub mod store;
pub mod traversal;
pub mod vessel;

pub use error::{LabError, Result};
