//! Shared data definitions for the labtrack workspace.
//!
//! Everything here is plain serde data: enumerations of container layouts, event and
//! storage vocabularies, and the record shapes used by YAML datasets. Behaviour lives in
//! `labtrack-core`.

pub mod event;
pub mod file_formats;
pub mod geometry;
pub mod indexing;
pub mod storage;
pub mod vessel;
