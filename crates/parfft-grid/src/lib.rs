#![forbid(unsafe_code)]

//! Structured-grid value types for the parfft workspace.
//!
//! This crate is the engine's view of the grid world: immutable integer boxes
//! over a global index space, ordered tilings of a domain, a map from boxes to
//! owning ranks, and dense per-box buffers with optional ghost growth. The
//! transform engine in `parfft-engine` consumes these types; it never defines
//! its own geometry.
//!
//! Axis 0 is always the unit-stride axis of a buffer (Fortran order).

pub mod boxarray;
pub mod distribution;
pub mod fab;
pub mod index;
pub mod proc_group;

pub use boxarray::{decompose, BoxArray};
pub use distribution::DistributionMapping;
pub use fab::{Fab, FabArray};
pub use index::{IndexBox, IndexType, IntVect, Periodicity};
pub use proc_group::ProcGroup;
