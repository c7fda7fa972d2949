//! Pieces used by every foundrystats crate.

pub mod metrics_defs;
