//! Domain state owned by the monitors.

pub mod region;

pub use region::{Region, RegionId, RegionTable};
