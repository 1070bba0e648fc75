//! Application layer: the report gate and its polling loop
//!
//! - [`gate`] - connection/calibration state machine and tick pipeline
//! - [`scheduler`] - fixed-cadence tick gating

pub mod gate;
pub mod scheduler;
