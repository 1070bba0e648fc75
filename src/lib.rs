//! Air Mouse
//!
//! Turns gyroscope angular rate into relative cursor motion delivered as HID
//! mouse reports over a wireless transport.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │    Bias      │   │    Motion    │   │    Motion    │   │ Report Gate  │
//! │  Calibrator  │──▶│    Filter    │──▶│  Integrator  │──▶│ (state mach.)│──▶ HID
//! └──────────────┘   └──────────────┘   └──────────────┘   └──────────────┘
//! ```
//!
//! - [`domain`] - pure pipeline stages, data model and settings
//! - [`infrastructure`] - sensor driver, HID report/transport, logging
//! - [`application`] - the report gate and its tick loop

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use application::gate::{GateCommand, ReportGate};
pub use error::{SensorError, TransportError};
