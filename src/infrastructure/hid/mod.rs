//! HID Module
//!
//! Mouse reports and the boundary to the wireless HID stack.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                  HidMouse                    │
//! │  (sticky buttons, move/press/release/click)  │
//! └─────────────────────┬───────────────────────┘
//!                       │ MouseReport
//!                       ▼
//! ┌─────────────────────────────────────────────┐
//! │            impl HidTransport                 │
//! │  (advertising, pairing, GATT notify)         │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`report`] - Report layout, report descriptor, GATT identifiers
//! - [`mouse`] - Mouse front-end over a transport

pub mod mouse;
pub mod report;

pub use mouse::HidMouse;
pub use report::MouseReport;

use crate::error::TransportError;
use std::sync::Arc;

/// Wireless HID stack as seen by the motion pipeline.
///
/// Implementations run their own event context; every method here must be
/// cheap and non-blocking.
pub trait HidTransport {
    fn is_connected(&self) -> bool;

    /// Best-effort notification of one input report
    fn send_report(&self, report: &MouseReport) -> Result<(), TransportError>;

    /// Battery service level, 0..=100
    fn set_battery_level(&self, level: u8);
}

impl<T: HidTransport + ?Sized> HidTransport for Arc<T> {
    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn send_report(&self, report: &MouseReport) -> Result<(), TransportError> {
        (**self).send_report(report)
    }

    fn set_battery_level(&self, level: u8) {
        (**self).set_battery_level(level)
    }
}
