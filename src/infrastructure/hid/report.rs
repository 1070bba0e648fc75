//! HID mouse report wire format
//!
//! ```text
//! [0] : Buttons  bit 0: Left, bit 1: Right, bit 2: Middle, bits 3-7: padding
//! [1] : X        i8, relative
//! [2] : Y        i8, relative
//! [3] : Wheel    i8, relative
//! ```
//!
//! The report ID is carried by the report reference descriptor, not in the
//! payload.

use crate::domain::models::buttons;
use crate::error::TransportError;
use packed_struct::prelude::*;

/// Report ID of the mouse input report
pub const REPORT_ID: u8 = 0x01;

/// Payload size in bytes
pub const REPORT_SIZE: usize = 4;

/// Smallest value a relative axis may carry; -128 is outside the logical range
pub const AXIS_MIN: i8 = -127;

/// HID report map: one mouse with 3 buttons and X/Y/Wheel relative axes
pub const REPORT_DESCRIPTOR: [u8; 54] = [
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x02, // Usage (Mouse)
    0xA1, 0x01, // Collection (Application)
    0x85, 0x01, //   Report ID (1)
    0x09, 0x01, //   Usage (Pointer)
    0xA1, 0x00, //   Collection (Physical)
    0x05, 0x09, //     Usage Page (Button)
    0x19, 0x01, //     Usage Minimum (1)
    0x29, 0x03, //     Usage Maximum (3)
    0x15, 0x00, //     Logical Minimum (0)
    0x25, 0x01, //     Logical Maximum (1)
    0x95, 0x03, //     Report Count (3)
    0x75, 0x01, //     Report Size (1)
    0x81, 0x02, //     Input (Data, Variable, Absolute)
    0x95, 0x01, //     Report Count (1)
    0x75, 0x05, //     Report Size (5)
    0x81, 0x03, //     Input (Constant)
    0x05, 0x01, //     Usage Page (Generic Desktop)
    0x09, 0x30, //     Usage (X)
    0x09, 0x31, //     Usage (Y)
    0x09, 0x38, //     Usage (Wheel)
    0x15, 0x81, //     Logical Minimum (-127)
    0x25, 0x7F, //     Logical Maximum (127)
    0x75, 0x08, //     Report Size (8)
    0x95, 0x03, //     Report Count (3)
    0x81, 0x06, //     Input (Data, Variable, Relative)
    0xC0, //   End Collection
    0xC0, // End Collection
];

/// HID Information: bcdHID 1.11, no country code, normally connectable
pub const HID_INFORMATION: [u8; 4] = [0x11, 0x01, 0x00, 0x02];

/// Protocol Mode characteristic value for report protocol
pub const PROTOCOL_MODE_REPORT: u8 = 0x01;

/// GATT identifiers of the HID-over-GATT profile
pub mod gatt {
    pub const HID_SERVICE_UUID: u16 = 0x1812;
    pub const BATTERY_SERVICE_UUID: u16 = 0x180F;

    pub const DEVICE_NAME_UUID: u16 = 0x2A00;
    pub const BATTERY_LEVEL_UUID: u16 = 0x2A19;
    pub const MANUFACTURER_NAME_UUID: u16 = 0x2A29;
    pub const HID_INFORMATION_UUID: u16 = 0x2A4A;
    pub const REPORT_MAP_UUID: u16 = 0x2A4B;
    pub const REPORT_UUID: u16 = 0x2A4D;
    pub const PROTOCOL_MODE_UUID: u16 = 0x2A4E;
}

#[derive(PackedStruct, Debug, Copy, Clone, Default, PartialEq, Eq)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "4")]
pub struct MouseReport {
    #[packed_field(bytes = "0")]
    pub buttons: u8,
    #[packed_field(bytes = "1")]
    pub dx: i8,
    #[packed_field(bytes = "2")]
    pub dy: i8,
    #[packed_field(bytes = "3")]
    pub wheel: i8,
}

impl MouseReport {
    /// Build a report, masking undescribed button bits and keeping every
    /// axis inside -127..=127
    pub fn new(button_mask: u8, dx: i8, dy: i8, wheel: i8) -> Self {
        Self {
            buttons: button_mask & buttons::ALL,
            dx: dx.max(AXIS_MIN),
            dy: dy.max(AXIS_MIN),
            wheel: wheel.max(AXIS_MIN),
        }
    }

    pub fn to_bytes(&self) -> Result<[u8; REPORT_SIZE], TransportError> {
        Ok(self.pack()?)
    }

    pub fn from_bytes(bytes: &[u8; REPORT_SIZE]) -> Result<Self, TransportError> {
        Ok(Self::unpack(bytes)?)
    }

    pub fn has_motion(&self) -> bool {
        self.dx != 0 || self.dy != 0 || self.wheel != 0
    }
}
