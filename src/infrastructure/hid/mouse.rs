use super::{HidTransport, MouseReport};
use crate::domain::models::buttons;
use crate::error::TransportError;
use std::time::Duration;
use tracing::{debug, trace};

/// Hold time between press and release of a click, long enough for host
/// side button debounce
pub const CLICK_HOLD: Duration = Duration::from_millis(10);

/// Mouse front-end over a [`HidTransport`]. Button state is sticky: every
/// report carries the currently pressed buttons until [`HidMouse::release`].
pub struct HidMouse<T: HidTransport> {
    transport: T,
    buttons: u8,
}

impl<T: HidTransport> HidMouse<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            buttons: 0,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn buttons(&self) -> u8 {
        self.buttons
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Move the cursor by a relative offset
    pub fn move_cursor(&self, dx: i8, dy: i8) -> Result<(), TransportError> {
        self.move_with_wheel(dx, dy, 0)
    }

    pub fn move_with_wheel(&self, dx: i8, dy: i8, wheel: i8) -> Result<(), TransportError> {
        self.send(MouseReport::new(self.buttons, dx, dy, wheel))
    }

    /// Press button(s) and keep them pressed
    pub fn press(&mut self, mask: u8) -> Result<(), TransportError> {
        self.buttons |= mask & buttons::ALL;
        debug!("Press {:#04x}, held {:#04x}", mask, self.buttons);
        self.send(MouseReport::new(self.buttons, 0, 0, 0))
    }

    /// Release all buttons
    pub fn release(&mut self) -> Result<(), TransportError> {
        self.buttons = 0;
        debug!("Release all buttons");
        self.send(MouseReport::default())
    }

    /// Press, hold for [`CLICK_HOLD`], release.
    /// A press that cannot be sent drops the clicked buttons again.
    pub async fn click(&mut self, mask: u8) -> Result<(), TransportError> {
        if let Err(e) = self.press(mask) {
            self.buttons &= !mask;
            return Err(e);
        }
        tokio::time::sleep(CLICK_HOLD).await;
        self.release()
    }

    pub fn set_battery_level(&self, level: u8) {
        let level = level.min(100);
        debug!("Battery level {}%", level);
        self.transport.set_battery_level(level);
    }

    fn send(&self, report: MouseReport) -> Result<(), TransportError> {
        if !self.transport.is_connected() {
            return Err(TransportError::NotConnected);
        }
        trace!("Report {:?}", report);
        self.transport.send_report(&report)
    }
}
