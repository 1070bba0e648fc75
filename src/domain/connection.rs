//! Connection lifecycle
//!
//! The HID stack's event context and the motion loop share one
//! [`ConnectionState`] cell. The HID side only reports connect/disconnect;
//! the motion loop is the only writer of the calibrated state.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ConnectionState {
    #[default]
    Disconnected = 0,
    ConnectedUncalibrated = 1,
    ConnectedCalibrated = 2,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::ConnectedUncalibrated,
            2 => Self::ConnectedCalibrated,
            _ => Self::Disconnected,
        }
    }

    pub fn is_connected(&self) -> bool {
        !matches!(self, Self::Disconnected)
    }
}

/// Low byte holds the state, the upper bits count connections
const STATE_MASK: u32 = 0xFF;
const EPOCH_SHIFT: u32 = 8;

fn pack(epoch: u32, state: ConnectionState) -> u32 {
    (epoch << EPOCH_SHIFT) | state as u32
}

fn unpack(raw: u32) -> (u32, ConnectionState) {
    (
        raw >> EPOCH_SHIFT,
        ConnectionState::from_u8((raw & STATE_MASK) as u8),
    )
}

/// Atomic connection state shared between the HID event context and the gate.
///
/// Every connect starts a new epoch, so a calibration that started under one
/// connection can never be applied to the next one, even if the state reads
/// `ConnectedUncalibrated` again by the time the batch completes.
#[derive(Debug, Clone, Default)]
pub struct SharedConnectionState {
    inner: Arc<AtomicU32>,
}

impl SharedConnectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> ConnectionState {
        unpack(self.inner.load(Ordering::Acquire)).1
    }

    /// Connection counter, bumped on every accepted connect
    pub fn epoch(&self) -> u32 {
        unpack(self.inner.load(Ordering::Acquire)).0
    }

    /// Peer connected. No-op unless currently disconnected.
    pub fn on_connect(&self) -> bool {
        let result = self
            .inner
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                let (epoch, state) = unpack(raw);
                (state == ConnectionState::Disconnected).then(|| {
                    pack(
                        epoch.wrapping_add(1) & (u32::MAX >> EPOCH_SHIFT),
                        ConnectionState::ConnectedUncalibrated,
                    )
                })
            });
        let changed = result.is_ok();
        if changed {
            info!("Peer connected, calibration pending");
        }
        changed
    }

    /// Peer disconnected. No-op when already disconnected.
    pub fn on_disconnect(&self) -> bool {
        let result = self
            .inner
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                let (epoch, state) = unpack(raw);
                state
                    .is_connected()
                    .then(|| pack(epoch, ConnectionState::Disconnected))
            });
        match result {
            Ok(raw) => {
                info!("Peer disconnected (was {:?})", unpack(raw).1);
                true
            }
            Err(_) => false,
        }
    }

    /// Promote `ConnectedUncalibrated` to `ConnectedCalibrated` for the
    /// connection identified by `epoch`. Fails when that connection went away
    /// while the calibration batch was running, including when a new peer has
    /// connected since.
    pub fn mark_calibrated(&self, epoch: u32) -> bool {
        self.inner
            .compare_exchange(
                pack(epoch, ConnectionState::ConnectedUncalibrated),
                pack(epoch, ConnectionState::ConnectedCalibrated),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}
