//! Simulated collaborators
//!
//! A register-level MPU6050 model and a loopback HID stack, so the whole
//! pipeline can run on a desktop without hardware.

use crate::domain::connection::SharedConnectionState;
use crate::domain::settings::DeviceSettings;
use crate::error::{SensorError, TransportError};
use crate::infrastructure::hid::report::{
    gatt, HID_INFORMATION, PROTOCOL_MODE_REPORT, REPORT_DESCRIPTOR, REPORT_ID, REPORT_SIZE,
};
use crate::infrastructure::hid::{HidTransport, MouseReport};
use crate::infrastructure::sensor::mpu6050::GYRO_SENSITIVITY;
use crate::infrastructure::sensor::RegisterBus;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use tracing::{debug, info};

const REG_PWR_MGMT_1: u8 = 0x6B;
const REG_GYRO_YOUT_H: u8 = 0x45;
const SLEEP_BIT: u8 = 0x40;

/// Every n-th gyro read NACKs
const NACK_EVERY: u64 = 97;

/// MPU6050 register model producing slow sweeping rotation on top of a
/// constant rest offset and a little noise
pub struct SimulatedBus {
    registers: HashMap<u8, u8>,
    rest_offset: (f32, f32),
    reads: u64,
    seed: u32,
}

impl Default for SimulatedBus {
    fn default() -> Self {
        Self::new((0.8, -1.1))
    }
}

impl SimulatedBus {
    pub fn new(rest_offset: (f32, f32)) -> Self {
        let mut registers = HashMap::new();
        // Powers up asleep
        registers.insert(REG_PWR_MGMT_1, SLEEP_BIT);
        Self {
            registers,
            rest_offset,
            reads: 0,
            seed: 0x1234_5678,
        }
    }

    fn asleep(&self) -> bool {
        self.registers
            .get(&REG_PWR_MGMT_1)
            .is_some_and(|v| v & SLEEP_BIT != 0)
    }

    fn noise(&mut self) -> f32 {
        self.seed = self.seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        ((self.seed >> 16) % 100) as f32 / 100.0 - 0.5
    }

    /// Angular rate for the current read, deg/s
    fn angular_rate(&mut self) -> (f32, f32) {
        // ~2.4s of stillness at the start of every 1000 reads for calibration
        let phase = self.reads % 1000;
        let (mut y, mut z) = self.rest_offset;
        if phase >= 150 {
            let t = phase as f32 * 0.02;
            y += 25.0 * (t * 0.7).sin();
            z += 40.0 * t.sin();
        }
        y += self.noise() * 0.3;
        z += self.noise() * 0.3;
        (y, z)
    }
}

impl RegisterBus for SimulatedBus {
    fn read_registers(&mut self, addr: u8, count: usize) -> Result<Vec<u8>, SensorError> {
        if addr != REG_GYRO_YOUT_H || count != 4 {
            return Ok((0..count as u8)
                .map(|i| *self.registers.get(&addr.wrapping_add(i)).unwrap_or(&0))
                .collect());
        }

        self.reads += 1;
        if self.reads % NACK_EVERY == 0 {
            return Err(SensorError::Bus("simulated NACK".to_string()));
        }
        if self.asleep() {
            return Ok(vec![0; 4]);
        }

        let (y, z) = self.angular_rate();
        let raw_y = (y * GYRO_SENSITIVITY) as i16;
        let raw_z = (z * GYRO_SENSITIVITY) as i16;
        let mut bytes = Vec::with_capacity(4);
        bytes.extend_from_slice(&raw_y.to_be_bytes());
        bytes.extend_from_slice(&raw_z.to_be_bytes());
        Ok(bytes)
    }

    fn write_register(&mut self, addr: u8, value: u8) -> Result<(), SensorError> {
        self.registers.insert(addr, value);
        Ok(())
    }
}

/// HID stack stand-in that logs every report it is given and answers
/// characteristic reads the way the GATT server would
pub struct LoopbackTransport {
    device_name: String,
    manufacturer: String,
    connected: AtomicBool,
    battery: AtomicU8,
    last_report: AtomicU32,
    reports_sent: AtomicU64,
    link: SharedConnectionState,
}

impl LoopbackTransport {
    pub fn new(link: SharedConnectionState, device: &DeviceSettings) -> Self {
        Self {
            device_name: device.name.clone(),
            manufacturer: device.manufacturer.clone(),
            connected: AtomicBool::new(false),
            battery: AtomicU8::new(device.battery_level.min(100)),
            last_report: AtomicU32::new(0),
            reports_sent: AtomicU64::new(0),
            link,
        }
    }

    /// Host connected (HID stack event context)
    pub fn connect(&self) {
        self.connected.store(true, Ordering::Release);
        info!(
            "Host connected to '{}' ({}), services {:#06x}/{:#06x}, HID info {:02X?}",
            self.device_name,
            self.manufacturer,
            gatt::HID_SERVICE_UUID,
            gatt::BATTERY_SERVICE_UUID,
            HID_INFORMATION
        );
        self.link.on_connect();
    }

    /// Host went away (HID stack event context)
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
        self.link.on_disconnect();
    }

    /// Value a host would read from the characteristic `uuid`
    pub fn read_characteristic(&self, uuid: u16) -> Option<Vec<u8>> {
        let value = match uuid {
            gatt::DEVICE_NAME_UUID => self.device_name.as_bytes().to_vec(),
            gatt::MANUFACTURER_NAME_UUID => self.manufacturer.as_bytes().to_vec(),
            gatt::BATTERY_LEVEL_UUID => vec![self.battery_level()],
            gatt::HID_INFORMATION_UUID => HID_INFORMATION.to_vec(),
            gatt::REPORT_MAP_UUID => REPORT_DESCRIPTOR.to_vec(),
            gatt::PROTOCOL_MODE_UUID => vec![PROTOCOL_MODE_REPORT],
            gatt::REPORT_UUID => self
                .last_report
                .load(Ordering::Relaxed)
                .to_be_bytes()
                .to_vec(),
            _ => return None,
        };
        Some(value)
    }

    pub fn reports_sent(&self) -> u64 {
        self.reports_sent.load(Ordering::Relaxed)
    }

    pub fn battery_level(&self) -> u8 {
        self.battery.load(Ordering::Relaxed)
    }
}

impl HidTransport for LoopbackTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn send_report(&self, report: &MouseReport) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let bytes: [u8; REPORT_SIZE] = report.to_bytes()?;
        self.last_report .store(u32::from_be_bytes(bytes), Ordering::Relaxed);
        self.reports_sent.fetch_add(1, Ordering::Relaxed);
        debug!("HID notify report {} {:02X?}", REPORT_ID, bytes);
        Ok(())
    }

    fn set_battery_level(&self, level: u8) {
        self.battery.store(level, Ordering::Relaxed);
        info!("Battery level set to {}%", level);
    }
}
