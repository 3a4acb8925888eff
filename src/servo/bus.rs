//! Servo Bus.
//!
//! The [`Bus`] owns the transport link and every [`Device`] discovered on it.
//! Devices live in a bus-owned collection in discovery order and are reached
//! by address or index; callers get borrows, never owning handles, because a
//! later [`scan`](Bus::scan) may retire a device that stopped answering.

use std::ops::{Deref, RangeInclusive};

use log::{debug, info, warn};

use super::channel::Link;
use super::device::Device;
use crate::common::{Error, Result, TransportOp};
use crate::config::{self, Config};
use crate::registers::Register;
use crate::stats::BusStats;
use crate::transport::{self, Transport};

/// A set of servos sharing one transport.
pub struct Bus {
    link: Option<Link>,
    devices: Vec<Device>,
    probe_range: RangeInclusive<u8>,
    default_locator: String,
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus {
    /// Creates a closed bus with no devices and the default probe range.
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    /// Creates a closed bus using the probe range and default locator of
    /// `config`.
    pub fn with_config(config: &Config) -> Self {
        Self {
            link: None,
            devices: Vec::new(),
            probe_range: config.probe.range(),
            default_locator: config.bus.locator.clone(),
        }
    }

    /// Opens the transport named by `locator`, closing any previous one.
    ///
    /// An empty locator uses the configured default, and failing that the
    /// platform default.
    pub fn open(&mut self, locator: &str) -> Result<()> {
        self.close()?;
        let locator = if locator.is_empty() {
            self.default_locator.as_str()
        } else {
            locator
        };
        let transport = transport::open(locator)?;
        self.attach(transport)
    }

    /// Installs an already opened transport, closing any previous one.
    pub fn attach(&mut self, transport: Box<dyn Transport>) -> Result<()> {
        self.close()?;
        info!("[Bus] Opened {}", transport.name());
        self.link = Some(Link::new(transport));
        Ok(())
    }

    /// Drops every device and releases the transport.
    ///
    /// Closing a bus that is not open is a no-op.
    pub fn close(&mut self) -> Result<()> {
        self.devices.clear();
        match self.link.take() {
            Some(link) => {
                info!("[Bus] Closing {}", link.name());
                link.close()
            }
            None => Ok(()),
        }
    }

    /// Slave addresses examined by a scan.
    pub fn probe_range(&self) -> RangeInclusive<u8> {
        self.probe_range.clone()
    }

    /// Changes the addresses examined by later scans.
    ///
    /// The range must be non-empty and lie within `0x00..=0x7F`.
    pub fn set_probe_range(&mut self, range: RangeInclusive<u8>) -> Result<()> {
        config::check_probe_range(&range)?;
        self.probe_range = range;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.link.is_some()
    }

    /// Counters of the open link.
    pub fn stats(&self) -> Option<&BusStats> {
        self.link.as_ref().map(Link::stats)
    }

    /// Reconciles the known devices with the addresses currently answering.
    ///
    /// With `force` every known device is discarded first. Otherwise devices
    /// that no longer answer are removed and the rest are kept untouched,
    /// cached registers and pending writes included. Newly answering
    /// addresses get a device, built with a full refresh; an address whose
    /// refresh fails is skipped.
    ///
    /// # Returns
    ///
    /// The number of devices known after the scan.
    pub fn scan(&mut self, force: bool) -> Result<usize> {
        if force {
            self.devices.clear();
        }

        let link = self.link.as_mut().ok_or(Error::NotOpen)?;
        let responsive = link
            .transport_mut()
            .probe(self.probe_range.clone())
            .map_err(|e| Error::transport(TransportOp::Probe, e))?;
        debug!("[Bus] Probe found {:02x?}", responsive);

        self.devices.retain(|device| {
            let present = responsive.contains(&device.address());
            if !present {
                info!("[Bus] Servo {:#04x} no longer responds", device.address());
            }
            present
        });

        for &address in &responsive {
            if self.devices.iter().any(|d| d.address() == address) {
                continue;
            }
            match Device::attach(&mut *link, address) {
                Ok(device) => {
                    info!(
                        "[Bus] Registered servo {:#04x} (type {}/{}, v{}.{})",
                        address,
                        device.value(Register::Type),
                        device.value(Register::Subtype),
                        device.version().0,
                        device.version().1
                    );
                    self.devices.push(device);
                }
                Err(err) => warn!("[Bus] Skipping servo {:#04x}: {}", address, err),
            }
        }

        Ok(self.devices.len())
    }

    /// Updates every device in discovery order.
    ///
    /// All devices are attempted; the first failure is returned.
    pub fn update(&mut self, full: bool) -> Result<()> {
        let link = self.link.as_mut().ok_or(Error::NotOpen)?;
        let mut first_error = None;
        for device in &mut self.devices {
            if let Err(err) = device.update(&mut *link, full) {
                warn!("[Bus] Update of {:#04x} failed: {}", device.address(), err);
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    pub fn find(&self, address: u8) -> Option<&Device> {
        self.devices.iter().find(|d| d.address() == address)
    }

    /// Mutable access to the device at `address`, paired with the bus link
    /// for operations that go over the wire.
    pub fn find_mut(&mut self, address: u8) -> Option<DeviceHandle<'_>> {
        let link = self.link.as_mut()?;
        let device = self.devices.iter_mut().find(|d| d.address() == address)?;
        Some(DeviceHandle { device, link })
    }

    pub fn exists(&self, address: u8) -> bool {
        self.find(address).is_some()
    }

    /// Device at discovery position `index`.
    pub fn get(&self, index: usize) -> Option<&Device> {
        self.devices.get(index)
    }

    pub fn size(&self) -> usize {
        self.devices.len()
    }

    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }
}

impl Drop for Bus {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("[Bus] Close failed: {}", err);
        }
    }
}

/// A device borrowed from its bus together with the bus link.
///
/// Dereferences to [`Device`] for cache access; the wire operations below
/// route through the link without exposing it.
pub struct DeviceHandle<'a> {
    device: &'a mut Device,
    link: &'a mut Link,
}

impl DeviceHandle<'_> {
    pub fn set(&mut self, name: &str, value: i32) -> Result<()> {
        self.device.set(name, value)
    }

    pub fn write(&mut self, reg: Register, value: i32) -> Result<()> {
        self.device.write(reg, value)
    }

    pub fn unlock(&mut self) {
        self.device.unlock()
    }

    pub fn update(&mut self, full: bool) -> Result<()> {
        self.device.update(&mut *self.link, full)
    }

    pub fn reset(&mut self) -> Result<()> {
        self.device.reset(&mut *self.link)
    }

    pub fn enable(&mut self) -> Result<()> {
        self.device.enable(&mut *self.link)
    }

    pub fn disable(&mut self) -> Result<()> {
        self.device.disable(&mut *self.link)
    }

    pub fn registers_commit(&mut self) -> Result<()> {
        self.device.registers_commit(&mut *self.link)
    }

    pub fn registers_restore(&mut self) -> Result<()> {
        self.device.registers_restore(&mut *self.link)
    }

    pub fn registers_default(&mut self) -> Result<()> {
        self.device.registers_default(&mut *self.link)
    }
}

impl Deref for DeviceHandle<'_> {
    type Target = Device;

    fn deref(&self) -> &Device {
        self.device
    }
}
