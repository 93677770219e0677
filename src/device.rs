//! Device instances and the table that owns them
//!
//! A [`Device`] is one mapped IP core: its bus, its lock-guarded region
//! mirror, its wait queues and its field attributes. Nothing here is shared
//! between devices.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::attr::FieldAttr;
use crate::bulk::{Activity, ActivityQueues, BulkHandle};
use crate::bus::RegisterBus;
use crate::error::{Error, Result};
use crate::field::{Field, INDICATOR_LED};
use crate::regmap::{RegisterMap, INDICATOR_MAP};
use crate::region::{Region, RegisterRegion};

pub const DRIVER_NAME: &str = "indicator_driver";

/// Name under which the device at `base_addr` is published.
pub fn device_name(base_addr: usize) -> String {
    format!("{}_{:08x}", DRIVER_NAME, base_addr)
}

/// One mapped register block.
pub struct Device {
    name: String,
    base_addr: usize,
    bus: Arc<dyn RegisterBus>,
    region: Region,
    queues: ActivityQueues,
    attrs: Vec<FieldAttr>,
    handles: AtomicUsize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub name: String,
    pub base_addr: String,
    pub register_count: usize,
    pub region_size: usize,
    pub fields: Vec<&'static str>,
    pub open_handles: usize,
    pub reads: u64,
    pub writes: u64,
    pub closed: bool,
}

impl Device {
    /// Bring up a device over an already mapped bus.
    pub fn probe(
        base_addr: usize,
        bus: Arc<dyn RegisterBus>,
        map: RegisterMap,
        fields: &[Field],
    ) -> Result<Arc<Self>> {
        let name = device_name(base_addr);
        tracing::debug!(device = %name, "probe function called");

        let region = Region::new(bus.clone(), map)?;
        for field in fields {
            if map.index_of(field.offset()).is_none() {
                tracing::error!(
                    device = %name,
                    "field {} at 0x{:x} is not on a declared register",
                    field.name(),
                    field.offset()
                );
                return Err(Error::OutOfBounds {
                    offset: field.offset(),
                });
            }
        }

        region.pull()?;
        region.with_mirror(|words| {
            for (i, word) in words.iter().enumerate() {
                tracing::debug!(device = %name, "region reg{} = {:x}", i, word);
            }
        })?;

        tracing::info!(
            device = %name,
            "{} registers at 0x{:08X}, {} fields",
            map.register_count(),
            base_addr,
            fields.len()
        );

        Ok(Arc::new(Self {
            name,
            base_addr,
            bus,
            region,
            queues: ActivityQueues::default(),
            attrs: fields.iter().copied().map(FieldAttr::new).collect(),
            handles: AtomicUsize::new(0),
        }))
    }

    /// The indicator core: one LED register with an `indicator_led` field.
    pub fn probe_indicator(base_addr: usize, bus: Arc<dyn RegisterBus>) -> Result<Arc<Self>> {
        Self::probe(base_addr, bus, INDICATOR_MAP, &[INDICATOR_LED])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_addr(&self) -> usize {
        self.base_addr
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn queues(&self) -> &ActivityQueues {
        &self.queues
    }

    pub fn is_closed(&self) -> bool {
        self.region.is_closed()
    }

    /// Open a bulk transfer handle.
    pub fn open(self: &Arc<Self>) -> Result<BulkHandle> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        self.handles.fetch_add(1, Ordering::Relaxed);
        Ok(BulkHandle::new(self.clone()))
    }

    pub(crate) fn release_handle(&self) {
        self.handles.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn open_handles(&self) -> usize {
        self.handles.load(Ordering::Relaxed)
    }

    /// Wait for the next bulk read or write. Fails with `Closed` once the
    /// device is removed.
    pub async fn next_activity(&self) -> Result<Activity> {
        self.queues.next().await
    }

    pub fn attrs(&self) -> impl Iterator<Item = &FieldAttr> {
        self.attrs.iter()
    }

    fn attr(&self, name: &str) -> Result<&FieldAttr> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        self.attrs
            .iter()
            .find(|a| a.name() == name)
            .ok_or_else(|| Error::UnknownField(name.to_string()))
    }

    /// Render a field straight from hardware.
    pub fn show(&self, field: &str) -> Result<String> {
        self.attr(field)?.show(&*self.bus)
    }

    /// Store a field straight to hardware.
    pub fn store(&self, field: &str, text: &str) -> Result<usize> {
        let attr = self.attr(field)?;
        attr.store(&*self.bus, text).inspect_err(|e| {
            if let Error::OutOfRange { value, .. } = e {
                tracing::warn!(
                    device = %self.name,
                    "Invalid value {{0x{:x}}} for address {{0x{:08X}}}",
                    value,
                    self.base_addr + attr.field().offset()
                );
            }
        })
    }

    /// Detach the device. Open handles stay valid but every operation fails.
    pub fn remove(&self) {
        tracing::debug!(device = %self.name, "remove function called");
        self.region.close();
        self.queues.close();
    }

    pub fn info(&self) -> DeviceInfo {
        let map = self.region.map();
        DeviceInfo {
            name: self.name.clone(),
            base_addr: format!("0x{:08X}", self.base_addr),
            register_count: map.register_count(),
            region_size: map.byte_len(),
            fields: self.attrs.iter().map(|a| a.name()).collect(),
            open_handles: self.open_handles(),
            reads: self.queues.reads(),
            writes: self.queues.writes(),
            closed: self.is_closed(),
        }
    }
}

/// Devices by name.
#[derive(Default)]
pub struct DeviceTable {
    devices: RwLock<BTreeMap<String, Arc<Device>>>,
}

impl DeviceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a device. A device already registered under the same name is
    /// removed first.
    pub fn attach(&self, device: Arc<Device>) {
        let previous = self
            .devices
            .write()
            .insert(device.name().to_string(), device.clone());
        match previous {
            Some(old) if Arc::ptr_eq(&old, &device) => {}
            Some(old) => {
                tracing::warn!(device = %old.name(), "replacing attached device");
                old.remove();
            }
            None => {}
        }
    }

    pub fn get(&self, name: &str) -> Result<Arc<Device>> {
        self.devices
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownDevice(name.to_string()))
    }

    pub fn detach(&self, name: &str) -> Result<()> {
        let device = self
            .devices
            .write()
            .remove(name)
            .ok_or_else(|| Error::UnknownDevice(name.to_string()))?;
        device.remove();
        Ok(())
    }

    pub fn detach_all(&self) {
        let devices = std::mem::take(&mut *self.devices.write());
        for device in devices.values() {
            device.remove();
        }
    }

    pub fn list(&self) -> Vec<DeviceInfo> {
        self.devices.read().values().map(|d| d.info()).collect()
    }

    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }
}
