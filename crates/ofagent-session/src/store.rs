use std::collections::HashMap;
use std::sync::Arc;

use ofagent_wire::DescriptorRecord;

use crate::error::LookupError;

/// Source of per-device description data.
pub trait DeviceStore {
    /// Snapshot of the descriptor for `device_id`.
    fn get_descriptor(&self, device_id: u64) -> Result<DescriptorRecord, LookupError>;
}

impl<T: DeviceStore + ?Sized> DeviceStore for &T {
    fn get_descriptor(&self, device_id: u64) -> Result<DescriptorRecord, LookupError> {
        (**self).get_descriptor(device_id)
    }
}

impl<T: DeviceStore + ?Sized> DeviceStore for Arc<T> {
    fn get_descriptor(&self, device_id: u64) -> Result<DescriptorRecord, LookupError> {
        (**self).get_descriptor(device_id)
    }
}

/// Descriptors held in memory, keyed by datapath id.
#[derive(Debug, Clone, Default)]
pub struct MemoryDeviceStore {
    descriptors: HashMap<u64, DescriptorRecord>,
}

impl MemoryDeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the descriptor of a datapath.
    pub fn insert(&mut self, device_id: u64, record: DescriptorRecord) {
        self.descriptors.insert(device_id, record);
    }

    pub fn with_descriptor(mut self, device_id: u64, record: DescriptorRecord) -> Self {
        self.insert(device_id, record);
        self
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl DeviceStore for MemoryDeviceStore {
    fn get_descriptor(&self, device_id: u64) -> Result<DescriptorRecord, LookupError> {
        self.descriptors
            .get(&device_id)
            .cloned()
            .ok_or(LookupError::UnknownDevice(device_id))
    }
}
