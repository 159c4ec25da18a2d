use crate::{
    allocator::{Allocator, FreeListAllocator, FreeListBlock, FreeListConfig},
    block::Block,
    device::Device,
    error::AllocationError,
    memory::Properties,
    utilization::{MemoryTypeUtilization, MemoryUtilization},
};

/// One memory type of the device: its property flags, the heap it draws
/// from and the suballocator managing its pools.
#[derive(Debug)]
pub(super) struct MemoryType<T> {
    heap_index: usize,
    properties: Properties,
    free_list: FreeListAllocator<T>,
    used: u64,
    effective: u64,
}

impl<T: 'static> MemoryType<T> {
    pub(super) fn new(
        memory_type: u32,
        heap_index: usize,
        properties: Properties,
        config: FreeListConfig,
    ) -> Self {
        MemoryType {
            heap_index,
            properties,
            free_list: FreeListAllocator::new(memory_type, properties, config),
            used: 0,
            effective: 0,
        }
    }

    pub(super) fn properties(&self) -> Properties {
        self.properties
    }

    pub(super) fn heap_index(&self) -> usize {
        self.heap_index
    }

    pub(super) fn alloc<D>(
        &mut self,
        device: &D,
        size: u64,
        align: u64,
    ) -> Result<(FreeListBlock<T>, u64), AllocationError>
    where
        D: Device<Memory = T>,
    {
        let (block, allocated) = self.free_list.alloc(device, size, align)?;
        self.used += allocated;
        self.effective += block.size();
        Ok((block, allocated))
    }

    pub(super) fn free<D>(&mut self, device: &D, block: FreeListBlock<T>) -> u64
    where
        D: Device<Memory = T>,
    {
        self.effective -= block.size();
        let freed = self.free_list.free(device, block);
        self.used -= freed;
        freed
    }

    pub(super) fn utilization(&self) -> MemoryTypeUtilization {
        MemoryTypeUtilization {
            utilization: MemoryUtilization {
                used: self.used,
                effective: self.effective,
            },
            properties: self.properties,
            heap_index: self.heap_index,
        }
    }

    pub(super) fn dispose<D>(self, device: &D)
    where
        D: Device<Memory = T>,
    {
        self.free_list.dispose(device);
    }
}
