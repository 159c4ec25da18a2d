mod heap;
mod memory_type;

use std::ops::Range;

use crate::{
    allocator::{FreeListBlock, FreeListConfig},
    block::Block,
    device::{Device, MemoryRequirements},
    error::{AllocationError, HeapsError, MappingError, OutOfMemoryError},
    mapping::MappedRange,
    memory::Properties,
    usage::MemoryUsage,
    util::fits_u32,
    utilization::TotalMemoryUtilization,
};

use self::{heap::MemoryHeap, memory_type::MemoryType};

/// Heaps of the physical device: the registry every allocation and free
/// goes through. One instance per device, owned by the graphics context
/// and passed by `&mut` to every call site.
#[derive(Debug)]
pub struct Heaps<T> {
    types: Vec<MemoryType<T>>,
    heaps: Vec<MemoryHeap>,
}

impl<T: 'static> Heaps<T> {
    /// Initialize the registry from the memory types and heap sizes
    /// declared by the physical device. Types are given in device order;
    /// their position is the memory type index resources refer to.
    ///
    /// # Safety
    ///
    /// Types and heaps must match what the device reports; `heap_index`
    /// of every type must be a valid index into `heaps`.
    pub unsafe fn new<P, H>(types: P, heaps: H) -> Self
    where
        P: IntoIterator<Item = (Properties, u32, FreeListConfig)>,
        H: IntoIterator<Item = u64>,
    {
        let heaps = heaps.into_iter().map(MemoryHeap::new).collect::<Vec<_>>();
        let types = types
                .into_iter()
                .enumerate()
                .map(|(index, (properties, heap_index, config))| {
                    assert!(
                        fits_u32(index),
                        "Number of memory types must fit in u32 limit"
                    );
                    let heap_index = heap_index as usize;
                    assert!(heap_index < heaps.len(), "Heap index out of bounds");
                    MemoryType::new(index as u32, heap_index, properties, config)
                })
                .collect::<Vec<_>>();
        assert!(
            types.len() <= 32,
            "Device must not declare more than 32 memory types"
        );
        Heaps { types, heaps }
    }

    /// Allocate memory block
    /// from one of memory types specified by `mask`,
    /// with `properties` required,
    /// with `size`
    /// and `align` requirements.
    ///
    /// Lower type indices are defined by the device to be preferable;
    /// the first qualifying index whose heap has budget left is used.
    pub fn allocate<D>(
        &mut self,
        device: &D,
        mask: u32,
        properties: Properties,
        size: u64,
        align: u64,
    ) -> Result<MemoryBlock<T>, HeapsError>
    where
        D: Device<Memory = T>,
    {
        debug_assert!(fits_u32(self.types.len()));

        let candidates = self
            .types
            .iter()
            .enumerate()
            .filter(|(index, mt)| {
                ((1u32 << index) & mask) != 0 && mt.properties().contains(properties)
            })
            .map(|(index, _)| index)
            .collect::<smallvec::SmallVec<[_; 32]>>();

        if candidates.is_empty() {
            return Err(HeapsError::NoSuitableMemory(mask, properties));
        }

        let memory_index = candidates
            .into_iter()
            .find(|&index| self.heaps[self.types[index].heap_index()].available() > size + align)
            .ok_or_else(|| {
                log::error!(
                    "All suitable heaps are exhausted: mask: {:#b}, properties: {:?}, size: {}",
                    mask,
                    properties,
                    size
                );
                HeapsError::from(AllocationError::from(OutOfMemoryError::OutOfDeviceMemory))
            })?;

        self.allocate_from(device, memory_index as u32, size, align)
    }

    /// Allocate memory block for the intended `usage`,
    /// with requirements reported by the device for the resource.
    ///
    /// Tries the usage's preferred properties first and falls back to
    /// the required set when no type carries the preferred ones.
    pub fn allocate_for<D, U>(
        &mut self,
        device: &D,
        usage: U,
        requirements: MemoryRequirements,
    ) -> Result<MemoryBlock<T>, HeapsError>
    where
        D: Device<Memory = T>,
        U: MemoryUsage,
    {
        log::trace!(
            "Allocate block: usage: '{:?}', requirements: '{:?}'",
            usage.value(),
            requirements
        );

        let required = usage.properties_required();
        let preferred = required | usage.properties_preferred();

        match self.allocate(
            device,
            requirements.type_mask,
            preferred,
            requirements.size,
            requirements.align,
        ) {
            Err(HeapsError::NoSuitableMemory(..)) => self.allocate(
                device,
                requirements.type_mask,
                required,
                requirements.size,
                requirements.align,
            ),
            result => result,
        }
    }

    /// Allocate memory block
    /// from `memory_index` specified,
    /// with `size`
    /// and `align` requirements.
    fn allocate_from<D>(
        &mut self,
        device: &D,
        memory_index: u32,
        size: u64,
        align: u64,
    ) -> Result<MemoryBlock<T>, HeapsError>
    where
        D: Device<Memory = T>,
    {
        log::trace!(
            "Allocate block: type: '{}', size: '{}', align: '{}'",
            memory_index,
            size,
            align
        );

        let memory_type = &mut self.types[memory_index as usize];
        let memory_heap = &mut self.heaps[memory_type.heap_index()];

        if memory_heap.available() < size {
            return Err(AllocationError::from(OutOfMemoryError::OutOfDeviceMemory).into());
        }

        let (block, allocated) = memory_type.alloc(device, size, align)?;
        memory_heap.allocated(allocated, block.size());

        Ok(MemoryBlock {
            block,
            memory_index,
        })
    }

    /// Free memory block.
    ///
    /// Memory block must be allocated from this heap.
    pub fn free<D>(&mut self, device: &D, block: MemoryBlock<T>)
    where
        D: Device<Memory = T>,
    {
        let memory_index = block.memory_index;
        let size = block.size();
        log::trace!("Free block: type: '{}', size: '{}'", memory_index, size);

        let memory_type = &mut self.types[memory_index as usize];
        let heap_index = memory_type.heap_index();
        let freed = memory_type.free(device, block.block);
        self.heaps[heap_index].freed(freed, size);
    }

    /// Get memory utilization of all types and heaps.
    pub fn utilization(&self) -> TotalMemoryUtilization {
        TotalMemoryUtilization {
            types: self.types.iter().map(MemoryType::utilization).collect(),
            heaps: self.heaps.iter().map(MemoryHeap::utilization).collect(),
        }
    }

    /// Dispose of the registry, returning every pool to the device.
    ///
    /// Must only be called after every block has been freed
    /// and the device is idle.
    pub fn dispose<D>(self, device: &D)
    where
        D: Device<Memory = T>,
    {
        for memory_type in self.types {
            memory_type.dispose(device);
        }
    }
}

/// Memory block allocated from `Heaps`.
#[derive(Debug)]
pub struct MemoryBlock<T> {
    block: FreeListBlock<T>,
    memory_index: u32,
}

impl<T: 'static> MemoryBlock<T> {
    /// Get memory type id.
    pub fn memory_type(&self) -> u32 {
        self.memory_index
    }

    /// Bind a buffer resource to this block's memory at the block's offset.
    ///
    /// # Safety
    ///
    /// The buffer must not be bound to any memory yet and must not
    /// outlive this block.
    pub unsafe fn bind_buffer<D>(
        &self,
        device: &D,
        buffer: &mut D::Buffer,
    ) -> Result<(), OutOfMemoryError>
    where
        D: Device<Memory = T>,
    {
        device.bind_buffer(buffer, self.block.memory(), self.block.range().start)
    }

    /// Bind an image resource to this block's memory at the block's offset.
    ///
    /// # Safety
    ///
    /// The image must not be bound to any memory yet and must not
    /// outlive this block.
    pub unsafe fn bind_image<D>(
        &self,
        device: &D,
        image: &mut D::Image,
    ) -> Result<(), OutOfMemoryError>
    where
        D: Device<Memory = T>,
    {
        device.bind_image(image, self.block.memory(), self.block.range().start)
    }
}

impl<T: 'static> Block for MemoryBlock<T> {
    type Memory = T;

    #[inline]
    fn properties(&self) -> Properties {
        self.block.properties()
    }

    #[inline]
    fn memory(&self) -> &T {
        self.block.memory()
    }

    #[inline]
    fn range(&self) -> Range<u64> {
        self.block.range()
    }

    fn map<'a, D>(
        &'a mut self,
        device: &D,
        range: Range<u64>,
    ) -> Result<MappedRange<'a, T>, MappingError>
    where
        D: Device<Memory = T>,
    {
        self.block.map(device, range)
    }

    fn unmap<D>(&mut self, device: &D)
    where
        D: Device<Memory = T>,
    {
        self.block.unmap(device)
    }
}
