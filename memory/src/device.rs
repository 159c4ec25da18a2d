use std::{ops::Range, ptr::NonNull};

use crate::error::{AllocationError, MappingError, OutOfMemoryError};

/// Memory requirements for a resource, as reported by the device.
///
/// Callers create the resource first, query its requirements and hand
/// them to the allocator; the allocator never creates resources itself.
#[derive(Clone, Copy, Debug)]
pub struct MemoryRequirements {
    /// Size of the required memory region.
    pub size: u64,

    /// Required alignment of the region's offset. Power of two.
    pub align: u64,

    /// Bitmask with bit `i` set iff memory type `i` is supported for the resource.
    pub type_mask: u32,
}

/// Trait for raw memory allocation, mapping and resource binding.
///
/// Abstracts the graphics device operations the allocator consumes.
/// All operations are blocking and complete before returning.
pub trait Device {
    /// Raw memory object.
    type Memory;

    /// Buffer resource type memory can be bound to.
    type Buffer;

    /// Image resource type memory can be bound to.
    type Image;

    /// Allocate memory object.
    ///
    /// # Parameters
    ///
    /// `index` - memory type index.
    /// `size`  - size of the memory object to allocate.
    ///
    /// # Safety
    ///
    /// `index` must be a valid memory type index for the device.
    unsafe fn allocate(&self, index: u32, size: u64) -> Result<Self::Memory, AllocationError>;

    /// Free memory object.
    ///
    /// # Safety
    ///
    /// Memory must not be mapped and no resource may still be bound to it.
    unsafe fn free(&self, memory: Self::Memory);

    /// Map memory range.
    /// Only one range for the given memory object can be mapped.
    ///
    /// # Safety
    ///
    /// Memory must have been allocated from a host-visible memory type
    /// and must not be mapped already.
    unsafe fn map(
        &self,
        memory: &Self::Memory,
        range: Range<u64>,
    ) -> Result<NonNull<u8>, MappingError>;

    /// Unmap memory.
    ///
    /// # Safety
    ///
    /// No pointer obtained from `map` may be used afterwards.
    unsafe fn unmap(&self, memory: &Self::Memory);

    /// Invalidate mapped regions guaranteeing that device writes to the memory,
    /// which have been made visible to the host-write and host-read access types,
    /// are made visible to the host.
    ///
    /// # Safety
    ///
    /// Every region must lie inside a currently mapped range of its memory object.
    unsafe fn invalidate<'a>(
        &self,
        regions: impl IntoIterator<Item = (&'a Self::Memory, Range<u64>)>,
    ) -> Result<(), OutOfMemoryError>
    where
        Self::Memory: 'a;

    /// Flush mapped regions guaranteeing that host writes to the memory
    /// can be made available to device access.
    ///
    /// # Safety
    ///
    /// Every region must lie inside a currently mapped range of its memory object.
    unsafe fn flush<'a>(
        &self,
        regions: impl IntoIterator<Item = (&'a Self::Memory, Range<u64>)>,
    ) -> Result<(), OutOfMemoryError>
    where
        Self::Memory: 'a;

    /// Bind a buffer resource to the memory object at `offset`.
    ///
    /// # Safety
    ///
    /// The buffer must not be bound to any memory yet; a resource is
    /// bound at most once over its lifetime.
    unsafe fn bind_buffer(
        &self,
        buffer: &mut Self::Buffer,
        memory: &Self::Memory,
        offset: u64,
    ) -> Result<(), OutOfMemoryError>;

    /// Bind an image resource to the memory object at `offset`.
    ///
    /// # Safety
    ///
    /// The image must not be bound to any memory yet; a resource is
    /// bound at most once over its lifetime.
    unsafe fn bind_image(
        &self,
        image: &mut Self::Image,
        memory: &Self::Memory,
        offset: u64,
    ) -> Result<(), OutOfMemoryError>;
}
