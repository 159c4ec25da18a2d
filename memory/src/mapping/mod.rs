mod range;
pub(crate) mod write;

use std::{iter::once, ops::Range, ptr::NonNull};

use crate::{
    device::Device,
    error::{MappingError, MemoryError},
    memory::Memory,
};

pub(crate) use self::range::{mapped_fitting_range, mapped_slice, mapped_slice_mut, mapped_sub_range};
use self::write::{Write, WriteCoherent, WriteFlush};

/// Non-coherent marker.
#[derive(Clone, Copy, Debug)]
pub struct NonCoherent;

/// Coherent marker.
#[derive(Clone, Copy, Debug)]
pub struct Coherent;

/// Value that contains either coherent marker or non-coherent marker.
#[derive(Clone, Copy, Debug)]
pub struct MaybeCoherent(bool);

/// Represents range of the memory mapped to the host.
/// Provides methods for safer host access to the memory.
#[derive(Debug)]
pub struct MappedRange<'a, T: 'a, C = MaybeCoherent> {
    /// Memory object the range belongs to.
    memory: &'a Memory<T>,

    /// Pointer to the beginning of the mapped range.
    ptr: NonNull<u8>,

    /// Mapped range in memory object space.
    range: Range<u64>,

    /// Coherency marker.
    coherent: C,
}

impl<'a, T: 'a> MappedRange<'a, T> {
    /// Construct mapped range from raw mapping.
    ///
    /// # Safety
    ///
    /// `memory` `range` must be mapped to host memory region pointed by `ptr`.
    pub(crate) unsafe fn from_raw(memory: &'a Memory<T>, ptr: NonNull<u8>, range: Range<u64>) -> Self {
        MappedRange {
            ptr,
            range,
            memory,
            coherent: MaybeCoherent(memory.host_coherent()),
        }
    }

    /// Get pointer to beginning of memory region.
    pub fn ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Get mapped range in memory object space.
    pub fn range(&self) -> Range<u64> {
        self.range.clone()
    }

    /// Fetch readable slice of the sub-range.
    /// Invalidates the range first if memory is not coherent.
    /// `range.end - range.start` must be multiple of `size_of::<U>()`.
    /// `mapping offset + range.start` must be multiple of `align_of::<U>()`.
    ///
    /// # Safety
    ///
    /// * Caller must ensure that device won't write to the memory region while the borrow lasts.
    /// * `U` must be plain-old-data with layout compatible with data written by the device.
    pub unsafe fn read<'b, U, D>(
        &'b mut self,
        device: &'b D,
        range: Range<u64>,
    ) -> Result<&'b [U], MemoryError>
    where
        'a: 'b,
        U: Copy + 'b,
        D: Device<Memory = T>,
    {
        let (ptr, range) =
            mapped_sub_range(self.ptr, self.range.clone(), range).ok_or(MappingError::OutOfBounds)?;

        if !self.coherent.0 {
            device.invalidate(once((self.memory.raw(), range.clone())))?;
        }

        Ok(mapped_slice::<U>(ptr, range))
    }

    /// Fetch writer to the sub-region.
    /// The writer flushes the range on drop if memory is not coherent.
    ///
    /// # Safety
    ///
    /// * Caller must ensure that device won't write to or read from the memory region.
    pub unsafe fn write<'b, U, D>(
        &'b mut self,
        device: &'b D,
        range: Range<u64>,
    ) -> Result<impl Write<U> + 'b, MappingError>
    where
        'a: 'b,
        U: Copy + 'b,
        D: Device<Memory = T>,
    {
        let (ptr, range) =
            mapped_sub_range(self.ptr, self.range.clone(), range).ok_or(MappingError::OutOfBounds)?;

        let coherent = self.coherent.0;
        let slice = mapped_slice_mut::<U>(ptr, range.clone());

        Ok(WriteFlush {
            slice,
            flush: if !coherent {
                Some((device, &*self.memory, range))
            } else {
                None
            },
        })
    }

    /// Convert into mapped range with statically known coherency.
    pub fn coherent(self) -> Result<MappedRange<'a, T, Coherent>, MappedRange<'a, T, NonCoherent>> {
        if self.coherent.0 {
            Ok(MappedRange {
                memory: self.memory,
                ptr: self.ptr,
                range: self.range,
                coherent: Coherent,
            })
        } else {
            Err(MappedRange {
                memory: self.memory,
                ptr: self.ptr,
                range: self.range,
                coherent: NonCoherent,
            })
        }
    }
}

impl<'a, T: 'a> From<MappedRange<'a, T, Coherent>> for MappedRange<'a, T> {
    fn from(range: MappedRange<'a, T, Coherent>) -> Self {
        MappedRange {
            memory: range.memory,
            ptr: range.ptr,
            range: range.range,
            coherent: MaybeCoherent(true),
        }
    }
}

impl<'a, T: 'a> From<MappedRange<'a, T, NonCoherent>> for MappedRange<'a, T> {
    fn from(range: MappedRange<'a, T, NonCoherent>) -> Self {
        MappedRange {
            memory: range.memory,
            ptr: range.ptr,
            range: range.range,
            coherent: MaybeCoherent(false),
        }
    }
}

impl<'a, T: 'a> MappedRange<'a, T, Coherent> {
    /// Fetch writer to the sub-region. No flush required on coherent memory.
    ///
    /// # Safety
    ///
    /// * Caller must ensure that device won't write to or read from the memory region.
    pub unsafe fn write<'b, U>(&'b mut self, range: Range<u64>) -> Result<impl Write<U> + 'b, MappingError>
    where
        U: Copy + 'b,
    {
        let (ptr, range) =
            mapped_sub_range(self.ptr, self.range.clone(), range).ok_or(MappingError::OutOfBounds)?;

        let slice = mapped_slice_mut::<U>(ptr, range);

        Ok(WriteCoherent { slice })
    }
}
