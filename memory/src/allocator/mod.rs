//! This module provides `Allocator` trait and the free-list allocator that implements it.

mod free_list;

pub use self::free_list::{FreeListAllocator, FreeListBlock, FreeListConfig};

use crate::{block::Block, device::Device, error::AllocationError};

/// Allocator trait implemented for various allocators.
pub trait Allocator {
    /// Raw memory object type.
    type Memory;

    /// Block type returned by allocator.
    type Block: Block<Memory = Self::Memory>;

    /// Allocate block of memory.
    /// On success returns allocated block and amount of memory consumed from device.
    fn alloc<D>(
        &mut self,
        device: &D,
        size: u64,
        align: u64,
    ) -> Result<(Self::Block, u64), AllocationError>
    where
        D: Device<Memory = Self::Memory>;

    /// Free block of memory.
    /// Returns amount of memory returned to the device.
    fn free<D>(&mut self, device: &D, block: Self::Block) -> u64
    where
        D: Device<Memory = Self::Memory>;
}
