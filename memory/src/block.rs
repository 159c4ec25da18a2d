use std::ops::Range;

use crate::{device::Device, error::MappingError, mapping::MappedRange, memory::Properties};

/// Block that owns a `Range` of the `Memory`.
/// Implementor must ensure that there can't be any other blocks
/// with overlapping range (either through type system or safety notes for unsafe functions).
/// Provides access to safe memory range mapping.
pub trait Block {
    /// Raw memory object type the block is carved from.
    type Memory;

    /// Get memory properties of the block.
    fn properties(&self) -> Properties;

    /// Get raw memory object.
    fn memory(&self) -> &Self::Memory;

    /// Get memory range owned by this block.
    fn range(&self) -> Range<u64>;

    /// Get size of the block.
    fn size(&self) -> u64 {
        let range = self.range();
        range.end - range.start
    }

    /// Get mapping for the block range. `range` is relative to block start.
    /// Memory writes to the region performed by device become available for the host.
    fn map<'a, D>(
        &'a mut self,
        device: &D,
        range: Range<u64>,
    ) -> Result<MappedRange<'a, Self::Memory>, MappingError>
    where
        D: Device<Memory = Self::Memory>;

    /// Release memory mapping. Must be called after successful `map` call.
    /// No-op if block is not mapped.
    fn unmap<D>(&mut self, device: &D)
    where
        D: Device<Memory = Self::Memory>;
}
