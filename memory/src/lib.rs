//! GPU memory management
//!
//! Suballocates buffer and image backing storage out of few big
//! device-memory objects: pools are grabbed per memory type and grown by
//! doubling, blocks are carved first-fit and coalesced with their free
//! neighbors when returned.

#![deny(unused_must_use)]

mod allocator;
mod block;
mod device;
mod error;
mod heaps;
mod mapping;
mod memory;
mod usage;
mod util;
mod utilization;

#[cfg(test)]
mod test;

pub use crate::{
    allocator::{Allocator, FreeListAllocator, FreeListBlock, FreeListConfig},
    block::Block,
    device::{Device, MemoryRequirements},
    error::{AllocationError, HeapsError, MappingError, MemoryError, OutOfMemoryError},
    heaps::{Heaps, MemoryBlock},
    mapping::{write::Write, Coherent, MappedRange, MaybeCoherent, NonCoherent},
    memory::{Memory, Properties},
    usage::{Data, Download, Dynamic, MemoryUsage, Upload, UsageValue},
    utilization::{
        MemoryHeapUtilization, MemoryTypeUtilization, MemoryUtilization, TotalMemoryUtilization,
    },
};
