mod allocator;

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    ops::Range,
    ptr::NonNull,
};

use crate::{
    device::Device,
    error::{AllocationError, MappingError, OutOfMemoryError},
};

#[derive(Debug, Default)]
struct Inner {
    next: u64,
    live: HashMap<u64, Box<[u8]>>,
    mapped: HashSet<u64>,
    freed: HashSet<u64>,
    allocations: Vec<u64>,
    limit: Option<u64>,
}

/// Device double backed by host memory.
/// Asserts the raw-memory contracts: no double free, no double map,
/// no out-of-bounds ranges, no double binding.
#[derive(Debug)]
pub(crate) struct MockDevice(RefCell<Inner>);

impl MockDevice {
    pub(crate) fn new() -> Self {
        MockDevice(RefCell::new(Inner::default()))
    }

    pub(crate) fn with_limit(limit: u64) -> Self {
        let device = Self::new();
        device.0.borrow_mut().limit = Some(limit);
        device
    }

    /// Sizes of raw allocations in the order they were made.
    pub(crate) fn allocation_sizes(&self) -> Vec<u64> {
        self.0.borrow().allocations.clone()
    }

    pub(crate) fn expect_no_leaks(&self) {
        let inner = self.0.borrow();
        assert!(
            inner.live.is_empty(),
            "Memory objects leaked: {:?}",
            inner.live.keys().collect::<Vec<_>>()
        );
    }
}

impl Device for MockDevice {
    type Memory = u64;
    type Buffer = MockBuffer;
    type Image = MockImage;

    unsafe fn allocate(&self, _index: u32, size: u64) -> Result<u64, AllocationError> {
        let mut inner = self.0.borrow_mut();
        if let Some(limit) = inner.limit {
            let total = inner.live.values().map(|bytes| bytes.len() as u64).sum::<u64>();
            if total + size > limit {
                return Err(OutOfMemoryError::OutOfDeviceMemory.into());
            }
        }
        let id = inner.next;
        inner.next += 1;
        inner.live.insert(id, vec![0u8; size as usize].into_boxed_slice());
        inner.allocations.push(size);
        Ok(id)
    }

    unsafe fn free(&self, memory: u64) {
        let mut inner = self.0.borrow_mut();
        assert!(!inner.mapped.contains(&memory), "Freeing mapped memory");
        assert!(inner.live.remove(&memory).is_some(), "Freeing dead memory");
        assert!(inner.freed.insert(memory), "Double-free");
    }

    unsafe fn map(&self, memory: &u64, range: Range<u64>) -> Result<NonNull<u8>, MappingError> {
        let mut inner = self.0.borrow_mut();
        assert!(inner.mapped.insert(*memory), "Memory is already mapped");
        let bytes = inner.live.get_mut(memory).expect("Mapping dead memory");
        assert!(range.end <= bytes.len() as u64, "Mapping out of bounds");
        let ptr = bytes[range.start as usize..].as_mut_ptr();
        Ok(NonNull::new(ptr).expect("Mock allocation is never null"))
    }

    unsafe fn unmap(&self, memory: &u64) {
        let mut inner = self.0.borrow_mut();
        assert!(inner.mapped.remove(memory), "Memory is not mapped");
    }

    unsafe fn invalidate<'a>(
        &self,
        regions: impl IntoIterator<Item = (&'a u64, Range<u64>)>,
    ) -> Result<(), OutOfMemoryError> {
        let inner = self.0.borrow();
        for (memory, range) in regions {
            assert!(inner.mapped.contains(memory), "Invalidating unmapped memory");
            assert!(range.end <= inner.live[memory].len() as u64);
        }
        Ok(())
    }

    unsafe fn flush<'a>(
        &self,
        regions: impl IntoIterator<Item = (&'a u64, Range<u64>)>,
    ) -> Result<(), OutOfMemoryError> {
        let inner = self.0.borrow();
        for (memory, range) in regions {
            assert!(inner.mapped.contains(memory), "Flushing unmapped memory");
            assert!(range.end <= inner.live[memory].len() as u64);
        }
        Ok(())
    }

    unsafe fn bind_buffer(
        &self,
        buffer: &mut MockBuffer,
        memory: &u64,
        offset: u64,
    ) -> Result<(), OutOfMemoryError> {
        let inner = self.0.borrow();
        assert!(buffer.bound.is_none(), "Buffer is already bound");
        let capacity = inner.live[memory].len() as u64;
        assert!(offset + buffer.size <= capacity, "Binding out of bounds");
        buffer.bound = Some((*memory, offset));
        Ok(())
    }

    unsafe fn bind_image(
        &self,
        image: &mut MockImage,
        memory: &u64,
        offset: u64,
    ) -> Result<(), OutOfMemoryError> {
        let inner = self.0.borrow();
        assert!(image.bound.is_none(), "Image is already bound");
        let capacity = inner.live[memory].len() as u64;
        assert!(offset + image.size <= capacity, "Binding out of bounds");
        image.bound = Some((*memory, offset));
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct MockBuffer {
    pub(crate) size: u64,
    pub(crate) bound: Option<(u64, u64)>,
}

impl MockBuffer {
    pub(crate) fn new(size: u64) -> Self {
        MockBuffer { size, bound: None }
    }
}

#[derive(Debug)]
pub(crate) struct MockImage {
    pub(crate) size: u64,
    pub(crate) bound: Option<(u64, u64)>,
}

impl MockImage {
    pub(crate) fn new(size: u64) -> Self {
        MockImage { size, bound: None }
    }
}
