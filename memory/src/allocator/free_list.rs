use std::{ops::Range, ptr::NonNull};

use relevant::Relevant;

use crate::{
    allocator::Allocator,
    block::Block,
    device::Device,
    error::{AllocationError, MappingError},
    mapping::{mapped_fitting_range, mapped_sub_range, MappedRange},
    memory::{Memory, Properties},
    util::*,
};

/// Number of pools the allocator may create while serving a single request.
/// The first pool of a memory type counts as one growth step.
const GROWTH_ATTEMPTS: u32 = 2;

/// Memory block allocated from `FreeListAllocator`.
#[derive(derivative::Derivative)]
#[derivative(Debug)]
pub struct FreeListBlock<T> {
    #[derivative(Debug = "ignore")]
    memory: *const Memory<T>,
    pool_index: u32,
    ptr: Option<NonNull<u8>>,
    range: Range<u64>,
    #[derivative(Debug = "ignore")]
    relevant: Relevant,
}

unsafe impl<T: Send> Send for FreeListBlock<T> {}
unsafe impl<T: Sync> Sync for FreeListBlock<T> {}

impl<T> FreeListBlock<T> {
    fn shared_memory(&self) -> &Memory<T> {
        // Pool memory is boxed and outlives every block carved from it.
        unsafe { &*self.memory }
    }

    /// Pool the block was carved from, in pool-creation order.
    pub fn pool_index(&self) -> u32 {
        self.pool_index
    }

    fn dispose(self) {
        self.relevant.dispose();
    }
}

impl<T: 'static> Block for FreeListBlock<T> {
    type Memory = T;

    #[inline]
    fn properties(&self) -> Properties {
        self.shared_memory().properties()
    }

    #[inline]
    fn memory(&self) -> &T {
        self.shared_memory().raw()
    }

    #[inline]
    fn range(&self) -> Range<u64> {
        self.range.clone()
    }

    fn map<'a, D>(
        &'a mut self,
        _device: &D,
        range: Range<u64>,
    ) -> Result<MappedRange<'a, T>, MappingError>
    where
        D: Device<Memory = T>,
    {
        assert!(
            range.start <= range.end,
            "Memory mapping region must have valid size"
        );

        let ptr = self.ptr.ok_or(MappingError::HostInvisible)?;
        if let Some((ptr, range)) = mapped_sub_range(ptr, self.range.clone(), range) {
            let mapping = unsafe { MappedRange::from_raw(self.shared_memory(), ptr, range) };
            Ok(mapping)
        } else {
            Err(MappingError::OutOfBounds)
        }
    }

    fn unmap<D>(&mut self, _device: &D)
    where
        D: Device<Memory = T>,
    {
        // Pool memory stays persistently mapped; the borrow returned by
        // `map` going away is all that ends the host access.
    }
}

/// Config for `FreeListAllocator`.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FreeListConfig {
    /// Capacity of the first pool created for a memory type.
    /// Every following pool doubles the capacity of the previous one.
    pub pool_size: u64,
}

impl Default for FreeListConfig {
    fn default() -> Self {
        FreeListConfig {
            pool_size: 16 * 1024 * 1024,
        }
    }
}

/// One region of a pool. Regions of a pool partition `[0, capacity)`
/// without gaps or overlaps; a region is either free or handed out
/// to exactly one block.
#[derive(Clone, Copy, Debug)]
struct Region {
    offset: u64,
    size: u64,
    free: bool,
}

#[derive(derivative::Derivative)]
#[derivative(Debug)]
struct Pool<T> {
    #[derivative(Debug = "ignore")]
    memory: Box<Memory<T>>,
    ptr: Option<NonNull<u8>>,
    regions: Vec<Region>,
}

unsafe impl<T: Send> Send for Pool<T> {}
unsafe impl<T: Sync> Sync for Pool<T> {}

impl<T> Pool<T> {
    fn capacity(&self) -> u64 {
        self.memory.size()
    }

    /// First-fit search in offset order.
    /// Carves a used region out of the first free region the request fits,
    /// keeping alignment padding and remainder as free regions.
    fn fit(&mut self, size: u64, align: u64) -> Option<u64> {
        let index = self.regions.iter().position(|region| {
            region.free && fits(size, align, region.offset..region.offset + region.size)
        })?;

        let Region {
            offset,
            size: region_size,
            ..
        } = self.regions[index];
        let aligned_offset = aligned(offset, align);
        let padding = aligned_offset - offset;
        let remainder = region_size - padding - size;

        self.regions[index] = Region {
            offset: aligned_offset,
            size,
            free: false,
        };
        if remainder > 0 {
            self.regions.insert(
                index + 1,
                Region {
                    offset: aligned_offset + size,
                    size: remainder,
                    free: true,
                },
            );
        }
        if padding > 0 {
            self.regions.insert(
                index,
                Region {
                    offset,
                    size: padding,
                    free: true,
                },
            );
        }

        debug_assert!(self.contiguous());
        Some(aligned_offset)
    }

    /// Return a used region to the free list,
    /// merging it with free neighbors on both sides.
    fn release(&mut self, range: Range<u64>) {
        let index = self
            .regions
            .binary_search_by_key(&range.start, |region| region.offset)
            .expect("Freed block must originate from this pool");

        {
            let region = &mut self.regions[index];
            assert!(!region.free, "Block is already free");
            debug_assert_eq!(region.size, range.end - range.start);
            region.free = true;
        }

        if index + 1 < self.regions.len() && self.regions[index + 1].free {
            let next = self.regions.remove(index + 1);
            self.regions[index].size += next.size;
        }
        if index > 0 && self.regions[index - 1].free {
            let merged = self.regions.remove(index);
            self.regions[index - 1].size += merged.size;
        }

        debug_assert!(self.contiguous());
    }

    fn unused(&self) -> bool {
        self.regions.iter().all(|region| region.free)
    }

    /// Regions must cover `[0, capacity)` in offset order without gaps.
    fn contiguous(&self) -> bool {
        let mut edge = 0;
        for region in &self.regions {
            if region.offset != edge || region.size == 0 {
                return false;
            }
            edge = region.offset + region.size;
        }
        edge == self.capacity()
    }
}

/// Free-list suballocator over a list of pools of one memory type.
///
/// Pools are created lazily: the first at the configured baseline capacity,
/// every next one at twice the capacity of the previous, capped at
/// `GROWTH_ATTEMPTS` new pools per request. Pools are never returned to the
/// device until the allocator is disposed.
///
/// Search is first-fit in pool-creation order, then in offset order within
/// a pool. No best-fit pass is made; this trades some fragmentation for
/// O(regions) allocation cost.
#[derive(Debug)]
pub struct FreeListAllocator<T> {
    memory_type: u32,
    memory_properties: Properties,
    pool_size: u64,
    pools: Vec<Pool<T>>,
}

impl<T: 'static> FreeListAllocator<T> {
    /// Create new `FreeListAllocator`
    /// for `memory_type` with `memory_properties` specified,
    /// with `FreeListConfig` provided.
    pub fn new(memory_type: u32, memory_properties: Properties, config: FreeListConfig) -> Self {
        log::info!(
            "Create new 'free-list' allocator: type: '{}', properties: '{:#?}' config: '{:#?}'",
            memory_type,
            memory_properties,
            config
        );
        assert!(config.pool_size > 0, "Pool size must not be zero");
        assert!(
            fits_usize(config.pool_size),
            "Pool size must fit in both usize and u64"
        );

        FreeListAllocator {
            memory_type,
            memory_properties,
            pool_size: config.pool_size,
            pools: Vec::new(),
        }
    }

    /// Number of pools created so far.
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// Perform full cleanup of the memory allocated.
    /// Every block must have been freed.
    pub fn dispose<D>(mut self, device: &D)
    where
        D: Device<Memory = T>,
    {
        for pool in self.pools.drain(..) {
            assert!(
                pool.unused(),
                "Pool is still in use during allocator disposal"
            );
            unsafe {
                if pool.ptr.is_some() {
                    device.unmap(pool.memory.raw());
                }
                device.free((*pool.memory).into_raw());
            }
        }
    }

    fn fit(&mut self, size: u64, align: u64) -> Option<(usize, u64)> {
        for (index, pool) in self.pools.iter_mut().enumerate() {
            if let Some(offset) = pool.fit(size, align) {
                return Some((index, offset));
            }
        }
        None
    }

    /// Append one pool: the baseline capacity for the first,
    /// twice the last pool's capacity afterwards.
    fn grow<D>(&mut self, device: &D) -> Result<u64, AllocationError>
    where
        D: Device<Memory = T>,
    {
        let capacity = match self.pools.last() {
            None => self.pool_size,
            Some(pool) => pool.capacity() * 2,
        };
        debug_assert!(fits_u32(self.pools.len()));

        log::trace!(
            "Allocate new pool: type: '{}', capacity: '{}'",
            self.memory_type,
            capacity
        );

        let (memory, ptr) = unsafe {
            let raw = device.allocate(self.memory_type, capacity)?;

            let ptr = if self.memory_properties.contains(Properties::HOST_VISIBLE) {
                match device.map(&raw, 0..capacity) {
                    Ok(ptr) => Some(ptr),
                    Err(MappingError::OutOfMemory(error)) => {
                        device.free(raw);
                        return Err(error.into());
                    }
                    Err(_) => panic!("Unexpected mapping failure"),
                }
            } else {
                None
            };

            (Memory::from_raw(raw, capacity, self.memory_properties), ptr)
        };

        self.pools.push(Pool {
            memory: Box::new(memory),
            ptr,
            regions: vec![Region {
                offset: 0,
                size: capacity,
                free: true,
            }],
        });
        Ok(capacity)
    }
}

impl<T: 'static> Allocator for FreeListAllocator<T> {
    type Memory = T;

    type Block = FreeListBlock<T>;

    fn alloc<D>(
        &mut self,
        device: &D,
        size: u64,
        align: u64,
    ) -> Result<(FreeListBlock<T>, u64), AllocationError>
    where
        D: Device<Memory = T>,
    {
        assert!(align.is_power_of_two(), "Alignment must be power of two");
        log::trace!(
            "Allocate block: type: '{}', size: '{}', align: '{}'",
            self.memory_type,
            size,
            align
        );

        let mut allocated = 0;
        let mut attempts = 0;
        loop {
            if let Some((pool_index, offset)) = self.fit(size, align) {
                let pool = &self.pools[pool_index];
                let range = offset..offset + size;
                let ptr = pool.ptr.map(|ptr| {
                    mapped_fitting_range(ptr, 0..pool.capacity(), range.clone())
                        .expect("Block must be in sub-range of pool mapping")
                });

                return Ok((
                    FreeListBlock {
                        memory: &*pool.memory,
                        pool_index: pool_index as u32,
                        ptr,
                        range,
                        relevant: Relevant,
                    },
                    allocated,
                ));
            }

            if attempts == GROWTH_ATTEMPTS {
                return Err(AllocationError::AllocationFailed {
                    size,
                    align,
                    attempts,
                });
            }
            attempts += 1;
            allocated += self.grow(device)?;
        }
    }

    fn free<D>(&mut self, _device: &D, block: Self::Block) -> u64
    where
        D: Device<Memory = T>,
    {
        log::trace!(
            "Free block: type: '{}', pool: '{}', range: '{:?}'",
            self.memory_type,
            block.pool_index,
            block.range
        );

        let pool_index = block.pool_index as usize;
        let range = block.range.clone();
        block.dispose();

        assert!(
            pool_index < self.pools.len(),
            "Can't be allocated from not yet created pool"
        );
        self.pools[pool_index].release(range);

        // Pools are retained until disposal; nothing goes back to the device.
        0
    }
}
