use relevant::Relevant;

bitflags::bitflags! {
    /// Memory property flags declared by the device for a memory type.
    pub struct Properties: u32 {
        /// Specifies that memory allocated with this type is the most efficient for device access.
        const DEVICE_LOCAL = 0x0000_0001;

        /// Specifies that memory allocated with this type can be mapped for host access.
        const HOST_VISIBLE = 0x0000_0002;

        /// Specifies that the host cache management commands `Device::flush` and `Device::invalidate`
        /// are not needed to flush host writes to the device or make device writes visible to the host.
        const HOST_COHERENT = 0x0000_0004;

        /// Specifies that memory allocated with this type is cached on the host.
        const HOST_CACHED = 0x0000_0008;

        /// Specifies that the memory type only allows device access to the memory,
        /// and the backing memory may be provided lazily.
        /// Memory types must not have both `LAZILY_ALLOCATED` and `HOST_VISIBLE` set.
        const LAZILY_ALLOCATED = 0x0000_0010;
    }
}

/// Memory object wrapper.
/// Contains size and properties of the memory.
#[derive(Debug)]
pub struct Memory<T> {
    raw: T,
    size: u64,
    properties: Properties,
    relevant: Relevant,
}

impl<T> Memory<T> {
    /// Get memory properties.
    pub fn properties(&self) -> Properties {
        self.properties
    }

    /// Get memory size.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Get raw memory object.
    pub fn raw(&self) -> &T {
        &self.raw
    }

    /// Unwrap the raw memory object, consuming the wrapper.
    pub(crate) fn into_raw(self) -> T {
        let Memory { raw, relevant, .. } = self;
        relevant.dispose();
        raw
    }

    /// Create memory from raw object.
    ///
    /// # Safety
    ///
    /// `size` and `properties` must match the arguments the object
    /// was allocated with.
    pub unsafe fn from_raw(raw: T, size: u64, properties: Properties) -> Self {
        Memory {
            properties,
            raw,
            size,
            relevant: Relevant,
        }
    }

    /// Check if this memory is host-visible and can be mapped.
    /// `memory.host_visible()` is equivalent to `memory.properties().contains(Properties::HOST_VISIBLE)`
    pub fn host_visible(&self) -> bool {
        self.properties.contains(Properties::HOST_VISIBLE)
    }

    /// Check if this memory is host-coherent and doesn't require invalidating or flushing.
    /// `memory.host_coherent()` is equivalent to `memory.properties().contains(Properties::HOST_COHERENT)`
    pub fn host_coherent(&self) -> bool {
        self.properties.contains(Properties::HOST_COHERENT)
    }
}
