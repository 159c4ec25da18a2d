use crate::memory::Properties;

/// Typical memory error - out of available memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum OutOfMemoryError {
    /// Host memory exhausted.
    #[error("Out of host memory")]
    OutOfHostMemory,

    /// Device memory exhausted.
    #[error("Out of device memory")]
    OutOfDeviceMemory,
}

/// Possible cause of allocation failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AllocationError {
    /// Out of either host or device memory.
    #[error(transparent)]
    OutOfMemory(#[from] OutOfMemoryError),

    /// No fitting block was found and the pool growth cap was reached.
    /// Either the request is pathologically large or device memory is
    /// genuinely exhausted for the memory type.
    #[error(
        "Allocation of size {size} with alignment {align} failed after {attempts} pool growth attempts"
    )]
    AllocationFailed {
        /// Requested block size.
        size: u64,
        /// Requested block alignment.
        align: u64,
        /// Number of pools created before giving up.
        attempts: u32,
    },
}

/// Possible cause of mapping failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    /// Attempt to map memory without host-visible property.
    #[error("Memory is not HOST_VISIBLE and can't be mapped")]
    HostInvisible,

    /// Attempt to map memory out of bounds.
    #[error("Mapping range is out of bound")]
    OutOfBounds,

    /// Out of either host or device memory.
    #[error(transparent)]
    OutOfMemory(#[from] OutOfMemoryError),
}

/// Possible errors returned by `Heaps`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum HeapsError {
    /// Memory allocation failure.
    #[error(transparent)]
    AllocationError(#[from] AllocationError),

    /// No memory types among required for resource with requested properties was found.
    #[error("Memory type among ({0}) with properties ({1:?}) not found")]
    NoSuitableMemory(u32, Properties),
}

/// Generic memory error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    /// Out of either host or device memory.
    #[error(transparent)]
    OutOfMemory(#[from] OutOfMemoryError),

    /// Error occurred during allocation.
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    /// Error occurred during mapping operation.
    #[error(transparent)]
    Mapping(#[from] MappingError),
}
