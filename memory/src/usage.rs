//! Defines usage types for memory blocks.
//! See `MemoryUsage` and implementations for details.

use std::fmt;

use crate::memory::Properties;

/// Memory usage trait: maps the intended use of a block to the
/// memory properties to request. Selection between qualifying memory
/// types always prefers lower indices; a usage only states *which*
/// properties must or should be present.
pub trait MemoryUsage: fmt::Debug {
    /// Get runtime usage value.
    fn value(&self) -> UsageValue;

    /// Properties a memory type must have for this usage.
    fn properties_required(&self) -> Properties;

    /// Properties worth having for this usage.
    /// Requested first, dropped when no type carries them.
    fn properties_preferred(&self) -> Properties;
}

/// Full speed GPU access.
/// Optimal for render targets and persistent resources.
#[derive(Clone, Copy, Debug)]
pub struct Data;

impl MemoryUsage for Data {
    fn value(&self) -> UsageValue {
        UsageValue::Data
    }

    fn properties_required(&self) -> Properties {
        Properties::DEVICE_LOCAL
    }

    fn properties_preferred(&self) -> Properties {
        Properties::empty()
    }
}

/// CPU to GPU data flow with frequent updates.
/// Used for dynamic buffer data, typically constant buffers.
#[derive(Clone, Copy, Debug)]
pub struct Dynamic;

impl MemoryUsage for Dynamic {
    fn value(&self) -> UsageValue {
        UsageValue::Dynamic
    }

    fn properties_required(&self) -> Properties {
        Properties::HOST_VISIBLE
    }

    fn properties_preferred(&self) -> Properties {
        Properties::DEVICE_LOCAL | Properties::HOST_COHERENT
    }
}

/// CPU to GPU data flow with mapping.
/// Used for staging data before copying to the `Data` memory.
#[derive(Clone, Copy, Debug)]
pub struct Upload;

impl MemoryUsage for Upload {
    fn value(&self) -> UsageValue {
        UsageValue::Upload
    }

    fn properties_required(&self) -> Properties {
        Properties::HOST_VISIBLE
    }

    fn properties_preferred(&self) -> Properties {
        Properties::HOST_COHERENT
    }
}

/// GPU to CPU data flow with mapping.
/// Used for copying data from `Data` memory to be read by the host.
#[derive(Clone, Copy, Debug)]
pub struct Download;

impl MemoryUsage for Download {
    fn value(&self) -> UsageValue {
        UsageValue::Download
    }

    fn properties_required(&self) -> Properties {
        Properties::HOST_VISIBLE
    }

    fn properties_preferred(&self) -> Properties {
        Properties::HOST_CACHED | Properties::HOST_COHERENT
    }
}

/// Runtime usage value to pick memory usage at runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UsageValue {
    /// `Data` usage.
    Data,

    /// `Dynamic` usage.
    Dynamic,

    /// `Upload` usage.
    Upload,

    /// `Download` usage.
    Download,
}

impl MemoryUsage for UsageValue {
    fn value(&self) -> UsageValue {
        *self
    }

    fn properties_required(&self) -> Properties {
        match self {
            UsageValue::Data => Data.properties_required(),
            UsageValue::Dynamic => Dynamic.properties_required(),
            UsageValue::Upload => Upload.properties_required(),
            UsageValue::Download => Download.properties_required(),
        }
    }

    fn properties_preferred(&self) -> Properties {
        match self {
            UsageValue::Data => Data.properties_preferred(),
            UsageValue::Dynamic => Dynamic.properties_preferred(),
            UsageValue::Upload => Upload.properties_preferred(),
            UsageValue::Download => Download.properties_preferred(),
        }
    }
}
