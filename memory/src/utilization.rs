use {
    colorful::{core::color_string::CString, Color, Colorful as _},
    crate::memory::Properties,
};

/// Memory utilization stats.
#[derive(Clone, Copy, Debug)]
pub struct MemoryUtilization {
    /// Total number of bytes allocated from the device.
    pub used: u64,

    /// Number of bytes actually carved out by live blocks.
    pub effective: u64,
}

/// Memory utilization of one heap.
#[derive(Clone, Copy, Debug)]
pub struct MemoryHeapUtilization {
    /// Utilization.
    pub utilization: MemoryUtilization,

    /// Memory heap size.
    pub size: u64,
}

/// Memory utilization of one type.
#[derive(Clone, Copy, Debug)]
pub struct MemoryTypeUtilization {
    /// Utilization.
    pub utilization: MemoryUtilization,

    /// Memory type properties.
    pub properties: Properties,

    /// Index of heap this memory type uses.
    pub heap_index: usize,
}

/// Total memory utilization.
#[derive(Clone, Debug)]
pub struct TotalMemoryUtilization {
    /// Utilization by types.
    pub types: Vec<MemoryTypeUtilization>,

    /// Utilization by heaps.
    pub heaps: Vec<MemoryHeapUtilization>,
}

impl std::fmt::Display for TotalMemoryUtilization {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const MB: u64 = 1024 * 1024;

        writeln!(fmt, "!!! Memory utilization !!!")?;
        for (index, heap) in self.heaps.iter().enumerate() {
            let MemoryUtilization { used, effective } = heap.utilization;
            let size = heap.size.max(1);
            let fill = ((used * 50 / size) as usize).min(50);
            let bar = ("|".repeat(fill) + &" ".repeat(50 - fill))
                .gradient_with_color(Color::Green, Color::Red);

            writeln!(
                fmt,
                "Heap {}: {:>6} / {:<6} or {} {{ effective: {} }} [{}]",
                format!("{}", index).magenta(),
                format!("{}MB", used / MB),
                format!("{}MB", heap.size / MB),
                used_percent(used, size),
                effective_percent(effective, used),
                bar,
            )?;

            for ty in self.types.iter().filter(|ty| ty.heap_index == index) {
                let MemoryUtilization { used, effective } = ty.utilization;
                writeln!(
                    fmt,
                    "        {:>6} or {} {{ effective: {} }} | {:?}",
                    format!("{}MB", used / MB),
                    used_percent(used, size),
                    effective_percent(effective, used),
                    ty.properties,
                )?;
            }
        }

        Ok(())
    }
}

fn used_percent(used: u64, total: u64) -> CString {
    let percent = used * 100 / total.max(1);
    let value = format!("{:>3}%", percent);
    if percent > 75 {
        value.red()
    } else if percent > 50 {
        value.yellow()
    } else if percent > 25 {
        value.green()
    } else {
        value.white()
    }
}

fn effective_percent(effective: u64, used: u64) -> CString {
    let percent = if used > 0 { effective * 100 / used } else { 100 };
    let value = format!("{:>3}%", percent);
    if percent > 90 {
        value.white()
    } else if percent > 50 {
        value.green()
    } else if percent > 25 {
        value.yellow()
    } else {
        value.red()
    }
}
