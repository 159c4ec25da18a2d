use rand::{rngs::StdRng, Rng, SeedableRng};

use super::{MockBuffer, MockDevice, MockImage};
use crate::{
    block::Block,
    device::MemoryRequirements,
    error::{AllocationError, HeapsError, OutOfMemoryError},
    heaps::{Heaps, MemoryBlock},
    mapping::write::Write,
    memory::Properties,
    usage::{MemoryUsage, Upload, UsageValue},
    FreeListConfig,
};

const KB: u64 = 1024;
const MB: u64 = 1024 * 1024;

fn init() -> Heaps<u64> {
    let config = FreeListConfig { pool_size: 16 * KB };
    unsafe {
        Heaps::new(
            vec![
                (Properties::DEVICE_LOCAL, 0, config),
                (
                    Properties::DEVICE_LOCAL
                        | Properties::HOST_VISIBLE
                        | Properties::HOST_COHERENT,
                    0,
                    config,
                ),
                (Properties::HOST_VISIBLE | Properties::HOST_CACHED, 1, config),
            ],
            vec![8 * MB, 8 * MB],
        )
    }
}

#[test]
fn heaps_init() {
    let device = MockDevice::new();
    let heaps = init();
    heaps.dispose(&device);
    device.expect_no_leaks();
}

#[test]
fn selection_takes_first_qualifying_type() {
    let device = MockDevice::new();
    let mut heaps = init();

    // Both type 0 and 1 are device-local; the lower index wins.
    let block = heaps
        .allocate(&device, 0b111, Properties::DEVICE_LOCAL, 1 * KB, 64)
        .unwrap();
    assert_eq!(block.memory_type(), 0);
    heaps.free(&device, block);

    // First host-visible type is 1.
    let block = heaps
        .allocate(&device, 0b111, Properties::HOST_VISIBLE, 1 * KB, 64)
        .unwrap();
    assert_eq!(block.memory_type(), 1);
    heaps.free(&device, block);

    // Masking type 1 out moves the choice to type 2.
    let block = heaps
        .allocate(&device, 0b100, Properties::HOST_VISIBLE, 1 * KB, 64)
        .unwrap();
    assert_eq!(block.memory_type(), 2);
    heaps.free(&device, block);

    heaps.dispose(&device);
}

#[test]
fn no_suitable_memory() {
    let device = MockDevice::new();
    let mut heaps = init();

    // No type is device-local among the masked ones.
    let error = heaps
        .allocate(&device, 0b100, Properties::DEVICE_LOCAL, 1 * KB, 64)
        .unwrap_err();
    assert_eq!(
        error,
        HeapsError::NoSuitableMemory(0b100, Properties::DEVICE_LOCAL)
    );

    // No type is lazily allocated at all.
    let error = heaps
        .allocate(&device, 0b111, Properties::LAZILY_ALLOCATED, 1 * KB, 64)
        .unwrap_err();
    assert!(matches!(error, HeapsError::NoSuitableMemory(..)));

    heaps.dispose(&device);
}

#[test]
fn growth_is_reported_to_the_device() {
    let device = MockDevice::new();
    let mut heaps = init();

    // Fill the 16KB baseline pool of type 0, then force two growths.
    let blocks = (0..3)
        .map(|_| {
            heaps
                .allocate(&device, 0b001, Properties::DEVICE_LOCAL, 14 * KB, 256)
                .unwrap()
        })
        .collect::<Vec<_>>();

    assert_eq!(device.allocation_sizes(), vec![16 * KB, 32 * KB]);

    for block in blocks {
        heaps.free(&device, block);
    }
    heaps.dispose(&device);
    device.expect_no_leaks();
}

#[test]
fn allocation_failed_when_device_is_exhausted() {
    // Device accepts the baseline pool and nothing more.
    let device = MockDevice::with_limit(16 * KB);
    let mut heaps = init();

    let block = heaps
        .allocate(&device, 0b001, Properties::DEVICE_LOCAL, 8 * KB, 64)
        .unwrap();

    let error = heaps
        .allocate(&device, 0b001, Properties::DEVICE_LOCAL, 12 * KB, 64)
        .unwrap_err();
    assert_eq!(
        error,
        HeapsError::AllocationError(AllocationError::OutOfMemory(
            OutOfMemoryError::OutOfDeviceMemory
        ))
    );

    heaps.free(&device, block);
    heaps.dispose(&device);
}

#[test]
fn map_write_read_round_trip() {
    let device = MockDevice::new();
    let mut heaps = init();

    let mut block = heaps
        .allocate_for(
            &device,
            Upload,
            MemoryRequirements {
                size: 1 * KB,
                align: 256,
                type_mask: 0b111,
            },
        )
        .unwrap();
    assert_eq!(block.memory_type(), 1);
    assert!(block.properties().contains(Properties::HOST_VISIBLE));

    let payload = (0..1024).map(|value| value as u8).collect::<Vec<u8>>();
    {
        let mut mapping = block.map(&device, 0..1 * KB).unwrap();
        unsafe {
            let mut writer = mapping.write::<u8, _>(&device, 0..1 * KB).unwrap();
            writer.write(&payload);
        }
        unsafe {
            let readback = mapping.read::<u8, _>(&device, 0..1 * KB).unwrap();
            assert_eq!(readback, &payload[..]);
        }
    }
    block.unmap(&device);

    heaps.free(&device, block);
    heaps.dispose(&device);
}

#[test]
fn non_coherent_write_flushes() {
    let device = MockDevice::new();
    let mut heaps = init();

    // Type 2 is host-visible but not coherent; the writer must flush on drop.
    let mut block = heaps
        .allocate(
            &device,
            0b111,
            Properties::HOST_VISIBLE | Properties::HOST_CACHED,
            512,
            64,
        )
        .unwrap();
    assert_eq!(block.memory_type(), 2);

    {
        let mapping = block.map(&device, 0..512).unwrap();
        assert!(mapping.coherent().is_err());
    }
    {
        let mut mapping = block.map(&device, 0..512).unwrap();
        unsafe {
            let mut writer = mapping.write::<u8, _>(&device, 0..512).unwrap();
            writer.write(&[7u8; 512]);
        }
        unsafe {
            assert_eq!(mapping.read::<u8, _>(&device, 0..512).unwrap(), &[7u8; 512][..]);
        }
    }

    heaps.free(&device, block);
    heaps.dispose(&device);
}

#[test]
fn map_requires_host_visible() {
    let device = MockDevice::new();
    let mut heaps = init();

    let mut block = heaps
        .allocate(&device, 0b001, Properties::DEVICE_LOCAL, 1 * KB, 64)
        .unwrap();
    assert!(block.map(&device, 0..1 * KB).is_err());

    heaps.free(&device, block);
    heaps.dispose(&device);
}

#[test]
fn bind_buffer_and_image() {
    let device = MockDevice::new();
    let mut heaps = init();

    let block = heaps
        .allocate(&device, 0b111, Properties::DEVICE_LOCAL, 4 * KB, 256)
        .unwrap();

    let mut buffer = MockBuffer::new(4 * KB);
    unsafe { block.bind_buffer(&device, &mut buffer).unwrap() };
    assert_eq!(buffer.bound, Some((*block.memory(), block.range().start)));

    let mut image = MockImage::new(2 * KB);
    let image_block = heaps
        .allocate(&device, 0b111, Properties::DEVICE_LOCAL, 2 * KB, 256)
        .unwrap();
    unsafe { image_block.bind_image(&device, &mut image).unwrap() };
    assert_eq!(
        image.bound,
        Some((*image_block.memory(), image_block.range().start))
    );

    heaps.free(&device, block);
    heaps.free(&device, image_block);
    heaps.dispose(&device);
}

#[test]
#[should_panic(expected = "Buffer is already bound")]
fn double_binding_is_rejected() {
    let device = MockDevice::new();
    let mut heaps = init();

    let block = heaps
        .allocate(&device, 0b111, Properties::DEVICE_LOCAL, 1 * KB, 64)
        .unwrap();
    let mut buffer = MockBuffer::new(1 * KB);
    unsafe {
        block.bind_buffer(&device, &mut buffer).unwrap();
        let _ = block.bind_buffer(&device, &mut buffer);
    }
}

#[test]
fn utilization_tracks_blocks() {
    let device = MockDevice::new();
    let mut heaps = init();

    let block = heaps
        .allocate(&device, 0b001, Properties::DEVICE_LOCAL, 4 * KB, 64)
        .unwrap();

    let utilization = heaps.utilization();
    assert_eq!(utilization.types[0].utilization.used, 16 * KB);
    assert_eq!(utilization.types[0].utilization.effective, 4 * KB);
    assert_eq!(utilization.heaps[0].utilization.used, 16 * KB);

    // Exercise the report formatting as well.
    let report = format!("{}", utilization);
    assert!(report.contains("Memory utilization"));

    heaps.free(&device, block);
    let utilization = heaps.utilization();
    assert_eq!(utilization.types[0].utilization.effective, 0);
    // Pools are kept for reuse until disposal.
    assert_eq!(utilization.types[0].utilization.used, 16 * KB);

    heaps.dispose(&device);
    device.expect_no_leaks();
}

#[test]
fn blocks_stress() {
    let device = MockDevice::new();
    let mut heaps = init();
    let mut rng = StdRng::seed_from_u64(0x8bad_f00d);
    let mut blocks: Vec<MemoryBlock<u64>> = Vec::new();

    for _ in 0..1000 {
        if blocks.is_empty() || rng.gen_bool(0.6) {
            let usage = match rng.gen_range(0..4) {
                0 => UsageValue::Data,
                1 => UsageValue::Dynamic,
                2 => UsageValue::Upload,
                _ => UsageValue::Download,
            };
            let requirements = MemoryRequirements {
                size: rng.gen_range(1..=4 * KB),
                align: 1 << rng.gen_range(0..9),
                type_mask: 0b111,
            };

            match heaps.allocate_for(&device, usage, requirements) {
                Ok(block) => {
                    assert_eq!(
                        block.range().start % requirements.align,
                        0,
                        "Block allocated without requested align {}",
                        requirements.align
                    );
                    assert!(block.size() >= requirements.size);
                    assert!(block.properties().contains(usage.properties_required()));
                    assert_ne!((1 << block.memory_type()) & requirements.type_mask, 0);

                    for other in &blocks {
                        if other.memory() == block.memory() {
                            let (a, b) = (other.range(), block.range());
                            assert!(
                                a.end <= b.start || b.end <= a.start,
                                "Blocks overlap: {:?} and {:?}",
                                a,
                                b
                            );
                        }
                    }
                    blocks.push(block);
                }
                Err(HeapsError::AllocationError(_)) => {}
                Err(error) => panic!("Unexpected error: {}", error),
            }
        } else {
            let index = rng.gen_range(0..blocks.len());
            let block = blocks.swap_remove(index);
            heaps.free(&device, block);
        }
    }

    for block in blocks.drain(..) {
        heaps.free(&device, block);
    }

    let utilization = heaps.utilization();
    for ty in &utilization.types {
        assert_eq!(ty.utilization.effective, 0);
    }

    heaps.dispose(&device);
    device.expect_no_leaks();
}
