use realm_machine::{
    Machine, MachineConfig, MachineError, MemoryError, BOOT_LOAD_ADDR, BOOT_SECTOR_MAX_BYTES,
};

fn machine() -> Machine {
    Machine::new(MachineConfig::boot_sector_defaults()).unwrap()
}

#[test]
fn boot_image_lands_at_the_load_address() {
    let mut machine = machine();
    let staged = machine
        .load_boot_sector(&[0xB8, 0x34, 0x12, 0x00, 0x00])
        .unwrap();
    assert_eq!(staged, 5);

    let mem = machine.memory();
    assert_eq!(mem.read_u8(BOOT_LOAD_ADDR).unwrap(), 0xB8);
    assert_eq!(mem.read_u32_le(BOOT_LOAD_ADDR + 1).unwrap(), 0x1234);
    // Surrounding RAM stays zeroed.
    assert_eq!(mem.read_u8(BOOT_LOAD_ADDR - 1).unwrap(), 0);
    assert_eq!(mem.read_u8(BOOT_LOAD_ADDR + 5).unwrap(), 0);
}

#[test]
fn oversized_images_are_truncated_to_one_sector() {
    let mut machine = machine();
    let image = vec![0xEB; BOOT_SECTOR_MAX_BYTES + 100];

    let staged = machine.load_boot_sector(&image).unwrap();
    assert_eq!(staged, BOOT_SECTOR_MAX_BYTES);

    let mem = machine.memory();
    let last = BOOT_LOAD_ADDR + BOOT_SECTOR_MAX_BYTES as u64 - 1;
    assert_eq!(mem.read_u8(last).unwrap(), 0xEB);
    // The byte past the sector cap was never written.
    assert_eq!(mem.read_u8(last + 1).unwrap(), 0);
}

#[test]
fn load_bytes_rejects_out_of_range_destinations() {
    let mut machine = machine();
    let ram = machine.memory().size();

    let err = machine.load_bytes(ram - 2, &[1, 2, 3, 4]).unwrap_err();
    assert_eq!(
        err,
        MachineError::LoadOutOfRange(MemoryError::OutOfRange {
            addr: ram - 2,
            len: 4,
            size: ram,
        })
    );
}

#[test]
fn empty_image_stages_nothing() {
    let mut machine = machine();
    assert_eq!(machine.load_boot_sector(&[]).unwrap(), 0);
    assert!(machine.memory().as_slice().iter().all(|&b| b == 0));
}
