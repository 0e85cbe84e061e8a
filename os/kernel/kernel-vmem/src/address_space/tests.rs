use super::*;
use crate::testing::{PoolAlloc, RecordingTlb, TestPhys, TlbEvent, fresh_space};
use std::collections::BTreeSet;

const USER_RW: Permissions = Permissions::new(true, true, false);

fn va(v: u64) -> VirtualAddress {
    VirtualAddress::new(v)
}

/// Table frames (not data frames) on the path to `va`.
fn table_frames<M: PhysMapper, T: Tlb>(space: &AddressSpace<M, T>, v: VirtualAddress) -> Vec<PhysicalAddress> {
    space
        .lookup(v)
        .steps()
        .iter()
        .filter(|s| s.level != TableLevel::L4)
        .map(|s| s.table)
        .collect()
}

#[test]
fn map_creates_tables_and_leaf() {
    let phys = TestPhys::with_frames(16);
    let (mut space, mut alloc) = fresh_space(&phys);
    let before = alloc.available();

    let target = va(0x5000_4000);
    let outcome = space.vm_map(&mut alloc, target, USER_RW).unwrap();
    assert!(matches!(outcome, MapOutcome::Mapped(_)));

    // three tables plus the data frame
    assert_eq!(before - alloc.available(), 4);

    let walk = space.translate(target);
    assert_eq!(walk.steps().len(), 4);
    for step in &walk.steps()[..3] {
        assert_eq!(step.entry.permissions(), Permissions::ALL);
        assert!(!step.entry.large_page());
    }
    assert_eq!(walk.leaf_permissions(), Some(USER_RW));
    assert_eq!(walk.effective_permissions(), Some(USER_RW));
    assert_eq!(walk.physical_address(), Some(outcome.frame()));

    assert_eq!(space.tlb().events(), [TlbEvent::Invalidate(target)]);
}

#[test]
fn mapped_frame_is_zeroed() {
    let phys = TestPhys::with_frames(8);
    let (mut space, mut alloc) = fresh_space(&phys);

    // dirty every free frame first
    for frame in phys.all_frames().skip(1) {
        unsafe { core::ptr::write_bytes(phys.phys_to_ptr(frame), 0xAA, 4096) };
    }

    let frame = space
        .vm_map(&mut alloc, va(0x40_0000), USER_RW)
        .unwrap()
        .frame();
    assert!(phys.frame_bytes(frame).iter().all(|&b| b == 0));
}

#[test]
fn remapping_leaves_existing_leaf_untouched() {
    let phys = TestPhys::with_frames(16);
    let (mut space, mut alloc) = fresh_space(&phys);
    let target = va(0x40_0000);

    let first = space.vm_map(&mut alloc, target, USER_RW).unwrap();
    let free_after_first = alloc.available();

    let second = space.vm_map(&mut alloc, target, Permissions::ALL).unwrap();
    assert_eq!(second, MapOutcome::AlreadyMapped(first.frame()));
    assert_eq!(alloc.available(), free_after_first);
    assert_eq!(space.lookup(target).leaf_permissions(), Some(USER_RW));
}

#[test]
fn neighbouring_pages_share_tables() {
    let phys = TestPhys::with_frames(16);
    let (mut space, mut alloc) = fresh_space(&phys);

    space.vm_map(&mut alloc, va(0x40_0000), USER_RW).unwrap();
    let before = alloc.available();
    space.vm_map(&mut alloc, va(0x40_1000), USER_RW).unwrap();

    assert_eq!(before - alloc.available(), 1);
    assert_eq!(
        table_frames(&space, va(0x40_0000)),
        table_frames(&space, va(0x40_1000))
    );
}

#[test]
fn map_rejects_unaligned_address() {
    let phys = TestPhys::with_frames(4);
    let (mut space, mut alloc) = fresh_space(&phys);
    assert_eq!(
        space.vm_map(&mut alloc, va(0x40_0010), USER_RW),
        Err(VmemError::Unaligned(va(0x40_0010)))
    );
}

#[test]
fn exhaustion_fails_and_keeps_partial_tables() {
    let phys = TestPhys::with_frames(8);
    // root plus two frames: enough for L3 and L2 tables, not for L1
    let mut alloc = PoolAlloc::new(phys.all_frames().take(3));
    let mut space = AddressSpace::new_empty(&mut alloc, &phys, RecordingTlb::default()).unwrap();
    let target = va(0x7000_0000);

    assert_eq!(
        space.vm_map(&mut alloc, target, USER_RW),
        Err(VmemError::OutOfMemory { va: target })
    );
    assert_eq!(alloc.available(), 0);

    let walk = space.lookup(target);
    assert_eq!(walk.steps().len(), 3);
    assert!(walk.steps()[0].entry.present());
    assert!(walk.steps()[1].entry.present());
    assert!(!walk.steps()[2].entry.present());
    assert!(!walk.is_mapped());
    assert!(space.tlb().events().is_empty());

    // a retry with more frames reuses what is already linked
    for frame in phys.all_frames().skip(3).take(2) {
        alloc.free(frame);
    }
    assert!(space.vm_map(&mut alloc, target, USER_RW).is_ok());
    assert_eq!(alloc.available(), 0);
}

#[test]
fn protect_only_widens() {
    let phys = TestPhys::with_frames(16);
    let (mut space, mut alloc) = fresh_space(&phys);
    let target = va(0x40_0000);
    space.vm_map(&mut alloc, target, Permissions::NONE).unwrap();

    space.vm_protect(target, Permissions::NONE).unwrap();
    assert_eq!(space.lookup(target).leaf_permissions(), Some(Permissions::NONE));

    space
        .vm_protect(target, Permissions::new(false, true, false))
        .unwrap();
    assert_eq!(
        space.lookup(target).leaf_permissions(),
        Some(Permissions::new(false, true, false))
    );

    space.vm_protect(target, Permissions::USER_READ).unwrap();
    space.vm_protect(target, Permissions::NONE).unwrap();
    assert_eq!(
        space.lookup(target).leaf_permissions(),
        Some(Permissions::new(true, true, false))
    );
    assert_eq!(
        space.tlb().events().last(),
        Some(&TlbEvent::Invalidate(target))
    );
}

#[test]
fn protect_on_unmapped_address_reports_missing_level() {
    let phys = TestPhys::with_frames(16);
    let (mut space, mut alloc) = fresh_space(&phys);

    assert_eq!(
        space.vm_protect(va(0x40_0000), Permissions::ALL),
        Err(VmemError::NotMapped {
            va: va(0x40_0000),
            level: TableLevel::L4
        })
    );

    space.vm_map(&mut alloc, va(0x40_0000), USER_RW).unwrap();
    assert_eq!(
        space.vm_protect(va(0x40_2000), Permissions::ALL),
        Err(VmemError::NotMapped {
            va: va(0x40_2000),
            level: TableLevel::L1
        })
    );
}

#[test]
fn reprotect_sets_leaf_exactly() {
    let phys = TestPhys::with_frames(16);
    let (mut space, mut alloc) = fresh_space(&phys);
    let target = va(0x40_0000);
    space.vm_map(&mut alloc, target, Permissions::ALL).unwrap();

    let rx = Permissions::new(true, false, true);
    space.vm_reprotect(target, rx).unwrap();

    let walk = space.lookup(target);
    assert_eq!(walk.leaf_permissions(), Some(rx));
    assert_eq!(walk.effective_permissions(), Some(rx));
    assert_eq!(walk.steps()[0].entry.permissions(), Permissions::ALL);
}

#[test]
fn bytes_round_trip_across_a_page_boundary() {
    let phys = TestPhys::with_frames(16);
    let (mut space, mut alloc) = fresh_space(&phys);
    space.vm_map(&mut alloc, va(0x40_0000), USER_RW).unwrap();
    space.vm_map(&mut alloc, va(0x40_1000), USER_RW).unwrap();

    let data: Vec<u8> = (0..64).collect();
    space.write_bytes(va(0x40_0FE0), &data).unwrap();

    let mut back = vec![0u8; 64];
    space.read_bytes(va(0x40_0FE0), &mut back).unwrap();
    assert_eq!(back, data);

    let second = space.physical_address(va(0x40_1000)).unwrap();
    assert_eq!(&phys.frame_bytes(second)[..32], &data[32..]);

    space.zero_bytes(va(0x40_0FF0), 32).unwrap();
    space.read_bytes(va(0x40_0FE0), &mut back).unwrap();
    assert_eq!(&back[..16], &data[..16]);
    assert!(back[16..48].iter().all(|&b| b == 0));
    assert_eq!(&back[48..], &data[48..]);
}

#[test]
fn user_write_into_read_only_code_is_denied() {
    let phys = TestPhys::with_frames(16);
    let (mut space, mut alloc) = fresh_space(&phys);
    let code = va(0x40_0000);
    space.vm_map(&mut alloc, code, USER_RW).unwrap();
    space.write_bytes(code, &[0x90; 8]).unwrap();
    space.vm_reprotect(code, Permissions::new(true, false, true)).unwrap();

    assert_eq!(
        space.write_user(va(0x40_0004), b"oops"),
        Err(VmemError::AccessDenied(va(0x40_0004)))
    );

    let mut back = [0u8; 8];
    space.read_user(code, &mut back).unwrap();
    assert_eq!(back, [0x90; 8]);
}

#[test]
fn user_copy_checks_every_touched_page() {
    let phys = TestPhys::with_frames(16);
    let (mut space, mut alloc) = fresh_space(&phys);
    space.vm_map(&mut alloc, va(0x40_0000), USER_RW).unwrap();
    space
        .vm_map(&mut alloc, va(0x40_1000), Permissions::new(false, true, false))
        .unwrap();

    // second page is kernel-only; nothing is written to the first either
    assert_eq!(
        space.write_user(va(0x40_0FFC), &[1; 8]),
        Err(VmemError::AccessDenied(va(0x40_1000)))
    );
    let mut back = [0xFF; 4];
    space.read_bytes(va(0x40_0FFC), &mut back).unwrap();
    assert_eq!(back, [0; 4]);

    let mut buf = [0u8; 4];
    assert!(matches!(
        space.read_user(va(0x40_2000), &mut buf),
        Err(VmemError::NotMapped { .. })
    ));
}

#[test]
fn user_copy_rejects_ranges_leaving_the_user_half() {
    let phys = TestPhys::with_frames(16);
    let (space, _alloc) = fresh_space(&phys);

    let near_end = va(0x7FFF_FFFF_FFF0);
    assert_eq!(space.write_user(near_end, &[0; 32]), Err(VmemError::NotUser(near_end)));

    let wrapping = va(u64::MAX - 2);
    let mut buf = [0u8; 8];
    assert_eq!(space.read_user(wrapping, &mut buf), Err(VmemError::NotUser(wrapping)));
}

#[test]
fn translate_adds_page_offset() {
    let phys = TestPhys::with_frames(16);
    let (mut space, mut alloc) = fresh_space(&phys);
    let frame = space
        .vm_map(&mut alloc, va(0x40_0000), USER_RW)
        .unwrap()
        .frame();

    assert_eq!(
        space.translate(va(0x40_0123)).physical_address(),
        Some(frame + 0x123)
    );
    assert!(!space.translate(va(0x50_0000)).is_mapped());
}

#[test]
fn unmap_lower_half_reclaims_every_table_frame() {
    let phys = TestPhys::with_frames(64);
    let (mut space, mut alloc) = fresh_space(&phys);

    let lower = [
        va(0x0040_0000),
        va(0x0040_1000),
        va(0x4000_0000),
        va(0x0080_0000_0000),
    ];
    let upper = va(0xFFFF_8000_0000_0000);

    let mut tables = BTreeSet::new();
    let mut data = BTreeSet::new();
    for &v in &lower {
        data.insert(space.vm_map(&mut alloc, v, USER_RW).unwrap().frame());
        tables.extend(table_frames(&space, v));
    }
    let upper_frame = space.vm_map(&mut alloc, upper, USER_RW).unwrap().frame();

    // a 2 MiB leaf in the lower half must not be handed back as a table
    let pd = space.lookup(lower[0]).steps()[2].table;
    let huge = PhysicalAddress::new(0x4000_0000);
    unsafe { table(&&phys, pd) }.set(
        7,
        PageEntryBits::new()
            .with_present(true)
            .with_large_page(true)
            .with_physical_address(huge),
    );

    let reclaimed = space.unmap_lower_half(&mut alloc);
    assert_eq!(reclaimed, tables.len());

    for frame in &tables {
        assert!(alloc.contains(*frame), "{frame:?} not reclaimed");
    }
    for frame in &data {
        assert!(!alloc.contains(*frame), "data frame {frame:?} reclaimed");
    }
    assert!(!alloc.contains(huge));

    let root = unsafe { table(&&phys, space.root()) };
    assert_eq!(root.present_in(0..LOWER_HALF_L4_ENTRIES).count(), 0);
    for &v in &lower {
        assert!(!space.lookup(v).is_mapped());
    }
    assert_eq!(space.physical_address(upper), Ok(upper_frame));
    assert_eq!(
        space.tlb().events().last(),
        Some(&TlbEvent::Reload(space.root()))
    );
}
