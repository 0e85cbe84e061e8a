//! # Kernel Boot Information

use crate::memory::{MAX_MEMORY_REGIONS, MAX_MODULES};
use kernel_memory_addresses::PhysicalAddress;

/// Classification of a memory map entry.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MemoryRegionKind {
    /// Free RAM the kernel may hand out.
    Usable,
    /// Anything else: firmware, bootloader, kernel image, modules, MMIO.
    Reserved,
}

/// A `{base, length, kind}` entry of the boot memory map.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MemoryRegion {
    pub base: PhysicalAddress,
    pub length: u64,
    pub kind: MemoryRegionKind,
}

impl MemoryRegion {
    #[must_use]
    pub const fn new(base: u64, length: u64, kind: MemoryRegionKind) -> Self {
        Self {
            base: PhysicalAddress::new(base),
            length,
            kind,
        }
    }

    #[must_use]
    pub const fn is_usable(&self) -> bool {
        matches!(self.kind, MemoryRegionKind::Usable)
    }

    /// First address past the region.
    #[must_use]
    pub const fn end(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.base.as_u64().saturating_add(self.length))
    }
}

/// Returned when a fixed-capacity boot table is full.
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("boot table capacity of {capacity} entries exceeded")]
pub struct CapacityExceeded {
    pub capacity: usize,
}

/// The boot memory map, copied out of bootloader memory.
pub struct MemoryMap {
    regions: [MemoryRegion; MAX_MEMORY_REGIONS],
    len: usize,
}

impl MemoryMap {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            regions: [MemoryRegion::new(0, 0, MemoryRegionKind::Reserved); MAX_MEMORY_REGIONS],
            len: 0,
        }
    }

    /// Appends a region.
    ///
    /// # Errors
    /// Fails once [`MAX_MEMORY_REGIONS`] entries are recorded.
    pub fn push(&mut self, region: MemoryRegion) -> Result<(), CapacityExceeded> {
        let slot = self.regions.get_mut(self.len).ok_or(CapacityExceeded {
            capacity: MAX_MEMORY_REGIONS,
        })?;
        *slot = region;
        self.len += 1;
        Ok(())
    }

    #[must_use]
    pub fn regions(&self) -> &[MemoryRegion] {
        &self.regions[..self.len]
    }

    pub fn usable(&self) -> impl Iterator<Item = &MemoryRegion> {
        self.regions().iter().filter(|r| r.is_usable())
    }

    /// Total bytes across usable regions.
    #[must_use]
    pub fn usable_bytes(&self) -> u64 {
        self.usable().map(|r| r.length).sum()
    }
}

impl Default for MemoryMap {
    fn default() -> Self {
        Self::new()
    }
}

/// A named, read-only executable blob supplied by the bootloader.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BootModule {
    pub name: &'static str,
    pub bytes: &'static [u8],
}

impl BootModule {
    /// Creates a module named after the last component of `path`.
    #[must_use]
    pub fn from_path(path: &'static str, bytes: &'static [u8]) -> Self {
        Self {
            name: basename(path),
            bytes,
        }
    }
}

/// The set of modules available to `exec`.
#[derive(Clone)]
pub struct ModuleList {
    modules: [Option<BootModule>; MAX_MODULES],
    len: usize,
}

impl ModuleList {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            modules: [None; MAX_MODULES],
            len: 0,
        }
    }

    /// Registers a module.
    ///
    /// # Errors
    /// Fails once [`MAX_MODULES`] modules are recorded.
    pub fn push(&mut self, module: BootModule) -> Result<(), CapacityExceeded> {
        let slot = self.modules.get_mut(self.len).ok_or(CapacityExceeded {
            capacity: MAX_MODULES,
        })?;
        *slot = Some(module);
        self.len += 1;
        Ok(())
    }

    /// Looks a module up by exact name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&BootModule> {
        self.iter().find(|m| m.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BootModule> {
        self.modules[..self.len].iter().flatten()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for ModuleList {
    fn default() -> Self {
        Self::new()
    }
}

/// The part of `path` after the last `/`.
#[must_use]
pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    static INIT: [u8; 4] = *b"\x7fELF";
    static HELLO: [u8; 2] = *b"hi";

    #[test]
    fn module_lookup_is_exact() {
        let mut list = ModuleList::new();
        list.push(BootModule::from_path("/boot/init", &INIT)).unwrap();
        list.push(BootModule::from_path("/boot/hello", &HELLO)).unwrap();

        assert_eq!(list.len(), 2);
        assert_eq!(list.find("init").map(|m| m.bytes), Some(&INIT[..]));
        assert_eq!(list.find("hello").map(|m| m.bytes.len()), Some(2));
        assert!(list.find("ini").is_none());
        assert!(list.find("init ").is_none());
        assert!(list.find("/boot/init").is_none());
    }

    #[test]
    fn module_list_rejects_overflow() {
        let mut list = ModuleList::new();
        for _ in 0..MAX_MODULES {
            list.push(BootModule::from_path("m", &HELLO)).unwrap();
        }
        assert_eq!(
            list.push(BootModule::from_path("m", &HELLO)),
            Err(CapacityExceeded {
                capacity: MAX_MODULES
            })
        );
    }

    #[test]
    fn basename_strips_directories() {
        assert_eq!(basename("/boot/init"), "init");
        assert_eq!(basename("init"), "init");
        assert_eq!(basename("a/b/"), "");
    }

    #[test]
    fn usable_regions_are_filtered() {
        let mut map = MemoryMap::new();
        map.push(MemoryRegion::new(0x0, 0x1000, MemoryRegionKind::Reserved))
            .unwrap();
        map.push(MemoryRegion::new(0x10_0000, 0x4000, MemoryRegionKind::Usable))
            .unwrap();
        map.push(MemoryRegion::new(0x20_0000, 0x2000, MemoryRegionKind::Usable))
            .unwrap();

        assert_eq!(map.regions().len(), 3);
        assert_eq!(map.usable().count(), 2);
        assert_eq!(map.usable_bytes(), 0x6000);
        assert_eq!(map.regions()[1].end().as_u64(), 0x10_4000);
    }
}
