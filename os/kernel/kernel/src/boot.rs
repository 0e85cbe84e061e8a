//! # Limine boot handoff
//!
//! The kernel declares what it needs as request statics in the
//! `.limine_requests` section; Limine fills in the responses before jumping
//! to [`kmain`](crate::init::kmain). [`BootInfo::collect`] copies them into
//! the kernel's own boot data model so nothing after it touches Limine types.

use kernel_info::boot::{BootModule, CapacityExceeded, MemoryMap, MemoryRegion, MemoryRegionKind, ModuleList};
use limine::BaseRevision;
use limine::memory_map::EntryType;
use limine::request::{
    HhdmRequest, MemoryMapRequest, ModuleRequest, RequestsEndMarker, RequestsStartMarker,
};
use log::{debug, info, warn};

#[used]
#[unsafe(link_section = ".requests_start_marker")]
static _START_MARKER: RequestsStartMarker = RequestsStartMarker::new();

#[used]
#[unsafe(link_section = ".limine_requests")]
static BASE_REVISION: BaseRevision = BaseRevision::new();

#[used]
#[unsafe(link_section = ".limine_requests")]
static HHDM_REQUEST: HhdmRequest = HhdmRequest::new();

#[used]
#[unsafe(link_section = ".limine_requests")]
static MEMORY_MAP_REQUEST: MemoryMapRequest = MemoryMapRequest::new();

#[used]
#[unsafe(link_section = ".limine_requests")]
static MODULE_REQUEST: ModuleRequest = ModuleRequest::new();

#[used]
#[unsafe(link_section = ".requests_end_marker")]
static _END_MARKER: RequestsEndMarker = RequestsEndMarker::new();

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum BootError {
    #[error("bootloader does not support the requested protocol revision")]
    UnsupportedRevision,
    #[error("bootloader provided no higher-half direct map")]
    MissingHhdm,
    #[error("bootloader provided no memory map")]
    MissingMemoryMap,
    #[error(transparent)]
    Capacity(#[from] CapacityExceeded),
}

/// Everything the kernel takes from the bootloader.
pub struct BootInfo {
    /// Virtual offset at which all physical memory is mapped.
    pub hhdm_offset: u64,
    pub memory_map: MemoryMap,
    pub modules: ModuleList,
}

impl BootInfo {
    /// Reads the Limine responses.
    ///
    /// A missing module response is not an error; the module list is
    /// just empty and `exec` fails for every name.
    ///
    /// # Errors
    /// See [`BootError`].
    pub fn collect() -> Result<Self, BootError> {
        if !BASE_REVISION.is_supported() {
            return Err(BootError::UnsupportedRevision);
        }

        let hhdm_offset = HHDM_REQUEST
            .get_response()
            .ok_or(BootError::MissingHhdm)?
            .offset();

        let entries = MEMORY_MAP_REQUEST
            .get_response()
            .ok_or(BootError::MissingMemoryMap)?
            .entries();

        let mut memory_map = MemoryMap::new();
        for entry in entries {
            let kind = if entry.entry_type == EntryType::USABLE {
                MemoryRegionKind::Usable
            } else {
                MemoryRegionKind::Reserved
            };
            memory_map.push(MemoryRegion::new(entry.base, entry.length, kind))?;
        }
        info!(
            "Memory map: {} regions, {} KiB usable",
            memory_map.regions().len(),
            memory_map.usable_bytes() / 1024
        );

        let mut modules = ModuleList::new();
        match MODULE_REQUEST.get_response() {
            Some(response) => {
                for file in response.modules() {
                    let Ok(path) = file.path().to_str() else {
                        warn!("Skipping boot module with a non UTF-8 path");
                        continue;
                    };
                    #[allow(clippy::cast_possible_truncation)]
                    // SAFETY: Limine keeps module contents mapped and reserved
                    // for the lifetime of the kernel.
                    let bytes = unsafe {
                        core::slice::from_raw_parts(file.addr().cast_const(), file.size() as usize)
                    };
                    let module = BootModule::from_path(path, bytes);
                    debug!("Boot module {:?} ({} bytes)", module.name, bytes.len());
                    modules.push(module)?;
                }
            }
            None => warn!("No boot modules"),
        }

        Ok(Self {
            hhdm_offset,
            memory_map,
            modules,
        })
    }
}
