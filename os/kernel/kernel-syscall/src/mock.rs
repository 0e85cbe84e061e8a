//! In-memory [`SyscallContext`] for tests.

use crate::{SyscallContext, SyscallError};
use kernel_vmem::{TableLevel, VirtualAddress, VmemError};
use std::collections::{BTreeMap, VecDeque};

#[derive(Default)]
pub struct MockContext {
    pub input: VecDeque<u8>,
    /// `(waits, ch)`: `ch` becomes available after that many waits.
    pub arrives_after_waits: Vec<(usize, u8)>,
    pub waits: usize,
    pub output: Vec<u8>,
    pub memory: BTreeMap<u64, u8>,
    pub mapped: Vec<VirtualAddress>,
    /// Number of pages `map_user_page` accepts before running out.
    pub map_budget: Option<usize>,
    pub modules: Vec<(&'static str, VirtualAddress)>,
    pub loaded: Vec<String>,
}

impl MockContext {
    pub fn poke(&mut self, va: u64, bytes: &[u8]) {
        for (i, b) in bytes.iter().enumerate() {
            self.memory.insert(va + i as u64, *b);
        }
    }

    pub fn peek(&self, va: u64, len: usize) -> Vec<u8> {
        (0..len as u64).map(|i| self.memory[&(va + i)]).collect()
    }

    fn not_mapped(va: u64) -> VmemError {
        VmemError::NotMapped {
            va: VirtualAddress::new(va),
            level: TableLevel::L1,
        }
    }
}

impl SyscallContext for MockContext {
    fn try_read_char(&mut self) -> Option<u8> {
        self.input.pop_front()
    }

    fn wait_for_input(&mut self) {
        self.waits += 1;
        let waits = self.waits;
        self.arrives_after_waits.retain(|&(after, ch)| {
            if after == waits {
                self.input.push_back(ch);
                false
            } else {
                true
            }
        });
    }

    fn write_output(&mut self, bytes: &[u8]) {
        self.output.extend_from_slice(bytes);
    }

    fn copy_from_user(&self, va: VirtualAddress, buf: &mut [u8]) -> Result<(), VmemError> {
        for (i, slot) in buf.iter_mut().enumerate() {
            let addr = va.as_u64() + i as u64;
            *slot = *self.memory.get(&addr).ok_or_else(|| Self::not_mapped(addr))?;
        }
        Ok(())
    }

    fn copy_to_user(&mut self, va: VirtualAddress, bytes: &[u8]) -> Result<(), VmemError> {
        for (i, b) in bytes.iter().enumerate() {
            let addr = va.as_u64() + i as u64;
            let slot = self
                .memory
                .get_mut(&addr)
                .ok_or_else(|| Self::not_mapped(addr))?;
            *slot = *b;
        }
        Ok(())
    }

    fn map_user_page(&mut self, va: VirtualAddress) -> Result<(), VmemError> {
        if self.map_budget.is_some_and(|budget| self.mapped.len() >= budget) {
            return Err(VmemError::OutOfMemory { va });
        }
        self.mapped.push(va);
        Ok(())
    }

    fn load_module(&mut self, name: &str) -> Result<VirtualAddress, SyscallError> {
        let (_, entry) = self
            .modules
            .iter()
            .find(|(n, _)| *n == name)
            .ok_or(SyscallError::ImageNotFound)?;
        self.loaded.push(name.to_owned());
        Ok(*entry)
    }
}
