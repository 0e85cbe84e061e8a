//! Builds small ELF64 images in memory.

pub const PF_X: u32 = 1;
pub const PF_W: u32 = 2;
pub const PF_R: u32 = 4;

struct Segment {
    vaddr: u64,
    flags: u32,
    data: Vec<u8>,
    memsz: u64,
}

pub struct ImageBuilder {
    entry: u64,
    segments: Vec<Segment>,
}

impl ImageBuilder {
    pub const fn new(entry: u64) -> Self {
        Self {
            entry,
            segments: Vec::new(),
        }
    }

    pub fn segment(mut self, vaddr: u64, flags: u32, data: &[u8], memsz: u64) -> Self {
        self.segments.push(Segment {
            vaddr,
            flags,
            data: data.to_vec(),
            memsz,
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let phoff = 64u64;
        let data_start = phoff + 56 * self.segments.len() as u64;

        let mut out = Vec::new();
        out.extend_from_slice(b"\x7FELF");
        out.extend_from_slice(&[2, 1, 1, 0]);
        out.extend_from_slice(&[0; 8]);
        out.extend_from_slice(&2u16.to_le_bytes()); // ET_EXEC
        out.extend_from_slice(&62u16.to_le_bytes()); // EM_X86_64
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&self.entry.to_le_bytes());
        out.extend_from_slice(&phoff.to_le_bytes());
        out.extend_from_slice(&0u64.to_le_bytes()); // e_shoff
        out.extend_from_slice(&0u32.to_le_bytes()); // e_flags
        out.extend_from_slice(&64u16.to_le_bytes());
        out.extend_from_slice(&56u16.to_le_bytes());
        out.extend_from_slice(&(self.segments.len() as u16).to_le_bytes());
        out.extend_from_slice(&[0; 6]);
        assert_eq!(out.len(), 64);

        let mut offset = data_start;
        for s in &self.segments {
            out.extend_from_slice(&1u32.to_le_bytes()); // PT_LOAD
            out.extend_from_slice(&s.flags.to_le_bytes());
            out.extend_from_slice(&offset.to_le_bytes());
            out.extend_from_slice(&s.vaddr.to_le_bytes());
            out.extend_from_slice(&s.vaddr.to_le_bytes());
            out.extend_from_slice(&(s.data.len() as u64).to_le_bytes());
            out.extend_from_slice(&s.memsz.to_le_bytes());
            out.extend_from_slice(&0x1000u64.to_le_bytes());
            offset += s.data.len() as u64;
        }
        for s in &self.segments {
            out.extend_from_slice(&s.data);
        }
        out
    }
}
