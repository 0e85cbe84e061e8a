use bitfield_struct::bitfield;
use kernel_memory_addresses::VirtualAddress;

/// Why an image was rejected before anything was mapped.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ElfError {
    #[error("image is shorter than the 64-byte ELF header")]
    TooShort,
    #[error("missing \\x7FELF magic")]
    BadMagic,
    #[error("not a 64-bit image")]
    BadClass,
    #[error("not a little-endian image")]
    BadEndianness,
    #[error("unsupported object type {0}")]
    BadType(u16),
    #[error("unsupported machine {0}, expected x86-64")]
    BadMachine(u16),
    #[error("program header entries are {0} bytes, expected 56")]
    BadHeaderSize(u16),
    #[error("program header table lies outside the image")]
    HeadersOutOfBounds,
    #[error("segment {index} file range lies outside the image")]
    SegmentOutOfBounds { index: usize },
    #[error("segment {index} has a file size larger than its memory size")]
    SegmentSizes { index: usize },
    #[error("segment {index} reaches outside the user half")]
    SegmentNotUser { index: usize },
}

/// `Elf64_Phdr.p_flags` (SVr4): bit0=X, bit1=W, bit2=R.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct PFlags {
    #[bits(1)]
    pub execute: bool, // PF_X = 1
    #[bits(1)]
    pub write: bool, // PF_W = 2
    #[bits(1)]
    pub read: bool, // PF_R = 4
    #[bits(29)]
    __: u32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SegmentKind {
    Null,
    Load,
    Other(u32),
}

impl From<u32> for SegmentKind {
    fn from(value: u32) -> Self {
        match value {
            PT_NULL => Self::Null,
            PT_LOAD => Self::Load,
            other => Self::Other(other),
        }
    }
}

/// One decoded `Elf64_Phdr`.
#[derive(Copy, Clone, Debug)]
pub struct ProgramHeader {
    pub kind: SegmentKind,
    pub flags: PFlags,
    pub offset: u64,
    pub vaddr: VirtualAddress,
    pub filesz: u64,
    pub memsz: u64,
    pub align: u64,
}

impl ProgramHeader {
    /// First address past the segment in memory.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.vaddr.as_u64().saturating_add(self.memsz)
    }

    /// Whether any byte of the page starting at `page` belongs to this segment.
    #[must_use]
    pub const fn touches_page(&self, page: u64, page_size: u64) -> bool {
        self.memsz != 0 && page < self.end() && self.vaddr.as_u64() < page.saturating_add(page_size)
    }
}

const ET_EXEC: u16 = 2;
const ET_DYN: u16 = 3;
const EM_X86_64: u16 = 62;
const PT_NULL: u32 = 0;
const PT_LOAD: u32 = 1;
const HEADER_SIZE: usize = 64;
const PHDR_SIZE: usize = 56;

#[inline]
fn le16(x: &[u8]) -> u16 {
    u16::from_le_bytes([x[0], x[1]])
}

#[inline]
fn le32(x: &[u8]) -> u32 {
    u32::from_le_bytes([x[0], x[1], x[2], x[3]])
}

#[inline]
fn le64(x: &[u8]) -> u64 {
    u64::from_le_bytes([x[0], x[1], x[2], x[3], x[4], x[5], x[6], x[7]])
}

/// Validated view of an image; program headers are decoded on demand.
#[derive(Copy, Clone)]
pub struct ElfImage<'a> {
    bytes: &'a [u8],
    entry: VirtualAddress,
    phoff: usize,
    phnum: usize,
}

impl<'a> ElfImage<'a> {
    /// Checks the file header and that the program header table is in bounds.
    ///
    /// # Errors
    /// The first [`ElfError`] found; nothing about segments is checked yet.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, ElfError> {
        if bytes.len() < HEADER_SIZE {
            return Err(ElfError::TooShort);
        }
        if &bytes[0..4] != b"\x7FELF" {
            return Err(ElfError::BadMagic);
        }
        if bytes[4] != 2 {
            return Err(ElfError::BadClass);
        }
        if bytes[5] != 1 {
            return Err(ElfError::BadEndianness);
        }

        let e_type = le16(&bytes[16..18]);
        if !(e_type == ET_EXEC || e_type == ET_DYN) {
            return Err(ElfError::BadType(e_type));
        }
        let machine = le16(&bytes[18..20]);
        if machine != EM_X86_64 {
            return Err(ElfError::BadMachine(machine));
        }

        let entry = VirtualAddress::new(le64(&bytes[24..32]));
        let phoff = usize::try_from(le64(&bytes[32..40])).map_err(|_| ElfError::HeadersOutOfBounds)?;
        let phentsize = le16(&bytes[54..56]);
        let phnum = le16(&bytes[56..58]) as usize;

        if phnum > 0 && phentsize as usize != PHDR_SIZE {
            return Err(ElfError::BadHeaderSize(phentsize));
        }
        let need = phoff
            .checked_add(phnum * PHDR_SIZE)
            .ok_or(ElfError::HeadersOutOfBounds)?;
        if need > bytes.len() {
            return Err(ElfError::HeadersOutOfBounds);
        }

        Ok(Self {
            bytes,
            entry,
            phoff,
            phnum,
        })
    }

    /// Declared entry point.
    #[must_use]
    pub const fn entry(&self) -> VirtualAddress {
        self.entry
    }

    #[must_use]
    pub const fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Number of program headers.
    #[must_use]
    pub const fn header_count(&self) -> usize {
        self.phnum
    }

    /// Decodes program header `i`.
    #[must_use]
    pub fn header(&self, i: usize) -> Option<ProgramHeader> {
        if i >= self.phnum {
            return None;
        }
        let p = self.phoff + i * PHDR_SIZE;
        let s = self.bytes.get(p..p + PHDR_SIZE)?;
        Some(ProgramHeader {
            kind: SegmentKind::from(le32(&s[0..4])),
            flags: PFlags::from_bits(le32(&s[4..8])),
            offset: le64(&s[8..16]),
            vaddr: VirtualAddress::new(le64(&s[16..24])),
            filesz: le64(&s[32..40]),
            memsz: le64(&s[40..48]),
            align: le64(&s[48..56]),
        })
    }

    /// All program headers, with their index.
    pub fn headers(&self) -> impl Iterator<Item = (usize, ProgramHeader)> + '_ {
        (0..self.phnum).filter_map(|i| self.header(i).map(|ph| (i, ph)))
    }

    /// `PT_LOAD` headers, with their index in the table.
    pub fn loadable(&self) -> impl Iterator<Item = (usize, ProgramHeader)> + '_ {
        self.headers().filter(|(_, ph)| ph.kind == SegmentKind::Load)
    }

    /// The file bytes backing segment `index`.
    ///
    /// # Errors
    /// [`ElfError::SegmentOutOfBounds`] if the range is not inside the image.
    pub fn segment_bytes(&self, index: usize, ph: &ProgramHeader) -> Result<&'a [u8], ElfError> {
        let oob = ElfError::SegmentOutOfBounds { index };
        let off = usize::try_from(ph.offset).map_err(|_| oob)?;
        let size = usize::try_from(ph.filesz).map_err(|_| oob)?;
        let end = off.checked_add(size).ok_or(oob)?;
        self.bytes.get(off..end).ok_or(oob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_image::{ImageBuilder, PF_R, PF_W, PF_X};

    #[test]
    fn parses_headers_of_a_built_image() {
        let image = ImageBuilder::new(0x40_0010)
            .segment(0x40_0000, PF_R | PF_X, &[0x90; 16], 16)
            .segment(0x40_1000, PF_R | PF_W, &[], 4096)
            .build();

        let elf = ElfImage::parse(&image).unwrap();
        assert_eq!(elf.entry(), VirtualAddress::new(0x40_0010));
        assert_eq!(elf.header_count(), 2);

        let (_, text) = elf.loadable().next().unwrap();
        assert!(text.flags.read() && text.flags.execute() && !text.flags.write());
        assert_eq!(elf.segment_bytes(0, &text).unwrap(), &[0x90; 16]);

        let (i, bss) = elf.loadable().nth(1).unwrap();
        assert_eq!(i, 1);
        assert_eq!((bss.filesz, bss.memsz), (0, 4096));
    }

    #[test]
    fn rejects_malformed_headers() {
        let good = ImageBuilder::new(0x40_0000).build();

        assert_eq!(ElfImage::parse(&good[..63]).err(), Some(ElfError::TooShort));

        let mut bad = good.clone();
        bad[0] = 0;
        assert_eq!(ElfImage::parse(&bad).err(), Some(ElfError::BadMagic));

        let mut bad = good.clone();
        bad[4] = 1;
        assert_eq!(ElfImage::parse(&bad).err(), Some(ElfError::BadClass));

        let mut bad = good.clone();
        bad[5] = 2;
        assert_eq!(ElfImage::parse(&bad).err(), Some(ElfError::BadEndianness));

        let mut bad = good.clone();
        bad[16] = 1; // ET_REL
        assert_eq!(ElfImage::parse(&bad).err(), Some(ElfError::BadType(1)));

        let mut bad = good.clone();
        bad[18] = 3; // EM_386
        assert_eq!(ElfImage::parse(&bad).err(), Some(ElfError::BadMachine(3)));
    }

    #[test]
    fn program_headers_must_fit() {
        let mut image = ImageBuilder::new(0x40_0000)
            .segment(0x40_0000, PF_R, &[1, 2, 3], 3)
            .build();
        // claim a second header that is not there
        image[56] = 2;
        assert_eq!(
            ElfImage::parse(&image).err(),
            Some(ElfError::HeadersOutOfBounds)
        );
    }

    #[test]
    fn segment_file_range_is_bounds_checked() {
        let image = ImageBuilder::new(0x40_0000)
            .segment(0x40_0000, PF_R, &[1, 2, 3], 3)
            .build();
        let elf = ElfImage::parse(&image).unwrap();
        let (_, mut ph) = elf.loadable().next().unwrap();
        ph.offset = image.len() as u64 - 1;
        assert_eq!(
            elf.segment_bytes(0, &ph),
            Err(ElfError::SegmentOutOfBounds { index: 0 })
        );
    }

    #[test]
    fn page_overlap() {
        let ph = ProgramHeader {
            kind: SegmentKind::Load,
            flags: PFlags::new(),
            offset: 0,
            vaddr: VirtualAddress::new(0x40_0F00),
            filesz: 0,
            memsz: 0x200,
            align: 0x1000,
        };
        assert!(ph.touches_page(0x40_0000, 0x1000));
        assert!(ph.touches_page(0x40_1000, 0x1000));
        assert!(!ph.touches_page(0x40_2000, 0x1000));
        assert!(!ph.touches_page(0x3F_F000, 0x1000));
    }
}
