//! Information memory
//!
//! Four fixed 128-byte FRAM segments at 0x1800-0x19FF, named D through A
//! from the bottom up. Each segment carries a mutable write-protection
//! flag: reads always succeed, writes only land in unprotected segments,
//! and erasing a segment restores it to 0xFF.

/// First address of information memory
pub const INFO_BASE: u16 = 0x1800;
/// Last address of information memory (inclusive)
pub const INFO_END: u16 = 0x19FF;
/// Size of one segment in bytes
pub const SEGMENT_SIZE: u16 = 128;

/// One of the four information memory segments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoSegment {
    /// 0x1980-0x19FF
    A,
    /// 0x1900-0x197F
    B,
    /// 0x1880-0x18FF
    C,
    /// 0x1800-0x187F
    D,
}

impl InfoSegment {
    /// All segments, bottom of the address range first
    pub const ALL: [Self; 4] = [Self::D, Self::C, Self::B, Self::A];

    /// First address of this segment
    pub const fn base(&self) -> u16 {
        match self {
            Self::A => 0x1980,
            Self::B => 0x1900,
            Self::C => 0x1880,
            Self::D => 0x1800,
        }
    }

    /// Segment containing an address, if it is information memory
    pub const fn containing(addr: u16) -> Option<Self> {
        match addr {
            0x1800..=0x187F => Some(Self::D),
            0x1880..=0x18FF => Some(Self::C),
            0x1900..=0x197F => Some(Self::B),
            0x1980..=0x19FF => Some(Self::A),
            _ => None,
        }
    }

    const fn index(&self) -> usize {
        match self {
            Self::D => 0,
            Self::C => 1,
            Self::B => 2,
            Self::A => 3,
        }
    }
}

/// Information memory storage plus per-segment protection flags
#[derive(Debug, Clone)]
pub struct InfoMemory {
    data: [u8; 512],
    protected: [bool; 4],
}

impl InfoMemory {
    /// Fresh information memory: erased storage, all segments writable
    pub fn new() -> Self {
        Self {
            data: [0xFF; 512],
            protected: [false; 4],
        }
    }

    /// Read a byte. Reads are never refused.
    pub fn read_byte(&self, addr: u16) -> u8 {
        self.data[(addr - INFO_BASE) as usize]
    }

    /// Write a byte. Returns false without mutating when the owning
    /// segment is protected.
    pub fn write_byte(&mut self, addr: u16, value: u8) -> bool {
        let segment = match InfoSegment::containing(addr) {
            Some(s) => s,
            None => return false,
        };
        if self.protected[segment.index()] {
            log::warn!(
                "write of {:#04x} to {:#06x} refused: segment {:?} is protected",
                value,
                addr,
                segment
            );
            return false;
        }
        self.data[(addr - INFO_BASE) as usize] = value;
        true
    }

    /// Whether a segment is write-protected
    pub fn is_protected(&self, segment: InfoSegment) -> bool {
        self.protected[segment.index()]
    }

    /// Set or clear a segment's write protection
    pub fn set_protected(&mut self, segment: InfoSegment, protected: bool) {
        self.protected[segment.index()] = protected;
    }

    /// Erase a segment to 0xFF. Returns false when it is protected.
    pub fn erase_segment(&mut self, segment: InfoSegment) -> bool {
        if self.protected[segment.index()] {
            log::warn!("erase refused: segment {:?} is protected", segment);
            return false;
        }
        let start = (segment.base() - INFO_BASE) as usize;
        self.data[start..start + SEGMENT_SIZE as usize].fill(0xFF);
        true
    }

    /// Restore unprotected segments to 0xFF; protected segments keep
    /// their contents and their flag
    pub fn reset(&mut self) {
        for segment in InfoSegment::ALL {
            if !self.protected[segment.index()] {
                let start = (segment.base() - INFO_BASE) as usize;
                self.data[start..start + SEGMENT_SIZE as usize].fill(0xFF);
            }
        }
    }

    /// Copy bytes directly into storage, ignoring protection. Intended
    /// for image loading.
    pub fn load(&mut self, addr: u16, bytes: &[u8]) {
        let start = (addr - INFO_BASE) as usize;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
    }
}

impl Default for InfoMemory {
    fn default() -> Self {
        Self::new()
    }
}
