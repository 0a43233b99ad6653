//! Address-space layout
//!
//! The 64 KiB address space is described by an ordered list of
//! non-overlapping regions. Each region names its kind (which selects the
//! backing store and the access timing), its inclusive address range and
//! its permission set. Construction validates ordering and overlap so
//! lookups can assume a well-formed map.

use bitflags::bitflags;
use thiserror::Error;

bitflags! {
    /// Region access permissions
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Permissions: u8 {
        /// Data reads allowed
        const READ = 1 << 0;
        /// Data writes allowed
        const WRITE = 1 << 1;
        /// Instruction fetches allowed
        const EXECUTE = 1 << 2;
    }
}

impl Permissions {
    /// Read + write
    pub const RW: Self = Self::READ.union(Self::WRITE);
    /// Read + execute
    pub const RX: Self = Self::READ.union(Self::EXECUTE);
    /// Read + write + execute
    pub const RWX: Self = Self::READ.union(Self::WRITE).union(Self::EXECUTE);
}

/// What backs a region and how accesses to it are priced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    /// Special function registers
    Sfr,
    /// 8-bit peripheral window
    Peripheral8,
    /// 16-bit peripheral window
    Peripheral16,
    /// Bootstrap loader FRAM (read/execute image)
    BootLoader,
    /// Information memory segments A-D
    InfoMemory,
    /// On-chip SRAM
    Ram,
    /// Main FRAM code array, writes gated by the attached controller
    FramCode,
    /// Interrupt vector table
    InterruptVectors,
}

impl RegionKind {
    /// Base cycle cost of a read in this region. SRAM answers in one
    /// cycle, peripheral windows in two, FRAM-backed storage in three.
    pub const fn read_cycles(&self) -> u32 {
        match self {
            Self::Ram => 1,
            Self::Sfr | Self::Peripheral8 | Self::Peripheral16 => 2,
            Self::BootLoader | Self::InfoMemory | Self::FramCode | Self::InterruptVectors => 3,
        }
    }

    /// Whether writes bypass the permission bits and go through the FRAM
    /// controller, which applies its own lock and protection rules
    pub const fn controller_gated_writes(&self) -> bool {
        matches!(self, Self::FramCode)
    }
}

/// One mapped address range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// Backing store selector
    pub kind: RegionKind,
    /// First address of the region
    pub start: u16,
    /// Last address of the region (inclusive)
    pub end: u16,
    /// Permission set
    pub permissions: Permissions,
    /// Human-readable name for diagnostics
    pub description: &'static str,
}

impl Region {
    /// Size of the region in bytes
    pub const fn size(&self) -> u32 {
        self.end as u32 - self.start as u32 + 1
    }

    /// Whether an address falls inside this region
    pub const fn contains(&self, addr: u16) -> bool {
        addr >= self.start && addr <= self.end
    }

    /// Whether this region overlaps another
    pub const fn overlaps(&self, other: &Region) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// Errors detected while building a memory map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MapError {
    /// A region has start > end
    #[error("region '{0}' has inverted bounds")]
    InvertedBounds(&'static str),
    /// Two regions overlap
    #[error("regions '{0}' and '{1}' overlap")]
    Overlap(&'static str, &'static str),
    /// Regions are not sorted by start address
    #[error("region '{0}' is out of order")]
    OutOfOrder(&'static str),
}

/// Ordered, validated list of regions
#[derive(Debug, Clone)]
pub struct MemoryMap {
    regions: Vec<Region>,
}

impl MemoryMap {
    /// Build a map from a region list, validating bounds, ordering and
    /// overlap
    pub fn new(regions: Vec<Region>) -> Result<Self, MapError> {
        for region in &regions {
            if region.start > region.end {
                return Err(MapError::InvertedBounds(region.description));
            }
        }
        for pair in regions.windows(2) {
            if pair[1].start < pair[0].start {
                return Err(MapError::OutOfOrder(pair[1].description));
            }
            if pair[0].overlaps(&pair[1]) {
                return Err(MapError::Overlap(pair[0].description, pair[1].description));
            }
        }
        Ok(Self { regions })
    }

    /// The MSP430FR2355 layout
    pub fn msp430fr2355() -> Self {
        let regions = vec![
            Region {
                kind: RegionKind::Sfr,
                start: 0x0000,
                end: 0x00FF,
                permissions: Permissions::RW,
                description: "special function registers",
            },
            Region {
                kind: RegionKind::Peripheral8,
                start: 0x0100,
                end: 0x01FF,
                permissions: Permissions::RW,
                description: "8-bit peripherals",
            },
            Region {
                kind: RegionKind::Peripheral16,
                start: 0x0200,
                end: 0x027F,
                permissions: Permissions::RW,
                description: "16-bit peripherals",
            },
            Region {
                kind: RegionKind::BootLoader,
                start: 0x1000,
                end: 0x17FF,
                permissions: Permissions::RX,
                description: "bootstrap loader FRAM",
            },
            Region {
                kind: RegionKind::InfoMemory,
                start: 0x1800,
                end: 0x19FF,
                permissions: Permissions::RW,
                description: "information memory",
            },
            Region {
                kind: RegionKind::Ram,
                start: 0x2000,
                end: 0x2FFF,
                permissions: Permissions::RWX,
                description: "SRAM",
            },
            Region {
                kind: RegionKind::FramCode,
                start: 0x4000,
                end: 0xBFFF,
                permissions: Permissions::RX,
                description: "FRAM code",
            },
            Region {
                kind: RegionKind::InterruptVectors,
                start: 0xFFE0,
                end: 0xFFFF,
                permissions: Permissions::RX,
                description: "interrupt vectors",
            },
        ];
        // The built-in layout is known to validate
        Self::new(regions).expect("device layout is well-formed")
    }

    /// Find the region containing an address
    pub fn find(&self, addr: u16) -> Option<&Region> {
        // Ordered search over a handful of regions; the map is sorted so
        // the first hit is the only hit
        self.regions.iter().find(|r| r.contains(addr))
    }

    /// All regions in address order
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }
}
