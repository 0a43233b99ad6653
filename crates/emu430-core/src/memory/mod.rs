//! Unified memory controller
//!
//! Routes byte and word reads, writes and instruction fetches to the
//! backing store selected by the containing region: plain banks for SRAM
//! and the peripheral windows, the information memory component, or the
//! FRAM controller for the main code array. Permissions and word
//! alignment are validated before anything is touched, and bus events
//! fire only after an access has committed.

mod event;
mod info;
mod map;

pub use event::{AccessContext, AccessKind, AccessWidth, BusObserver, ViolationReason};
pub use info::{InfoMemory, InfoSegment, INFO_BASE, INFO_END};
pub use map::{MapError, MemoryMap, Permissions, Region, RegionKind};

use crate::error::{Error, Result};
use crate::fram::FramController;

/// The unified memory controller
pub struct MemoryController {
    map: MemoryMap,
    sfr: Vec<u8>,
    periph8: Vec<u8>,
    periph16: Vec<u8>,
    boot: Vec<u8>,
    ram: Vec<u8>,
    vectors: Vec<u8>,
    info: InfoMemory,
    fram: FramController,
    observers: Vec<Box<dyn BusObserver>>,
    op_counter: u64,
    enforce_permissions: bool,
}

impl MemoryController {
    /// Controller over the MSP430FR2355 layout. `enforce_permissions`
    /// normally stays on; turning it off lets every mapped access through
    /// and writes bypass the FRAM controller and segment protection.
    pub fn new(enforce_permissions: bool) -> Self {
        let map = MemoryMap::msp430fr2355();
        let mut sfr = Vec::new();
        let mut periph8 = Vec::new();
        let mut periph16 = Vec::new();
        let mut boot = Vec::new();
        let mut ram = Vec::new();
        let mut vectors = Vec::new();
        let mut fram = FramController::new(0x4000, 0x8000);

        for region in map.regions() {
            let size = region.size() as usize;
            match region.kind {
                RegionKind::Sfr => sfr = vec![0; size],
                RegionKind::Peripheral8 => periph8 = vec![0; size],
                RegionKind::Peripheral16 => periph16 = vec![0; size],
                RegionKind::BootLoader => boot = vec![0; size],
                RegionKind::Ram => ram = vec![0; size],
                RegionKind::InterruptVectors => vectors = vec![0; size],
                RegionKind::InfoMemory => {}
                RegionKind::FramCode => fram = FramController::new(region.start, size),
            }
        }

        Self {
            map,
            sfr,
            periph8,
            periph16,
            boot,
            ram,
            vectors,
            info: InfoMemory::new(),
            fram,
            observers: Vec::new(),
            op_counter: 0,
            enforce_permissions,
        }
    }

    /// The address-space layout
    pub fn map(&self) -> &MemoryMap {
        &self.map
    }

    /// The FRAM controller guarding the code array
    pub fn fram(&self) -> &FramController {
        &self.fram
    }

    /// Mutable access to the FRAM controller (unlock, protection, erase)
    pub fn fram_mut(&mut self) -> &mut FramController {
        &mut self.fram
    }

    /// Information memory segments
    pub fn info(&self) -> &InfoMemory {
        &self.info
    }

    /// Mutable access to information memory (protection flags, erase)
    pub fn info_mut(&mut self) -> &mut InfoMemory {
        &mut self.info
    }

    /// Register a bus event subscriber
    pub fn add_observer(&mut self, observer: Box<dyn BusObserver>) {
        self.observers.push(observer);
    }

    /// Advance simulated time for components that account cycles
    pub fn tick(&mut self, cycles: u32) {
        self.fram.update(cycles);
    }

    /// Clear volatile storage, reset the FRAM controller and restore
    /// unprotected information segments. Non-volatile array contents
    /// survive, as does the observer list.
    pub fn reset(&mut self) {
        self.sfr.fill(0);
        self.periph8.fill(0);
        self.periph16.fill(0);
        self.ram.fill(0);
        self.info.reset();
        self.fram.reset();
        self.op_counter = 0;
    }

    fn begin(&mut self, addr: u16, kind: AccessKind, width: AccessWidth) -> AccessContext {
        self.op_counter += 1;
        AccessContext {
            addr,
            kind,
            width,
            op_id: self.op_counter,
        }
    }

    fn notify_access(&mut self, ctx: &AccessContext, value: u16) {
        for observer in &mut self.observers {
            observer.memory_accessed(ctx, value);
        }
    }

    fn notify_violation(&mut self, ctx: &AccessContext, reason: ViolationReason) {
        log::warn!("{} at {:#06x}: {}", ctx.kind, ctx.addr, reason);
        for observer in &mut self.observers {
            observer.access_violation(ctx, reason);
        }
    }

    /// Validate one access and return the containing region
    fn check(&mut self, ctx: &AccessContext) -> Result<Region> {
        let region = match self.map.find(ctx.addr) {
            Some(region) => *region,
            None => {
                self.notify_violation(ctx, ViolationReason::Unmapped);
                return Err(Error::AccessViolation {
                    addr: ctx.addr,
                    kind: ctx.kind,
                    reason: ViolationReason::Unmapped,
                });
            }
        };
        if ctx.width == AccessWidth::Word {
            if ctx.addr % 2 != 0 {
                self.notify_violation(ctx, ViolationReason::Unaligned);
                return Err(Error::UnalignedAccess { addr: ctx.addr });
            }
            if !region.contains(ctx.addr + 1) {
                self.notify_violation(ctx, ViolationReason::Unmapped);
                return Err(Error::AccessViolation {
                    addr: ctx.addr,
                    kind: ctx.kind,
                    reason: ViolationReason::Unmapped,
                });
            }
        }
        if self.enforce_permissions {
            let needed = match ctx.kind {
                AccessKind::Read => Permissions::READ,
                AccessKind::Write => Permissions::WRITE,
                AccessKind::Execute => Permissions::EXECUTE,
            };
            // Writes into the FRAM array are gated by the controller
            // instead of the permission bits
            let gated = ctx.kind == AccessKind::Write && region.kind.controller_gated_writes();
            if !gated && !region.permissions.contains(needed) {
                self.notify_violation(ctx, ViolationReason::PermissionDenied);
                return Err(Error::AccessViolation {
                    addr: ctx.addr,
                    kind: ctx.kind,
                    reason: ViolationReason::PermissionDenied,
                });
            }
        }
        Ok(region)
    }

    fn load_raw(&self, region: &Region, addr: u16) -> u8 {
        let offset = (addr - region.start) as usize;
        match region.kind {
            RegionKind::Sfr => self.sfr[offset],
            RegionKind::Peripheral8 => self.periph8[offset],
            RegionKind::Peripheral16 => self.periph16[offset],
            RegionKind::BootLoader => self.boot[offset],
            RegionKind::Ram => self.ram[offset],
            RegionKind::InterruptVectors => self.vectors[offset],
            RegionKind::InfoMemory => self.info.read_byte(addr),
            RegionKind::FramCode => self.fram.read_byte(addr),
        }
    }

    fn store_raw(&mut self, region: &Region, addr: u16, value: u8) {
        let offset = (addr - region.start) as usize;
        match region.kind {
            RegionKind::Sfr => self.sfr[offset] = value,
            RegionKind::Peripheral8 => self.periph8[offset] = value,
            RegionKind::Peripheral16 => self.periph16[offset] = value,
            RegionKind::BootLoader => self.boot[offset] = value,
            RegionKind::Ram => self.ram[offset] = value,
            RegionKind::InterruptVectors => self.vectors[offset] = value,
            RegionKind::InfoMemory => self.info.load(addr, &[value]),
            RegionKind::FramCode => self.fram.load(addr, &[value]),
        }
    }

    /// Read one byte
    pub fn read_byte(&mut self, addr: u16) -> Result<u8> {
        let ctx = self.begin(addr, AccessKind::Read, AccessWidth::Byte);
        let region = self.check(&ctx)?;
        let value = self.load_raw(&region, addr);
        self.notify_access(&ctx, value as u16);
        Ok(value)
    }

    /// Read one little-endian word from an even address
    pub fn read_word(&mut self, addr: u16) -> Result<u16> {
        let ctx = self.begin(addr, AccessKind::Read, AccessWidth::Word);
        let region = self.check(&ctx)?;
        let low = self.load_raw(&region, addr) as u16;
        let high = self.load_raw(&region, addr + 1) as u16;
        let value = low | high << 8;
        self.notify_access(&ctx, value);
        Ok(value)
    }

    /// Fetch one instruction word; the containing region must grant
    /// execute permission
    pub fn fetch_instruction(&mut self, addr: u16) -> Result<u16> {
        let ctx = self.begin(addr, AccessKind::Execute, AccessWidth::Word);
        let region = self.check(&ctx)?;
        let low = self.load_raw(&region, addr) as u16;
        let high = self.load_raw(&region, addr + 1) as u16;
        let value = low | high << 8;
        self.notify_access(&ctx, value);
        Ok(value)
    }

    /// Write one byte. `Ok(false)` means a component refused the write
    /// (protected information segment, locked or busy FRAM controller).
    pub fn write_byte(&mut self, addr: u16, value: u8) -> Result<bool> {
        let ctx = self.begin(addr, AccessKind::Write, AccessWidth::Byte);
        let region = self.check(&ctx)?;
        let accepted = if !self.enforce_permissions {
            self.store_raw(&region, addr, value);
            true
        } else {
            match region.kind {
                RegionKind::InfoMemory => self.info.write_byte(addr, value),
                RegionKind::FramCode => self.fram.program_byte(addr, value),
                _ => {
                    self.store_raw(&region, addr, value);
                    true
                }
            }
        };
        if accepted {
            self.notify_access(&ctx, value as u16);
        }
        Ok(accepted)
    }

    /// Write one little-endian word to an even address. `Ok(false)` means
    /// a component refused the write.
    pub fn write_word(&mut self, addr: u16, value: u16) -> Result<bool> {
        let ctx = self.begin(addr, AccessKind::Write, AccessWidth::Word);
        let region = self.check(&ctx)?;
        let low = value as u8;
        let high = (value >> 8) as u8;
        let accepted = if !self.enforce_permissions {
            self.store_raw(&region, addr, low);
            self.store_raw(&region, addr + 1, high);
            true
        } else {
            match region.kind {
                RegionKind::InfoMemory => {
                    // An aligned word never straddles a segment boundary,
                    // so the two byte writes share one protection verdict
                    self.info.write_byte(addr, low) && self.info.write_byte(addr + 1, high)
                }
                RegionKind::FramCode => self.fram.program_word(addr, value),
                _ => {
                    self.store_raw(&region, addr, low);
                    self.store_raw(&region, addr + 1, high);
                    true
                }
            }
        };
        if accepted {
            self.notify_access(&ctx, value);
        }
        Ok(accepted)
    }

    /// Cycle cost of the described access: SRAM reads cost 1, peripheral
    /// reads 2, FRAM-backed reads 3; writes into the FRAM array add the
    /// controller's programming penalty. Rejected accesses cost nothing.
    pub fn access_cycles(&self, ctx: &AccessContext) -> u32 {
        let region = match self.map.find(ctx.addr) {
            Some(region) => region,
            None => return 0,
        };
        let base = region.kind.read_cycles();
        if ctx.kind == AccessKind::Write && region.kind.controller_gated_writes() {
            base + FramController::write_penalty(ctx.width.bytes())
        } else {
            base
        }
    }

    /// Read a word without permission checks, events or side effects.
    /// Returns `None` off the map or on a misaligned address.
    pub fn peek_word(&self, addr: u16) -> Option<u16> {
        if addr % 2 != 0 {
            return None;
        }
        let region = self.map.find(addr)?;
        if !region.contains(addr + 1) {
            return None;
        }
        let low = self.load_raw(region, addr) as u16;
        let high = self.load_raw(region, addr + 1) as u16;
        Some(low | high << 8)
    }

    /// Copy an image directly into backing storage, bypassing permissions
    /// and component state machines. Fails only on unmapped addresses.
    pub fn load(&mut self, addr: u16, bytes: &[u8]) -> Result<()> {
        for (i, &byte) in bytes.iter().enumerate() {
            let target = addr.wrapping_add(i as u16);
            let region = match self.map.find(target) {
                Some(region) => *region,
                None => {
                    return Err(Error::AccessViolation {
                        addr: target,
                        kind: AccessKind::Write,
                        reason: ViolationReason::Unmapped,
                    })
                }
            };
            self.store_raw(&region, target, byte);
        }
        Ok(())
    }
}
