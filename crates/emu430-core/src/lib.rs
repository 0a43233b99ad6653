//! emu430-core - MSP430FR2355 CPU core emulator
//!
//! This crate provides the emulated machine: the register file, the
//! unified memory controller with its region/permission model, the
//! FRAM/flash controller state machine, and the execution engine that
//! drives the instruction set modeled by `emu430-isa`.
//!
//! The core is deterministic and single-threaded: one call to
//! [`Cpu::step`] executes exactly one instruction to completion, and two
//! runs over identical inputs produce identical register, memory and
//! cycle traces. Peripheral models, configuration loading and logger
//! backends live outside this crate and attach through the embedding
//! API and the bus event interface.
//!
//! # Example
//!
//! ```ignore
//! use emu430_core::{Config, Cpu};
//!
//! let mut cpu = Cpu::new(Config::default());
//! cpu.load(0x4000, &[0x05, 0x54]).unwrap(); // ADD R4, R5
//! cpu.set_pc(0x4000);
//! let cycles = cpu.step().unwrap();
//! assert_eq!(cycles, 1);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod cpu;
pub mod error;
pub mod fram;
pub mod memory;
pub mod registers;

pub use config::{Config, CpuConfig, LogLevel, LoggingConfig, MemoryConfig};
pub use cpu::{Cpu, CpuState, StopReason};
pub use error::{Error, Result};
pub use fram::{ControllerState, FlashOperation, FramController, ProtectionLevel};
pub use memory::{
    AccessContext, AccessKind, AccessWidth, BusObserver, InfoMemory, InfoSegment,
    MemoryController, MemoryMap, Permissions, Region, RegionKind, ViolationReason,
};
pub use registers::{RegisterFile, StatusFlags};
