//! Cycle-accurate Intel 8086/8088 execution core.
//!
//! Owns no memory or I/O of its own; an embedder drives [`Cpu::clock`] and
//! supplies a [`Bus`] implementation for each call.

#[macro_use]
extern crate bitflags;

pub mod biu;
pub mod bus;
pub mod cpu;
pub mod decode;
pub mod execute;
pub mod flags;
pub mod operand;
pub mod registers;

pub use bus::{Bus, FlatBus};
pub use cpu::{Cpu, CpuSignal, IllegalOpcodePolicy, InterruptKind};
