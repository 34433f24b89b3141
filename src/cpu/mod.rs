//! CPU emulation for the Mano basic computer.
//!
//! This module implements the machine described by M. Morris Mano:
//! - 4096 sixteen-bit memory words
//! - AC, DR, IR, TR, AR, PC, INPR, OUTR and a sequence counter
//! - 7 memory-reference, 12 register-reference and 6 I/O instructions,
//!   executed one T-state at a time

pub mod memory;
pub mod registers;
pub mod decode;
pub mod execute;
pub mod snapshot;

pub use memory::{Memory, MemoryError, MEMORY_SIZE};
pub use registers::{Flags, Registers};
pub use decode::{decode, encode, IoOp, MemoryOp, Opcode, Operation, RegisterOp};
pub use execute::{CpuError, Simulator, TState};
pub use snapshot::SnapShot;
