//! # Mano Simulator
//!
//! An assembler and simulator for the basic computer of M. Morris Mano's
//! *Computer System Architecture*.
//!
//! Source text is assembled into a [`Program`] by a two-pass assembler, and
//! a [`Simulator`] executes it one T-state at a time. Both report what they
//! do through an [`EventSink`](event::EventSink).
//!
//! ```
//! use mano::{assemble, Simulator};
//!
//! let program = assemble("LDA X\nINC\nHLT\nX, DEC 41\nEND").unwrap();
//! let mut sim = Simulator::new();
//! sim.load(&program).unwrap();
//! sim.run().unwrap();
//! assert_eq!(sim.registers().ac(), 42);
//! ```

pub mod asm;
pub mod cpu;
pub mod event;

// Re-export commonly used types
pub use asm::{assemble, assemble_with, disassemble, Assembler, AssemblerError, Data, Instruction, Program};
pub use cpu::{CpuError, Flags, Memory, Registers, SnapShot, Simulator, TState};
pub use event::{EventLog, EventSink, LogContext, LogEntry, LogLevel, LogSink};
