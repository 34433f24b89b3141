//! CPU execution engine for the Mano machine.
//!
//! Execution is driven by the sequence counter. Every call to
//! [`Simulator::micro_step`] performs exactly one T-state:
//!
//! | SC | Action                                                    |
//! |----|-----------------------------------------------------------|
//! | T0 | `AR <- PC`                                                |
//! | T1 | `IR <- M[AR]`, `PC <- PC + 1`                             |
//! | T2 | decode, `AR <- IR(0-11)`                                  |
//! | T3 | MRI: indirection. Otherwise execute the whole instruction |
//! | T4 | MRI effect, part 1                                        |
//! | T5 | MRI effect, part 2                                        |
//! | T6 | ISZ write-back and skip                                   |
//!
//! A pending output byte or input byte is serviced at the start of any
//! micro-step taken with SC = 0.

use crate::asm::Program;
use crate::cpu::decode::{decode, Fields, IoOp, MemoryOp, Operation, RegisterOp};
use crate::cpu::memory::{Memory, MemoryError};
use crate::cpu::registers::{Flags, Registers};
use crate::cpu::snapshot::SnapShot;
use crate::event::{EventLog, EventSink, LogContext};
use serde::{Serialize, Deserialize};
use std::collections::VecDeque;
use thiserror::Error;

/// The timing states selected by SC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TState {
    T0,
    T1,
    T2,
    T3,
    T4,
    T5,
    T6,
}

impl TState {
    pub const ALL: [TState; 7] = [
        TState::T0,
        TState::T1,
        TState::T2,
        TState::T3,
        TState::T4,
        TState::T5,
        TState::T6,
    ];

    /// The state for a sequence counter value, if it names one.
    pub fn from_sc(sc: u8) -> Option<Self> {
        Self::ALL.get(sc as usize).copied()
    }
}

/// The Mano simulator.
///
/// Owns the register file, flags, memory and I/O queues. Every state
/// transition is reported to the sink `S`.
pub struct Simulator<S: EventSink = EventLog> {
    regs: Registers,
    flags: Flags,
    mem: Memory,
    /// The loaded program; `None` until a successful [`load`](Self::load).
    program: Option<Program>,
    input: VecDeque<u8>,
    output: Vec<u8>,
    /// Micro-steps executed since the last reset.
    cycles: u64,
    /// Instructions completed since the last reset.
    instructions: u64,
    sink: S,
}

impl Simulator<EventLog> {
    /// Create a simulator that records its trace in an [`EventLog`].
    ///
    /// The log keeps every entry, a handful per micro-step, until it is
    /// cleared. For long runs where only the `log` facade output matters,
    /// use `Simulator::with_sink(LogSink)`.
    pub fn new() -> Self {
        Self::with_sink(EventLog::new())
    }
}

impl Default for Simulator<EventLog> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: EventSink> Simulator<S> {
    pub fn with_sink(sink: S) -> Self {
        Self {
            regs: Registers::new(),
            flags: Flags::new(),
            mem: Memory::new(),
            program: None,
            input: VecDeque::new(),
            output: Vec::new(),
            cycles: 0,
            instructions: 0,
            sink,
        }
    }

    /// Restore the power-on state and forget the loaded program.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.flags.reset();
        self.mem.clear();
        self.program = None;
        self.input.clear();
        self.output.clear();
        self.cycles = 0;
        self.instructions = 0;
        self.sink.info(LogContext::System, "Simulator reset");
    }

    /// Load a program.
    ///
    /// Resets all state (including both I/O queues), writes every word at
    /// its origin and points PC at the first instruction. A rejected program
    /// leaves the simulator untouched.
    pub fn load(&mut self, program: &Program) -> Result<(), CpuError> {
        let Some(entry) = program.entry_point() else {
            self.sink.error(LogContext::System, CpuError::EmptyProgram.to_string());
            return Err(CpuError::EmptyProgram);
        };
        if let Err(err) = Memory::check_program(program) {
            self.sink.error(LogContext::System, err.to_string());
            return Err(err.into());
        }

        self.reset();
        self.mem.load_program(program)?;
        self.regs.set_pc(entry as u32);
        self.program = Some(program.clone());

        self.sink.success(
            LogContext::System,
            format!(
                "Program loaded: {} instruction(s), {} data word(s), PC = {:03X}",
                program.instructions.len(),
                program.data.len(),
                entry
            ),
        );
        Ok(())
    }

    // ==================== I/O queues ====================

    /// Replace the pending input with `bytes`.
    pub fn set_input_stream(&mut self, bytes: impl IntoIterator<Item = u8>) {
        self.input = bytes.into_iter().collect();
    }

    pub fn push_input(&mut self, byte: u8) {
        self.input.push_back(byte);
    }

    pub fn clear_input(&mut self) {
        self.input.clear();
    }

    /// Bytes not yet consumed by the machine.
    pub fn input_stream(&self) -> &VecDeque<u8> {
        &self.input
    }

    /// Bytes written by `OUT`, in order.
    pub fn output_stream(&self) -> &[u8] {
        &self.output
    }

    // ==================== Stepping ====================

    /// Execute one T-state. Does nothing once halted.
    pub fn micro_step(&mut self) -> Result<(), CpuError> {
        self.ensure_loaded()?;
        if !self.flags.s {
            return Ok(());
        }

        self.service_io();

        let Some(state) = TState::from_sc(self.regs.sc()) else {
            self.sink.warn(
                LogContext::System,
                format!("SC = {} is not a valid T-state, SC <- 0", self.regs.sc()),
            );
            self.regs.set_sc(0);
            return Ok(());
        };

        match state {
            TState::T0 => self.t0(),
            TState::T1 => self.t1(),
            TState::T2 => self.t2(),
            TState::T3 => self.t3(),
            TState::T4 => self.t4(),
            TState::T5 => self.t5(),
            TState::T6 => self.t6(),
        }

        self.cycles += 1;
        if state != TState::T0 && self.regs.sc() == 0 {
            self.instructions += 1;
        }
        Ok(())
    }

    /// Execute micro-steps until the current instruction completes.
    pub fn macro_step(&mut self) -> Result<(), CpuError> {
        self.ensure_loaded()?;
        if !self.flags.s {
            return Ok(());
        }

        if self.regs.sc() == 0 {
            self.micro_step()?;
        }
        while self.regs.sc() != 0 && self.flags.s {
            self.micro_step()?;
        }
        Ok(())
    }

    /// Run until HLT.
    ///
    /// Returns the number of micro-steps executed. A program that never
    /// halts never returns; see [`run_limited`](Self::run_limited).
    pub fn run(&mut self) -> Result<u64, CpuError> {
        self.ensure_loaded()?;
        let start = self.cycles;

        while self.flags.s {
            self.micro_step()?;
        }

        Ok(self.cycles - start)
    }

    /// Run for at most `max_steps` micro-steps.
    pub fn run_limited(&mut self, max_steps: u64) -> Result<u64, CpuError> {
        self.ensure_loaded()?;
        let start = self.cycles;
        let limit = self.cycles + max_steps;

        while self.flags.s && self.cycles < limit {
            self.micro_step()?;
        }

        Ok(self.cycles - start)
    }

    fn ensure_loaded(&mut self) -> Result<(), CpuError> {
        if self.program.is_none() {
            self.sink.error(LogContext::System, CpuError::NotLoaded.to_string());
            return Err(CpuError::NotLoaded);
        }
        Ok(())
    }

    fn service_io(&mut self) {
        if self.regs.sc() != 0 {
            return;
        }

        if !self.flags.fgo {
            let byte = self.regs.outr() as u8;
            self.output.push(byte);
            self.flags.fgo = true;
            self.sink.info(
                LogContext::ExecuteIo,
                format!("OUTPUT <- OUTR = {:02X}, FGO <- 1", byte),
            );
        }

        if !self.flags.fgi {
            if let Some(byte) = self.input.pop_front() {
                self.regs.set_inpr(byte as u32);
                let merged = (self.regs.ac() & 0xFF00) | self.regs.inpr();
                self.regs.set_ac(merged as u32);
                self.flags.fgi = true;
                self.sink.info(
                    LogContext::ExecuteIo,
                    format!("INPR <- INPUT = {:02X}, AC = {:04X}, FGI <- 1", byte, merged),
                );
            }
        }
    }

    // ==================== Fetch ====================

    fn t0(&mut self) {
        self.regs.set_ar(self.regs.pc() as u32);
        self.regs.set_sc(1);
        self.sink.info(LogContext::Fetch, format!("AR <- PC = {:03X}", self.regs.ar()));
    }

    fn t1(&mut self) {
        self.regs.set_ir(self.mem.read(self.regs.ar()) as u32);
        self.regs.advance_pc();
        self.regs.set_sc(2);
        self.sink.info(LogContext::Fetch, format!("IR <- M[AR] = {:04X}", self.regs.ir()));
        self.sink.info(LogContext::Fetch, format!("PC <- PC + 1 = {:03X}", self.regs.pc()));
    }

    // ==================== Decode ====================

    fn t2(&mut self) {
        let fields = Fields::of(self.regs.ir());
        self.regs.set_ar(fields.address as u32);
        self.regs.set_sc(3);
        self.sink.info(LogContext::Decode, "D0-D7 <- IR(12-14)");
        self.sink.info(LogContext::Decode, format!("AR <- IR(0-11) = {:03X}", fields.address));
        self.sink.info(LogContext::Decode, format!("I <- IR(15) = {}", fields.indirect as u8));
    }

    // ==================== Execute ====================

    fn t3(&mut self) {
        match decode(self.regs.ir()) {
            Operation::Memory { indirect, .. } => {
                if indirect {
                    self.regs.set_ar(self.mem.read(self.regs.ar()) as u32);
                    self.sink.info(
                        LogContext::ExecuteMri,
                        format!("AR <- M[AR] = {:03X}", self.regs.ar()),
                    );
                } else {
                    self.sink.info(LogContext::ExecuteMri, "No Indirection");
                }
                self.regs.set_sc(4);
                return;
            }
            Operation::Register(op) => self.execute_register(op),
            Operation::Io(op) => self.execute_io(op),
            Operation::Unknown(word) => {
                self.sink.warn(
                    LogContext::ExecuteNmri,
                    format!("Unknown instruction {:04X}, ignored", word),
                );
            }
        }
        self.regs.set_sc(0);
    }

    fn execute_register(&mut self, op: RegisterOp) {
        let ac = self.regs.ac();
        let message = match op {
            RegisterOp::Cla => {
                self.regs.set_ac(0);
                "CLA: AC <- 0".to_string()
            }
            RegisterOp::Cle => {
                self.flags.e = false;
                "CLE: E <- 0".to_string()
            }
            RegisterOp::Cma => {
                self.regs.set_ac(!ac as u32);
                "CMA: AC <- ~AC".to_string()
            }
            RegisterOp::Cme => {
                self.flags.e = !self.flags.e;
                "CME: E <- ~E".to_string()
            }
            RegisterOp::Cir => {
                let lsb = ac & 0x1 != 0;
                self.regs.set_ac(((ac >> 1) | ((self.flags.e as u16) << 15)) as u32);
                self.flags.e = lsb;
                format!("CIR: AC <- {:04X}, E <- {}", self.regs.ac(), lsb as u8)
            }
            RegisterOp::Cil => {
                let msb = ac & 0x8000 != 0;
                self.regs.set_ac(((ac as u32) << 1) | self.flags.e as u32);
                self.flags.e = msb;
                format!("CIL: AC <- {:04X}, E <- {}", self.regs.ac(), msb as u8)
            }
            RegisterOp::Inc => {
                self.regs.set_ac(ac as u32 + 1);
                format!("INC: AC <- AC + 1 = {:04X}", self.regs.ac())
            }
            RegisterOp::Spa => self.skip_if(ac & 0x8000 == 0, "SPA", "AC(15) = 0", "AC(15) = 1"),
            RegisterOp::Sna => self.skip_if(ac & 0x8000 != 0, "SNA", "AC(15) = 1", "AC(15) = 0"),
            RegisterOp::Sza => self.skip_if(ac == 0, "SZA", "AC = 0", "AC != 0"),
            RegisterOp::Sze => self.skip_if(!self.flags.e, "SZE", "E = 0", "E != 0"),
            RegisterOp::Hlt => {
                self.flags.s = false;
                "HLT: S <- 0".to_string()
            }
        };
        self.sink.info(LogContext::ExecuteNmri, message);
    }

    fn execute_io(&mut self, op: IoOp) {
        let message = match op {
            IoOp::Inp => {
                let merged = (self.regs.ac() & 0xFF00) | self.regs.inpr();
                self.regs.set_ac(merged as u32);
                self.flags.fgi = false;
                format!(
                    "INP: AC(0-7) <- INPR = {:02X}, AC = {:04X}, FGI <- 0",
                    self.regs.inpr(),
                    merged
                )
            }
            IoOp::Out => {
                self.regs.set_outr(self.regs.ac() as u32);
                self.flags.fgo = false;
                format!("OUT: OUTR <- AC(0-7) = {:02X}, FGO <- 0", self.regs.outr())
            }
            IoOp::Ski => self.skip_if(self.flags.fgi, "SKI", "FGI = 1", "FGI = 0"),
            IoOp::Sko => self.skip_if(self.flags.fgo, "SKO", "FGO = 1", "FGO = 0"),
            IoOp::Ion => {
                self.flags.ien = true;
                "ION: IEN <- 1".to_string()
            }
            IoOp::Iof => {
                self.flags.ien = false;
                "IOF: IEN <- 0".to_string()
            }
        };
        self.sink.info(LogContext::ExecuteIo, message);
    }

    fn skip_if(&mut self, condition: bool, name: &str, taken: &str, not_taken: &str) -> String {
        if condition {
            self.regs.advance_pc();
            format!("{}: {}, so PC <- PC + 1 = {:03X}", name, taken, self.regs.pc())
        } else {
            format!("{}: {}, no action", name, not_taken)
        }
    }

    /// The MRI in IR. Only T4-T6 ask, and T3 only advances to T4 for one.
    fn memory_op(&mut self) -> Option<MemoryOp> {
        let op = MemoryOp::from_opcode(Fields::of(self.regs.ir()).opcode);
        if op.is_none() {
            self.sink.warn(
                LogContext::ExecuteMri,
                format!("IR = {:04X} is not a memory-reference instruction, SC <- 0", self.regs.ir()),
            );
            self.regs.set_sc(0);
        }
        op
    }

    fn t4(&mut self) {
        let Some(op) = self.memory_op() else { return };
        let ar = self.regs.ar();

        match op {
            MemoryOp::And | MemoryOp::Add | MemoryOp::Lda | MemoryOp::Isz => {
                self.regs.set_dr(self.mem.read(ar) as u32);
                self.sink.info(LogContext::ExecuteMri, format!("DR <- M[AR] = {:04X}", self.regs.dr()));
                self.regs.set_sc(5);
            }
            MemoryOp::Sta => {
                self.mem.write(ar, self.regs.ac());
                self.regs.set_sc(0);
                self.sink.info(
                    LogContext::ExecuteMri,
                    format!("STA: M[AR] <- AC = {:04X}, SC <- 0", self.regs.ac()),
                );
            }
            MemoryOp::Bun => {
                self.regs.set_pc(ar as u32);
                self.regs.set_sc(0);
                self.sink.info(
                    LogContext::ExecuteMri,
                    format!("BUN: PC <- AR = {:03X}, SC <- 0", self.regs.pc()),
                );
            }
            MemoryOp::Bsa => {
                self.mem.write(ar, self.regs.pc());
                self.regs.set_ar(ar as u32 + 1);
                self.regs.set_sc(5);
                self.sink.info(
                    LogContext::ExecuteMri,
                    format!("BSA: M[AR] <- PC = {:03X}, AR <- AR + 1 = {:03X}", self.regs.pc(), self.regs.ar()),
                );
            }
        }
    }

    fn t5(&mut self) {
        let Some(op) = self.memory_op() else { return };
        let (ac, dr) = (self.regs.ac(), self.regs.dr());

        match op {
            MemoryOp::And => {
                self.regs.set_ac((ac & dr) as u32);
                self.sink.info(
                    LogContext::ExecuteMri,
                    format!("AND: AC <- AC & DR = {:04X}", self.regs.ac()),
                );
                self.regs.set_sc(0);
            }
            MemoryOp::Add => {
                let sum = ac as u32 + dr as u32;
                self.regs.set_ac(sum);
                self.flags.e = sum > 0xFFFF;
                self.sink.info(
                    LogContext::ExecuteMri,
                    format!("ADD: AC <- AC + DR = {:04X}, E <- {}", self.regs.ac(), self.flags.e as u8),
                );
                self.regs.set_sc(0);
            }
            MemoryOp::Lda => {
                self.regs.set_ac(dr as u32);
                self.regs.set_sc(0);
                self.sink.info(LogContext::ExecuteMri, format!("LDA: AC <- DR = {:04X}", self.regs.ac()));
            }
            MemoryOp::Bsa => {
                self.regs.set_pc(self.regs.ar() as u32);
                self.regs.set_sc(0);
                self.sink.info(
                    LogContext::ExecuteMri,
                    format!("BSA: PC <- AR = {:03X}, SC <- 0", self.regs.pc()),
                );
            }
            MemoryOp::Isz => {
                self.regs.set_dr(dr as u32 + 1);
                self.regs.set_sc(6);
                self.sink.info(LogContext::ExecuteMri, format!("ISZ: DR <- DR + 1 = {:04X}", self.regs.dr()));
            }
            MemoryOp::Sta | MemoryOp::Bun => {
                self.sink.warn(LogContext::ExecuteMri, format!("{} has no T5, SC <- 0", op.mnemonic()));
                self.regs.set_sc(0);
            }
        }
    }

    fn t6(&mut self) {
        let dr = self.regs.dr();
        self.mem.write(self.regs.ar(), dr);
        self.sink.info(LogContext::ExecuteMri, format!("M[AR] <- DR = {:04X}", dr));

        if dr == 0 {
            self.regs.advance_pc();
            self.sink.info(
                LogContext::ExecuteMri,
                format!("ISZ: DR = 0, so PC <- PC + 1 = {:03X}", self.regs.pc()),
            );
        } else {
            self.sink.info(LogContext::ExecuteMri, "ISZ: DR != 0, no action");
        }
        self.regs.set_sc(0);
    }

    // ==================== Inspection ====================

    /// A detached copy of the whole machine state.
    pub fn snapshot(&self) -> SnapShot {
        SnapShot::capture(&self.regs, &self.flags, &self.mem, &self.input, &self.output)
    }

    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    /// Direct register access, for front-ends that poke state.
    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    pub fn flags(&self) -> &Flags {
        &self.flags
    }

    pub fn flags_mut(&mut self) -> &mut Flags {
        &mut self.flags
    }

    pub fn memory(&self) -> &Memory {
        &self.mem
    }

    pub fn program(&self) -> Option<&Program> {
        self.program.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.program.is_some()
    }

    pub fn is_halted(&self) -> bool {
        !self.flags.s
    }

    /// The T-state the next micro-step will execute.
    pub fn t_state(&self) -> Option<TState> {
        TState::from_sc(self.regs.sc())
    }

    /// Micro-steps executed since the last reset.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Instructions completed since the last reset.
    pub fn instructions(&self) -> u64 {
        self.instructions
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

impl<S: EventSink> std::fmt::Debug for Simulator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("loaded", &self.is_loaded())
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .field("flags", &self.flags)
            .finish()
    }
}

/// Errors that can occur while loading or stepping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("cannot load a program with no instructions")]
    EmptyProgram,

    #[error("no program loaded")]
    NotLoaded,

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),
}
