// CPU module - cycle-accurate 6502 implementation
//
// The CPU is a micro-sequence interpreter: each call to `step` advances
// exactly one sub-cycle and performs at most one bus transaction. An opcode
// decodes to an addressing-mode entry state; `state += 1` walks the mode's
// dummy reads, pointer fetches and penalty cycles exactly as the hardware
// issues them, ending in a READ, MODIFY or WRITE completion state.
//
// Interrupts are sampled into edge/level detectors by `step_phase2` once
// per machine step and polled only at instruction end and during branch
// sub-cycles. The stall counter (OAM/DMC DMA) suppresses memory sub-cycles
// only; write sub-cycles proceed.

pub mod execute;
pub mod opcodes;

use serde::{Deserialize, Serialize};

use crate::bus;
use crate::debug::trace;
use crate::machine::Machine;
use opcodes::state::*;
use opcodes::{Instruction, Operation, INSTRUCTION_TABLE};

/// Interrupt Vector Addresses
pub mod vectors {
    /// NMI vector ($FFFA-$FFFB)
    pub const NMI: u16 = 0xFFFA;

    /// RESET vector ($FFFC-$FFFD)
    pub const RESET: u16 = 0xFFFC;

    /// IRQ/BRK vector ($FFFE-$FFFF)
    pub const IRQ: u16 = 0xFFFE;
}

/// Hardware interrupt pending service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interrupt {
    None,
    Nmi,
    Irq,
}

/// CPU state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// Executed CPU cycles
    pub cycle: u64,
    /// Remaining DMA stall cycles
    pub stall: u64,

    /// IRQ line level, sampled each machine step
    pub irq_line: bool,
    /// NMI line level, sampled each machine step
    pub nmi_line: bool,
    /// NMI level seen on the previous sample
    pub previous_nmi: bool,
    /// NMI edge detector output
    pub internal_nmi: bool,
    /// IRQ level detector output
    pub internal_irq: bool,
    /// Interrupt scheduled for service
    pub interrupt: Interrupt,

    /// Decoded instruction
    pub instruction: Instruction,
    /// Micro-sequence state
    pub state: u8,
    /// PC of the current instruction (for tracing)
    pub instruction_pc: u16,
    /// Fetched immediate/operand bytes
    pub immediate: u16,
    /// Fetched indirect pointer
    pub indirect: u16,
    /// Resolved effective address
    pub address: u16,
    /// Operand latch
    pub operand: u8,

    /// Program counter
    pub pc: u16,
    /// Stack pointer (stack lives at $0100 | SP)
    pub sp: u8,
    /// Accumulator
    pub a: u8,
    /// Index register X
    pub x: u8,
    /// Index register Y
    pub y: u8,

    /// Carry flag
    pub flag_c: bool,
    /// Zero flag
    pub flag_z: bool,
    /// Interrupt disable flag
    pub flag_i: bool,
    /// Decimal flag (storable, no arithmetic effect)
    pub flag_d: bool,
    /// Break flag
    pub flag_b: bool,
    /// Overflow flag
    pub flag_v: bool,
    /// Negative flag
    pub flag_n: bool,

    /// A KIL opcode jammed the fetch unit
    pub halted: bool,
}

impl Cpu {
    /// Create a CPU parked at the start of the reset micro-sequence
    pub fn new() -> Self {
        Cpu {
            cycle: 0,
            stall: 0,
            irq_line: false,
            nmi_line: false,
            previous_nmi: false,
            internal_nmi: false,
            internal_irq: false,
            interrupt: Interrupt::None,
            instruction: INSTRUCTION_TABLE[0xEA],
            state: RESET,
            instruction_pc: 0,
            immediate: 0,
            indirect: 0,
            address: 0,
            operand: 0,
            pc: 0,
            sp: 0,
            a: 0,
            x: 0,
            y: 0,
            flag_c: false,
            flag_z: false,
            flag_i: false,
            flag_d: false,
            flag_b: false,
            flag_v: false,
            flag_n: false,
            halted: false,
        }
    }

    /// Processor status byte as PHP would push it
    pub fn status_byte(&self) -> u8 {
        0x20 | u8::from(self.flag_n) << 7
            | u8::from(self.flag_v) << 6
            | u8::from(self.flag_b) << 4
            | u8::from(self.flag_d) << 3
            | u8::from(self.flag_i) << 2
            | u8::from(self.flag_z) << 1
            | u8::from(self.flag_c)
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

fn same_page(a: u16, b: u16) -> bool {
    a & 0xFF00 == b & 0xFF00
}

/// Consume one stall cycle if the stall counter is armed
fn stalled(m: &mut Machine) -> bool {
    if m.cpu.stall > 0 {
        m.cpu.stall -= 1;
        true
    } else {
        false
    }
}

/// Advance the CPU by one sub-cycle
pub(crate) fn step(m: &mut Machine) {
    if m.cpu.halted {
        m.cpu.cycle += 1;
        return;
    }

    // CLI, SEI and PLP change the interrupt flag after the hardware polls
    // for interrupts; the poll below looks at this saved value for them.
    let previous_i = m.cpu.flag_i;

    let st = m.cpu.state;

    'cycle: {
        match (st & !7, st & 7) {
            // --- Reset ------------------------------------------------------
            // The reset sequence ignores the stall counter.

            (RESET, 0 | 1) => {
                let pc = m.cpu.pc;
                bus::read(m, pc);
                m.cpu.state += 1;
            }
            (RESET, 2..=4) => {
                let sp = m.cpu.sp;
                bus::read(m, 0x0100 | u16::from(sp));
                m.cpu.sp = sp.wrapping_sub(1);
                m.cpu.state += 1;
            }
            (RESET, 5) => {
                m.cpu.pc = u16::from(bus::read(m, vectors::RESET));
                m.cpu.flag_b = true;
                m.cpu.flag_i = true;
                m.cpu.state += 1;
            }
            (RESET, _) => {
                m.cpu.pc |= u16::from(bus::read(m, vectors::RESET + 1)) << 8;
                m.cpu.state = FETCH;
            }

            // --- Fetch ------------------------------------------------------

            (FETCH, _) | (FETCH_NO_POLL, _) => {
                if stalled(m) {
                    break 'cycle;
                }
                if m.cpu.interrupt != Interrupt::None {
                    let pc = m.cpu.pc;
                    bus::read(m, pc);
                    m.cpu.state = INTERRUPT_JUMP;
                } else {
                    m.cpu.instruction_pc = m.cpu.pc;
                    let pc = m.cpu.pc;
                    let opcode = bus::read(m, pc);
                    m.cpu.pc = pc.wrapping_add(1);
                    m.cpu.instruction = INSTRUCTION_TABLE[usize::from(opcode)];
                    m.cpu.state = m.cpu.instruction.initial_state;
                }
            }

            // --- Interrupt Jump (NMI, IRQ and BRK) --------------------------

            (INTERRUPT_JUMP, 0) => {
                if stalled(m) {
                    break 'cycle;
                }
                let pc = m.cpu.pc;
                bus::read(m, pc);
                if m.cpu.instruction.operation == Operation::Brk {
                    m.cpu.pc = pc.wrapping_add(1);
                }
                m.cpu.state += 1;
            }
            (INTERRUPT_JUMP, 1) => {
                let sp = m.cpu.sp;
                let pch = (m.cpu.pc >> 8) as u8;
                bus::write(m, 0x0100 | u16::from(sp), pch);
                m.cpu.sp = sp.wrapping_sub(1);
                m.cpu.state += 1;
            }
            (INTERRUPT_JUMP, 2) => {
                let sp = m.cpu.sp;
                let pcl = m.cpu.pc as u8;
                bus::write(m, 0x0100 | u16::from(sp), pcl);
                m.cpu.sp = sp.wrapping_sub(1);
                m.cpu.state += 1;
            }
            (INTERRUPT_JUMP, 3) => {
                match m.cpu.interrupt {
                    Interrupt::Nmi => {
                        m.cpu.address = vectors::NMI;
                        m.cpu.flag_b = false;
                        execute::operate(&mut m.cpu, Operation::Php);
                        m.cpu.flag_b = true;
                        m.cpu.flag_i = true;
                    }
                    Interrupt::Irq => {
                        // A pending NMI hijacks the vector of an IRQ that is
                        // already being serviced.
                        m.cpu.address = if m.cpu.internal_nmi {
                            vectors::NMI
                        } else {
                            vectors::IRQ
                        };
                        m.cpu.flag_b = false;
                        execute::operate(&mut m.cpu, Operation::Php);
                        m.cpu.flag_i = true;
                        m.cpu.flag_b = true;
                    }
                    Interrupt::None => {
                        // BRK, subject to the same NMI hijacking.
                        m.cpu.address = if m.cpu.internal_nmi {
                            vectors::NMI
                        } else {
                            vectors::IRQ
                        };
                        m.cpu.flag_b = true;
                        execute::operate(&mut m.cpu, Operation::Php);
                        m.cpu.flag_i = true;
                    }
                }
                trace::emit(m);
                let sp = m.cpu.sp;
                let status = m.cpu.operand;
                bus::write(m, 0x0100 | u16::from(sp), status);
                m.cpu.sp = sp.wrapping_sub(1);
                m.cpu.interrupt = Interrupt::None;
                m.cpu.internal_nmi = false;
                m.cpu.state += 1;
            }
            (INTERRUPT_JUMP, 4) => {
                if stalled(m) {
                    break 'cycle;
                }
                let addr = m.cpu.address;
                m.cpu.pc = u16::from(bus::read(m, addr));
                m.cpu.state += 1;
            }
            (INTERRUPT_JUMP, _) => {
                if stalled(m) {
                    break 'cycle;
                }
                let addr = m.cpu.address;
                m.cpu.pc |= u16::from(bus::read(m, addr.wrapping_add(1))) << 8;
                // An interrupt sequence does not poll the detectors at its
                // own end.
                m.cpu.state = FETCH_NO_POLL;
            }

            // --- Return from Interrupt --------------------------------------

            (INTERRUPT_RETURN, 0) => {
                if stalled(m) {
                    break 'cycle;
                }
                let pc = m.cpu.pc;
                bus::read(m, pc);
                m.cpu.state += 1;
            }
            (INTERRUPT_RETURN, 1) => {
                if stalled(m) {
                    break 'cycle;
                }
                let sp = m.cpu.sp;
                bus::read(m, 0x0100 | u16::from(sp));
                m.cpu.sp = sp.wrapping_add(1);
                m.cpu.state += 1;
            }
            (INTERRUPT_RETURN, 2) => {
                if stalled(m) {
                    break 'cycle;
                }
                let sp = m.cpu.sp;
                m.cpu.operand = bus::read(m, 0x0100 | u16::from(sp));
                m.cpu.sp = sp.wrapping_add(1);
                execute::operate(&mut m.cpu, Operation::Plp);
                m.cpu.state += 1;
            }
            (INTERRUPT_RETURN, 3) => {
                if stalled(m) {
                    break 'cycle;
                }
                let sp = m.cpu.sp;
                m.cpu.pc = u16::from(bus::read(m, 0x0100 | u16::from(sp)));
                m.cpu.sp = sp.wrapping_add(1);
                m.cpu.state += 1;
            }
            (INTERRUPT_RETURN, _) => {
                if stalled(m) {
                    break 'cycle;
                }
                let sp = m.cpu.sp;
                m.cpu.pc |= u16::from(bus::read(m, 0x0100 | u16::from(sp))) << 8;
                trace::emit(m);
                m.cpu.state = FETCH;
            }

            // --- Jump to Subroutine -----------------------------------------

            (SUBROUTINE_JUMP, 0) => {
                if stalled(m) {
                    break 'cycle;
                }
                let pc = m.cpu.pc;
                m.cpu.immediate = u16::from(bus::read(m, pc));
                m.cpu.pc = pc.wrapping_add(1);
                m.cpu.state += 1;
            }
            (SUBROUTINE_JUMP, 1) => {
                if stalled(m) {
                    break 'cycle;
                }
                let sp = m.cpu.sp;
                bus::read(m, 0x0100 | u16::from(sp));
                m.cpu.state += 1;
            }
            (SUBROUTINE_JUMP, 2) => {
                let sp = m.cpu.sp;
                let pch = (m.cpu.pc >> 8) as u8;
                bus::write(m, 0x0100 | u16::from(sp), pch);
                m.cpu.sp = sp.wrapping_sub(1);
                m.cpu.state += 1;
            }
            (SUBROUTINE_JUMP, 3) => {
                let sp = m.cpu.sp;
                let pcl = m.cpu.pc as u8;
                bus::write(m, 0x0100 | u16::from(sp), pcl);
                m.cpu.sp = sp.wrapping_sub(1);
                m.cpu.state += 1;
            }
            (SUBROUTINE_JUMP, _) => {
                if stalled(m) {
                    break 'cycle;
                }
                let pc = m.cpu.pc;
                m.cpu.immediate |= u16::from(bus::read(m, pc)) << 8;
                m.cpu.pc = m.cpu.immediate;
                trace::emit(m);
                m.cpu.state = FETCH;
            }

            // --- Return from Subroutine -------------------------------------

            (SUBROUTINE_RETURN, 0) => {
                if stalled(m) {
                    break 'cycle;
                }
                let pc = m.cpu.pc;
                bus::read(m, pc);
                m.cpu.state += 1;
            }
            (SUBROUTINE_RETURN, 1) => {
                if stalled(m) {
                    break 'cycle;
                }
                let sp = m.cpu.sp;
                bus::read(m, 0x0100 | u16::from(sp));
                m.cpu.sp = sp.wrapping_add(1);
                m.cpu.state += 1;
            }
            (SUBROUTINE_RETURN, 2) => {
                if stalled(m) {
                    break 'cycle;
                }
                let sp = m.cpu.sp;
                m.cpu.pc = u16::from(bus::read(m, 0x0100 | u16::from(sp)));
                m.cpu.sp = sp.wrapping_add(1);
                m.cpu.state += 1;
            }
            (SUBROUTINE_RETURN, 3) => {
                if stalled(m) {
                    break 'cycle;
                }
                let sp = m.cpu.sp;
                m.cpu.pc |= u16::from(bus::read(m, 0x0100 | u16::from(sp))) << 8;
                m.cpu.state += 1;
            }
            (SUBROUTINE_RETURN, _) => {
                if stalled(m) {
                    break 'cycle;
                }
                let pc = m.cpu.pc;
                bus::read(m, pc);
                m.cpu.pc = pc.wrapping_add(1);
                trace::emit(m);
                m.cpu.state = FETCH;
            }

            // --- Stack Push -------------------------------------------------

            (STACK_PUSH, 0) => {
                if stalled(m) {
                    break 'cycle;
                }
                let pc = m.cpu.pc;
                bus::read(m, pc);
                m.cpu.state += 1;
            }
            (STACK_PUSH, _) => {
                let operation = m.cpu.instruction.operation;
                execute::operate(&mut m.cpu, operation);
                let sp = m.cpu.sp;
                let operand = m.cpu.operand;
                bus::write(m, 0x0100 | u16::from(sp), operand);
                m.cpu.sp = sp.wrapping_sub(1);
                trace::emit(m);
                m.cpu.state = FETCH;
            }

            // --- Stack Pull -------------------------------------------------

            (STACK_PULL, 0) => {
                if stalled(m) {
                    break 'cycle;
                }
                let pc = m.cpu.pc;
                bus::read(m, pc);
                m.cpu.state += 1;
            }
            (STACK_PULL, 1) => {
                if stalled(m) {
                    break 'cycle;
                }
                let sp = m.cpu.sp;
                bus::read(m, 0x0100 | u16::from(sp));
                m.cpu.sp = sp.wrapping_add(1);
                m.cpu.state += 1;
            }
            (STACK_PULL, _) => {
                if stalled(m) {
                    break 'cycle;
                }
                let sp = m.cpu.sp;
                m.cpu.operand = bus::read(m, 0x0100 | u16::from(sp));
                let operation = m.cpu.instruction.operation;
                execute::operate(&mut m.cpu, operation);
                trace::emit(m);
                m.cpu.state = FETCH;
            }

            // --- Implied ----------------------------------------------------

            (IMPLIED, _) => {
                if stalled(m) {
                    break 'cycle;
                }
                let pc = m.cpu.pc;
                bus::read(m, pc);
                let operation = m.cpu.instruction.operation;
                execute::operate(&mut m.cpu, operation);
                trace::emit(m);
                m.cpu.state = FETCH;
            }

            // --- Accumulator ------------------------------------------------

            (ACCUMULATOR, _) => {
                if stalled(m) {
                    break 'cycle;
                }
                let pc = m.cpu.pc;
                bus::read(m, pc);
                m.cpu.operand = m.cpu.a;
                let operation = m.cpu.instruction.operation;
                execute::operate(&mut m.cpu, operation);
                trace::emit(m);
                m.cpu.a = m.cpu.operand;
                m.cpu.state = FETCH;
            }

            // --- Immediate --------------------------------------------------

            (IMMEDIATE, _) => {
                if stalled(m) {
                    break 'cycle;
                }
                let pc = m.cpu.pc;
                let value = bus::read(m, pc);
                m.cpu.pc = pc.wrapping_add(1);
                m.cpu.immediate = u16::from(value);
                m.cpu.operand = value;
                let operation = m.cpu.instruction.operation;
                execute::operate(&mut m.cpu, operation);
                trace::emit(m);
                m.cpu.state = FETCH;
            }

            // --- Branch -----------------------------------------------------

            (BRANCH, 0) => {
                if stalled(m) {
                    break 'cycle;
                }
                let pc = m.cpu.pc;
                let offset = bus::read(m, pc);
                m.cpu.pc = pc.wrapping_add(1);
                m.cpu.immediate = u16::from(offset);
                // Branch target with sign extension.
                let mut target = m.cpu.pc.wrapping_add(u16::from(offset));
                if offset & 0x80 != 0 {
                    target = target.wrapping_sub(0x100);
                }
                m.cpu.address = target;
                m.cpu.state += 1;
                // A branch that is not taken is already done.
                let not_taken = match m.cpu.instruction.operation {
                    Operation::Bcc => m.cpu.flag_c,
                    Operation::Bcs => !m.cpu.flag_c,
                    Operation::Bne => m.cpu.flag_z,
                    Operation::Beq => !m.cpu.flag_z,
                    Operation::Bpl => m.cpu.flag_n,
                    Operation::Bmi => !m.cpu.flag_n,
                    Operation::Bvc => m.cpu.flag_v,
                    _ => !m.cpu.flag_v,
                };
                if not_taken {
                    m.cpu.state = FETCH;
                    trace::emit(m);
                }
            }
            (BRANCH, 1) => {
                if stalled(m) {
                    break 'cycle;
                }
                // Dummy read of the next opcode.
                let pc = m.cpu.pc;
                bus::read(m, pc);
                m.cpu.state += 1;
                if same_page(m.cpu.address, m.cpu.pc) {
                    m.cpu.pc = m.cpu.address;
                    trace::emit(m);
                    m.cpu.state = FETCH_NO_POLL;
                }
            }
            (BRANCH, _) => {
                if stalled(m) {
                    break 'cycle;
                }
                // Dummy read using the stale PC high byte.
                let addr = (m.cpu.pc & 0xFF00) | (m.cpu.address & 0x00FF);
                bus::read(m, addr);
                m.cpu.pc = m.cpu.address;
                trace::emit(m);
                m.cpu.state = FETCH;
            }

            // --- Absolute Jump ----------------------------------------------

            (ABSOLUTE_JUMP, 0) => {
                if stalled(m) {
                    break 'cycle;
                }
                let pc = m.cpu.pc;
                m.cpu.immediate = u16::from(bus::read(m, pc));
                m.cpu.pc = pc.wrapping_add(1);
                m.cpu.state += 1;
            }
            (ABSOLUTE_JUMP, _) => {
                if stalled(m) {
                    break 'cycle;
                }
                let pc = m.cpu.pc;
                m.cpu.immediate |= u16::from(bus::read(m, pc)) << 8;
                m.cpu.pc = m.cpu.immediate;
                trace::emit(m);
                m.cpu.state = FETCH;
            }

            // --- Indirect Jump ----------------------------------------------

            (INDIRECT_JUMP, 0) => {
                if stalled(m) {
                    break 'cycle;
                }
                let pc = m.cpu.pc;
                m.cpu.immediate = u16::from(bus::read(m, pc));
                m.cpu.pc = pc.wrapping_add(1);
                m.cpu.state += 1;
            }
            (INDIRECT_JUMP, 1) => {
                if stalled(m) {
                    break 'cycle;
                }
                let pc = m.cpu.pc;
                m.cpu.immediate |= u16::from(bus::read(m, pc)) << 8;
                m.cpu.pc = pc.wrapping_add(1);
                m.cpu.state += 1;
            }
            (INDIRECT_JUMP, 2) => {
                if stalled(m) {
                    break 'cycle;
                }
                let pointer = m.cpu.immediate;
                m.cpu.address = u16::from(bus::read(m, pointer));
                m.cpu.state += 1;
            }
            (INDIRECT_JUMP, _) => {
                if stalled(m) {
                    break 'cycle;
                }
                // The pointer high byte never carries into the next page.
                let pointer = m.cpu.immediate;
                let high_addr = (pointer & 0xFF00) | (pointer.wrapping_add(1) & 0x00FF);
                m.cpu.address |= u16::from(bus::read(m, high_addr)) << 8;
                m.cpu.pc = m.cpu.address;
                trace::emit(m);
                m.cpu.state = FETCH;
            }

            // --- Zero Page --------------------------------------------------

            (ZERO_PAGE, _) => {
                if stalled(m) {
                    break 'cycle;
                }
                let pc = m.cpu.pc;
                m.cpu.immediate = u16::from(bus::read(m, pc));
                m.cpu.pc = pc.wrapping_add(1);
                m.cpu.address = m.cpu.immediate;
                m.cpu.state = m.cpu.instruction.memory_state;
            }

            // --- Zero Page Indexed X ----------------------------------------

            (ZERO_PAGE_X, 0) => {
                if stalled(m) {
                    break 'cycle;
                }
                let pc = m.cpu.pc;
                m.cpu.immediate = u16::from(bus::read(m, pc));
                m.cpu.pc = pc.wrapping_add(1);
                m.cpu.state += 1;
            }
            (ZERO_PAGE_X, _) => {
                if stalled(m) {
                    break 'cycle;
                }
                let base = m.cpu.immediate;
                bus::read(m, base);
                m.cpu.address = base.wrapping_add(u16::from(m.cpu.x)) & 0xFF;
                m.cpu.state = m.cpu.instruction.memory_state;
            }

            // --- Zero Page Indexed Y ----------------------------------------

            (ZERO_PAGE_Y, 0) => {
                if stalled(m) {
                    break 'cycle;
                }
                let pc = m.cpu.pc;
                m.cpu.immediate = u16::from(bus::read(m, pc));
                m.cpu.pc = pc.wrapping_add(1);
                m.cpu.state += 1;
            }
            (ZERO_PAGE_Y, _) => {
                if stalled(m) {
                    break 'cycle;
                }
                let base = m.cpu.immediate;
                bus::read(m, base);
                m.cpu.address = base.wrapping_add(u16::from(m.cpu.y)) & 0xFF;
                m.cpu.state = m.cpu.instruction.memory_state;
            }

            // --- Absolute ---------------------------------------------------

            (ABSOLUTE, 0) => {
                if stalled(m) {
                    break 'cycle;
                }
                let pc = m.cpu.pc;
                m.cpu.immediate = u16::from(bus::read(m, pc));
                m.cpu.pc = pc.wrapping_add(1);
                m.cpu.state += 1;
            }
            (ABSOLUTE, _) => {
                if stalled(m) {
                    break 'cycle;
                }
                let pc = m.cpu.pc;
                m.cpu.immediate |= u16::from(bus::read(m, pc)) << 8;
                m.cpu.pc = pc.wrapping_add(1);
                m.cpu.address = m.cpu.immediate;
                m.cpu.state = m.cpu.instruction.memory_state;
            }

            // --- Absolute Indexed X -----------------------------------------

            (ABSOLUTE_X, 0) => {
                if stalled(m) {
                    break 'cycle;
                }
                let pc = m.cpu.pc;
                m.cpu.immediate = u16::from(bus::read(m, pc));
                m.cpu.pc = pc.wrapping_add(1);
                m.cpu.state += 1;
            }
            (ABSOLUTE_X, 1) => {
                if stalled(m) {
                    break 'cycle;
                }
                let pc = m.cpu.pc;
                m.cpu.immediate |= u16::from(bus::read(m, pc)) << 8;
                m.cpu.pc = pc.wrapping_add(1);
                m.cpu.address = m.cpu.immediate.wrapping_add(u16::from(m.cpu.x));
                m.cpu.state += 1;
                // Reads on the same page skip the fix-up cycle.
                if same_page(m.cpu.immediate, m.cpu.address)
                    && m.cpu.instruction.memory_state == READ
                {
                    m.cpu.state = READ;
                }
            }
            (ABSOLUTE_X, _) => {
                if stalled(m) {
                    break 'cycle;
                }
                let addr = (m.cpu.immediate & 0xFF00) | (m.cpu.address & 0x00FF);
                bus::read(m, addr);
                m.cpu.state = m.cpu.instruction.memory_state;
            }

            // --- Absolute Indexed Y -----------------------------------------

            (ABSOLUTE_Y, 0) => {
                if stalled(m) {
                    break 'cycle;
                }
                let pc = m.cpu.pc;
                m.cpu.immediate = u16::from(bus::read(m, pc));
                m.cpu.pc = pc.wrapping_add(1);
                m.cpu.state += 1;
            }
            (ABSOLUTE_Y, 1) => {
                if stalled(m) {
                    break 'cycle;
                }
                let pc = m.cpu.pc;
                m.cpu.immediate |= u16::from(bus::read(m, pc)) << 8;
                m.cpu.pc = pc.wrapping_add(1);
                m.cpu.address = m.cpu.immediate.wrapping_add(u16::from(m.cpu.y));
                m.cpu.state += 1;
                if same_page(m.cpu.immediate, m.cpu.address)
                    && m.cpu.instruction.memory_state == READ
                {
                    m.cpu.state = READ;
                }
            }
            (ABSOLUTE_Y, _) => {
                if stalled(m) {
                    break 'cycle;
                }
                let addr = (m.cpu.immediate & 0xFF00) | (m.cpu.address & 0x00FF);
                bus::read(m, addr);
                m.cpu.state = m.cpu.instruction.memory_state;
            }

            // --- Indexed Indirect ($zp,X) -----------------------------------

            (INDEXED_INDIRECT, 0) => {
                if stalled(m) {
                    break 'cycle;
                }
                let pc = m.cpu.pc;
                m.cpu.immediate = u16::from(bus::read(m, pc));
                m.cpu.pc = pc.wrapping_add(1);
                m.cpu.state += 1;
            }
            (INDEXED_INDIRECT, 1) => {
                if stalled(m) {
                    break 'cycle;
                }
                let base = m.cpu.immediate;
                bus::read(m, base);
                m.cpu.indirect = base.wrapping_add(u16::from(m.cpu.x)) & 0xFF;
                m.cpu.state += 1;
            }
            (INDEXED_INDIRECT, 2) => {
                if stalled(m) {
                    break 'cycle;
                }
                let pointer = m.cpu.indirect;
                m.cpu.address = u16::from(bus::read(m, pointer));
                m.cpu.state += 1;
            }
            (INDEXED_INDIRECT, _) => {
                if stalled(m) {
                    break 'cycle;
                }
                let pointer = m.cpu.indirect.wrapping_add(1) & 0xFF;
                m.cpu.address |= u16::from(bus::read(m, pointer)) << 8;
                m.cpu.state = m.cpu.instruction.memory_state;
            }

            // --- Indirect Indexed ($zp),Y -----------------------------------

            (INDIRECT_INDEXED, 0) => {
                if stalled(m) {
                    break 'cycle;
                }
                let pc = m.cpu.pc;
                m.cpu.immediate = u16::from(bus::read(m, pc));
                m.cpu.pc = pc.wrapping_add(1);
                m.cpu.state += 1;
            }
            (INDIRECT_INDEXED, 1) => {
                if stalled(m) {
                    break 'cycle;
                }
                let pointer = m.cpu.immediate;
                m.cpu.indirect = u16::from(bus::read(m, pointer));
                m.cpu.state += 1;
            }
            (INDIRECT_INDEXED, 2) => {
                if stalled(m) {
                    break 'cycle;
                }
                let pointer = m.cpu.immediate.wrapping_add(1) & 0xFF;
                m.cpu.indirect |= u16::from(bus::read(m, pointer)) << 8;
                m.cpu.address = m.cpu.indirect.wrapping_add(u16::from(m.cpu.y));
                m.cpu.state += 1;
                if same_page(m.cpu.indirect, m.cpu.address)
                    && m.cpu.instruction.memory_state == READ
                {
                    m.cpu.state = READ;
                }
            }
            (INDIRECT_INDEXED, _) => {
                if stalled(m) {
                    break 'cycle;
                }
                let addr = (m.cpu.indirect & 0xFF00) | (m.cpu.address & 0x00FF);
                bus::read(m, addr);
                m.cpu.state = m.cpu.instruction.memory_state;
            }

            // --- Read Operation ---------------------------------------------

            (READ, _) => {
                if stalled(m) {
                    break 'cycle;
                }
                let addr = m.cpu.address;
                m.cpu.operand = bus::read(m, addr);
                let operation = m.cpu.instruction.operation;
                execute::operate(&mut m.cpu, operation);
                trace::emit(m);
                m.cpu.state = FETCH;
            }

            // --- Read-Modify-Write Operation --------------------------------

            (MODIFY, 0) => {
                if stalled(m) {
                    break 'cycle;
                }
                let addr = m.cpu.address;
                m.cpu.operand = bus::read(m, addr);
                m.cpu.state += 1;
            }
            (MODIFY, 1) => {
                // Dummy write of the unmodified byte.
                let addr = m.cpu.address;
                let operand = m.cpu.operand;
                bus::write(m, addr, operand);
                let operation = m.cpu.instruction.operation;
                execute::operate(&mut m.cpu, operation);
                m.cpu.state += 1;
            }
            (MODIFY, _) => {
                let addr = m.cpu.address;
                let operand = m.cpu.operand;
                bus::write(m, addr, operand);
                trace::emit(m);
                m.cpu.state = FETCH;
            }

            // --- Write Operation --------------------------------------------

            (WRITE, _) => {
                let operation = m.cpu.instruction.operation;
                execute::operate(&mut m.cpu, operation);
                let addr = m.cpu.address;
                let operand = m.cpu.operand;
                bus::write(m, addr, operand);
                trace::emit(m);
                m.cpu.state = FETCH;
            }

            _ => {}
        }
    }

    poll_interrupts(m, previous_i);
    m.cpu.cycle += 1;
}

/// Poll the interrupt detectors at the states where hardware does
fn poll_interrupts(m: &mut Machine, previous_i: bool) {
    let cpu = &mut m.cpu;
    let st = cpu.state;

    // Polling happens at the end of an instruction, and before branch
    // cycles 0 (operand fetch), 1 (taken) and 2 (taken, page crossing).
    if st != FETCH && st != BRANCH && st != BRANCH + 1 && st != BRANCH + 2 {
        return;
    }

    if cpu.internal_nmi {
        cpu.interrupt = Interrupt::Nmi;
    } else if cpu.internal_irq {
        // CLI, SEI and PLP modify the interrupt flag after the poll.
        let effective_i = if matches!(
            cpu.instruction.operation,
            Operation::Cli | Operation::Sei | Operation::Plp
        ) {
            previous_i
        } else {
            cpu.flag_i
        };
        if !effective_i {
            cpu.interrupt = Interrupt::Irq;
        }
    }
}

/// Run the phase-2 edge/level detectors on the sampled interrupt lines
pub(crate) fn step_phase2(m: &mut Machine) {
    let cpu = &mut m.cpu;

    // NMI edge detector: a low-to-high transition arms the internal latch
    // that takes effect from the next cycle.
    if cpu.nmi_line && !cpu.previous_nmi {
        cpu.internal_nmi = true;
    }
    cpu.previous_nmi = cpu.nmi_line;

    // IRQ level detector.
    cpu.internal_irq = cpu.irq_line;
}
