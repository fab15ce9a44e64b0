// Instruction trace - one line per executed instruction or interrupt
//
// The trace is an observer only: it reads CPU state that the micro-sequence
// has already latched and never touches the buses, and write failures are
// swallowed so a full disk cannot perturb emulation.
//
// Line format:
//
// ```text
// C5F5  A2 00     LDX #$00                       A:00 X:00 Y:00 SP:FD
// ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::cpu::opcodes::state;
use crate::cpu::{Cpu, Interrupt};
use crate::machine::Machine;

/// Buffered text sink for trace lines
#[derive(Debug)]
pub struct TraceSink {
    writer: BufWriter<File>,
}

impl TraceSink {
    /// Create a trace sink writing to the given path
    pub fn create<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = File::create(path)?;
        Ok(TraceSink {
            writer: BufWriter::new(file),
        })
    }

    /// Write one line, ignoring I/O errors
    fn write_line(&mut self, line: &str) {
        let _ = writeln!(self.writer, "{}", line);
        let _ = self.writer.flush();
    }
}

/// Emit a trace line for the instruction the CPU just finished latching
pub(crate) fn emit(m: &mut Machine) {
    if m.trace.is_none() {
        return;
    }
    let line = format_line(&m.cpu);
    if let Some(sink) = &mut m.trace {
        sink.write_line(&line);
    }
}

/// Format the current instruction as `PC  bytes  disasm  registers`
pub(crate) fn format_line(cpu: &Cpu) -> String {
    let opcode = cpu.instruction.opcode;
    let name = cpu.instruction.operation.mnemonic();
    let immediate = cpu.immediate;

    let (bytes, disasm) = match cpu.instruction.initial_state & !7 {
        _ if cpu.interrupt != Interrupt::None => interrupt_entry(cpu),
        state::STACK_PUSH
        | state::STACK_PULL
        | state::IMPLIED
        | state::ACCUMULATOR
        | state::SUBROUTINE_RETURN
        | state::INTERRUPT_RETURN => (format!("{:02X}", opcode), name.to_string()),
        state::INTERRUPT_JUMP => (format!("{:02X}", opcode), name.to_string()),
        state::BRANCH => (
            format!("{:02X} {:02X}", opcode, immediate & 0xFF),
            format!("{} ${:02X}", name, cpu.address),
        ),
        state::IMMEDIATE => (
            format!("{:02X} {:02X}", opcode, immediate & 0xFF),
            format!("{} #${:02X}", name, immediate & 0xFF),
        ),
        state::ZERO_PAGE => (
            format!("{:02X} {:02X}", opcode, immediate & 0xFF),
            format!("{} ${:02X}", name, immediate & 0xFF),
        ),
        state::ZERO_PAGE_X => (
            format!("{:02X} {:02X}", opcode, immediate & 0xFF),
            format!("{} ${:02X},X", name, immediate & 0xFF),
        ),
        state::ZERO_PAGE_Y => (
            format!("{:02X} {:02X}", opcode, immediate & 0xFF),
            format!("{} ${:02X},Y", name, immediate & 0xFF),
        ),
        state::SUBROUTINE_JUMP | state::ABSOLUTE_JUMP => (
            format!("{:02X} {:02X} {:02X}", opcode, immediate & 0xFF, immediate >> 8),
            format!("{} ${:04X}", name, immediate),
        ),
        state::ABSOLUTE => (
            format!("{:02X} {:02X} {:02X}", opcode, immediate & 0xFF, immediate >> 8),
            format!("{} ${:04X}", name, immediate),
        ),
        state::ABSOLUTE_X => (
            format!("{:02X} {:02X} {:02X}", opcode, immediate & 0xFF, immediate >> 8),
            format!("{} ${:04X},X", name, immediate),
        ),
        state::ABSOLUTE_Y => (
            format!("{:02X} {:02X} {:02X}", opcode, immediate & 0xFF, immediate >> 8),
            format!("{} ${:04X},Y", name, immediate),
        ),
        state::INDIRECT_JUMP => (
            format!("{:02X} {:02X} {:02X}", opcode, immediate & 0xFF, immediate >> 8),
            format!("{} (${:04X})", name, immediate),
        ),
        state::INDEXED_INDIRECT => (
            format!("{:02X} {:02X}", opcode, immediate & 0xFF),
            format!("{} (${:02X},X)", name, immediate & 0xFF),
        ),
        state::INDIRECT_INDEXED => (
            format!("{:02X} {:02X}", opcode, immediate & 0xFF),
            format!("{} (${:02X}),Y", name, immediate & 0xFF),
        ),
        _ => (format!("{:02X}", opcode), name.to_string()),
    };

    format!(
        "{:04X}  {:<8}  {:<30} A:{:02X} X:{:02X} Y:{:02X} SP:{:02X}",
        cpu.instruction_pc, bytes, disasm, cpu.a, cpu.x, cpu.y, cpu.sp
    )
}

fn interrupt_entry(cpu: &Cpu) -> (String, String) {
    let kind = if cpu.interrupt == Interrupt::Nmi {
        "NMI"
    } else {
        "IRQ"
    };
    ("--".to_string(), format!("*** {} ***", kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::opcodes::INSTRUCTION_TABLE;

    #[test]
    fn test_format_immediate_instruction() {
        let mut cpu = Cpu::new();
        cpu.instruction = INSTRUCTION_TABLE[0xA2]; // LDX #imm
        cpu.instruction_pc = 0xC5F5;
        cpu.immediate = 0x00;
        cpu.sp = 0xFD;
        let line = format_line(&cpu);
        assert!(line.starts_with("C5F5  A2 00"), "line: {}", line);
        assert!(line.contains("LDX #$00"));
        assert!(line.ends_with("A:00 X:00 Y:00 SP:FD"));
    }

    #[test]
    fn test_format_absolute_instruction() {
        let mut cpu = Cpu::new();
        cpu.instruction = INSTRUCTION_TABLE[0x8D]; // STA abs
        cpu.instruction_pc = 0x8000;
        cpu.immediate = 0x2002;
        cpu.a = 0x42;
        let line = format_line(&cpu);
        assert!(line.contains("8D 02 20"), "line: {}", line);
        assert!(line.contains("STA $2002"));
        assert!(line.contains("A:42"));
    }

    #[test]
    fn test_format_interrupt_sequence() {
        let mut cpu = Cpu::new();
        cpu.interrupt = Interrupt::Nmi;
        let line = format_line(&cpu);
        assert!(line.contains("*** NMI ***"));
    }
}
