// Opcode decode table and micro-sequence state encoding
//
// Every opcode byte decodes to an operation, the entry state of its
// addressing-mode micro-sequence, and (for memory instructions) the state
// that finishes the access: READ, MODIFY (read-modify-write) or WRITE.
// States are encoded as `mode_base | sub_cycle` with eight sub-cycle slots
// per mode, so `state += 1` walks the mode's cycles in order.

use serde::{Deserialize, Serialize};

/// Micro-sequence mode bases
pub(crate) mod state {
    pub const RESET: u8 = 0x00 << 3;
    pub const FETCH: u8 = 0x01 << 3;
    pub const FETCH_NO_POLL: u8 = 0x02 << 3;
    pub const INTERRUPT_JUMP: u8 = 0x03 << 3;
    pub const INTERRUPT_RETURN: u8 = 0x04 << 3;
    pub const SUBROUTINE_JUMP: u8 = 0x05 << 3;
    pub const SUBROUTINE_RETURN: u8 = 0x06 << 3;
    pub const STACK_PUSH: u8 = 0x07 << 3;
    pub const STACK_PULL: u8 = 0x08 << 3;
    pub const IMPLIED: u8 = 0x09 << 3;
    pub const ACCUMULATOR: u8 = 0x0A << 3;
    pub const IMMEDIATE: u8 = 0x0B << 3;
    pub const BRANCH: u8 = 0x0C << 3;
    pub const ABSOLUTE_JUMP: u8 = 0x0D << 3;
    pub const INDIRECT_JUMP: u8 = 0x0E << 3;
    pub const ZERO_PAGE: u8 = 0x0F << 3;
    pub const ZERO_PAGE_X: u8 = 0x10 << 3;
    pub const ZERO_PAGE_Y: u8 = 0x11 << 3;
    pub const ABSOLUTE: u8 = 0x12 << 3;
    pub const ABSOLUTE_X: u8 = 0x13 << 3;
    pub const ABSOLUTE_Y: u8 = 0x14 << 3;
    pub const INDEXED_INDIRECT: u8 = 0x15 << 3;
    pub const INDIRECT_INDEXED: u8 = 0x16 << 3;
    pub const READ: u8 = 0x17 << 3;
    pub const MODIFY: u8 = 0x18 << 3;
    pub const WRITE: u8 = 0x19 << 3;
}

/// Operation selector, official and unofficial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Adc, Ahx, Alr, Anc, And, Arr, Asl, Axs,
    Bcc, Bcs, Beq, Bit, Bmi, Bne, Bpl, Brk,
    Bvc, Bvs, Clc, Cld, Cli, Clv, Cmp, Cpx,
    Cpy, Dcp, Dec, Dex, Dey, Eor, Inc, Inx,
    Iny, Isc, Jmp, Jsr, Kil, Las, Lax, Lda,
    Ldx, Ldy, Lsr, Nop, Ora, Pha, Php, Pla,
    Plp, Rla, Rol, Ror, Rra, Rti, Rts, Sax,
    Sbc, Sec, Sed, Sei, Shx, Shy, Slo, Sre,
    Sta, Stx, Sty, Tas, Tax, Tay, Tsx, Txa,
    Txs, Tya, Xaa,
}

impl Operation {
    /// Assembler mnemonic for trace output
    pub fn mnemonic(self) -> &'static str {
        use Operation::*;
        match self {
            Adc => "ADC", Ahx => "AHX", Alr => "ALR", Anc => "ANC",
            And => "AND", Arr => "ARR", Asl => "ASL", Axs => "AXS",
            Bcc => "BCC", Bcs => "BCS", Beq => "BEQ", Bit => "BIT",
            Bmi => "BMI", Bne => "BNE", Bpl => "BPL", Brk => "BRK",
            Bvc => "BVC", Bvs => "BVS", Clc => "CLC", Cld => "CLD",
            Cli => "CLI", Clv => "CLV", Cmp => "CMP", Cpx => "CPX",
            Cpy => "CPY", Dcp => "DCP", Dec => "DEC", Dex => "DEX",
            Dey => "DEY", Eor => "EOR", Inc => "INC", Inx => "INX",
            Iny => "INY", Isc => "ISC", Jmp => "JMP", Jsr => "JSR",
            Kil => "KIL", Las => "LAS", Lax => "LAX", Lda => "LDA",
            Ldx => "LDX", Ldy => "LDY", Lsr => "LSR", Nop => "NOP",
            Ora => "ORA", Pha => "PHA", Php => "PHP", Pla => "PLA",
            Plp => "PLP", Rla => "RLA", Rol => "ROL", Ror => "ROR",
            Rra => "RRA", Rti => "RTI", Rts => "RTS", Sax => "SAX",
            Sbc => "SBC", Sec => "SEC", Sed => "SED", Sei => "SEI",
            Shx => "SHX", Shy => "SHY", Slo => "SLO", Sre => "SRE",
            Sta => "STA", Stx => "STX", Sty => "STY", Tas => "TAS",
            Tax => "TAX", Tay => "TAY", Tsx => "TSX", Txa => "TXA",
            Txs => "TXS", Tya => "TYA", Xaa => "XAA",
        }
    }
}

/// Decoded instruction
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Instruction {
    /// Opcode byte
    pub opcode: u8,
    /// ALU/transfer semantics
    pub operation: Operation,
    /// Addressing-mode entry state
    pub initial_state: u8,
    /// Completion state for memory instructions (READ/MODIFY/WRITE)
    pub memory_state: u8,
}

const fn i(opcode: u8, operation: Operation, initial_state: u8, memory_state: u8) -> Instruction {
    Instruction {
        opcode,
        operation,
        initial_state,
        memory_state,
    }
}

use state::*;
use Operation::*;

/// Decode table for all 256 opcode bytes
#[rustfmt::skip]
pub(crate) const INSTRUCTION_TABLE: [Instruction; 256] = [
    i(0x00, Brk, INTERRUPT_JUMP, 0),
    i(0x01, Ora, INDEXED_INDIRECT, READ),
    i(0x02, Kil, IMPLIED, 0),
    i(0x03, Slo, INDEXED_INDIRECT, MODIFY),
    i(0x04, Nop, ZERO_PAGE, READ),
    i(0x05, Ora, ZERO_PAGE, READ),
    i(0x06, Asl, ZERO_PAGE, MODIFY),
    i(0x07, Slo, ZERO_PAGE, MODIFY),
    i(0x08, Php, STACK_PUSH, 0),
    i(0x09, Ora, IMMEDIATE, 0),
    i(0x0A, Asl, ACCUMULATOR, 0),
    i(0x0B, Anc, IMMEDIATE, 0),
    i(0x0C, Nop, ABSOLUTE, READ),
    i(0x0D, Ora, ABSOLUTE, READ),
    i(0x0E, Asl, ABSOLUTE, MODIFY),
    i(0x0F, Slo, ABSOLUTE, MODIFY),
    i(0x10, Bpl, BRANCH, 0),
    i(0x11, Ora, INDIRECT_INDEXED, READ),
    i(0x12, Kil, IMPLIED, 0),
    i(0x13, Slo, INDIRECT_INDEXED, MODIFY),
    i(0x14, Nop, ZERO_PAGE_X, READ),
    i(0x15, Ora, ZERO_PAGE_X, READ),
    i(0x16, Asl, ZERO_PAGE_X, MODIFY),
    i(0x17, Slo, ZERO_PAGE_X, MODIFY),
    i(0x18, Clc, IMPLIED, 0),
    i(0x19, Ora, ABSOLUTE_Y, READ),
    i(0x1A, Nop, IMPLIED, 0),
    i(0x1B, Slo, ABSOLUTE_Y, MODIFY),
    i(0x1C, Nop, ABSOLUTE_X, READ),
    i(0x1D, Ora, ABSOLUTE_X, READ),
    i(0x1E, Asl, ABSOLUTE_X, MODIFY),
    i(0x1F, Slo, ABSOLUTE_X, MODIFY),
    i(0x20, Jsr, SUBROUTINE_JUMP, 0),
    i(0x21, And, INDEXED_INDIRECT, READ),
    i(0x22, Kil, IMPLIED, 0),
    i(0x23, Rla, INDEXED_INDIRECT, MODIFY),
    i(0x24, Bit, ZERO_PAGE, READ),
    i(0x25, And, ZERO_PAGE, READ),
    i(0x26, Rol, ZERO_PAGE, MODIFY),
    i(0x27, Rla, ZERO_PAGE, MODIFY),
    i(0x28, Plp, STACK_PULL, 0),
    i(0x29, And, IMMEDIATE, 0),
    i(0x2A, Rol, ACCUMULATOR, 0),
    i(0x2B, Anc, IMMEDIATE, 0),
    i(0x2C, Bit, ABSOLUTE, READ),
    i(0x2D, And, ABSOLUTE, READ),
    i(0x2E, Rol, ABSOLUTE, MODIFY),
    i(0x2F, Rla, ABSOLUTE, MODIFY),
    i(0x30, Bmi, BRANCH, 0),
    i(0x31, And, INDIRECT_INDEXED, READ),
    i(0x32, Kil, IMPLIED, 0),
    i(0x33, Rla, INDIRECT_INDEXED, MODIFY),
    i(0x34, Nop, ZERO_PAGE_X, READ),
    i(0x35, And, ZERO_PAGE_X, READ),
    i(0x36, Rol, ZERO_PAGE_X, MODIFY),
    i(0x37, Rla, ZERO_PAGE_X, MODIFY),
    i(0x38, Sec, IMPLIED, 0),
    i(0x39, And, ABSOLUTE_Y, READ),
    i(0x3A, Nop, IMPLIED, 0),
    i(0x3B, Rla, ABSOLUTE_Y, MODIFY),
    i(0x3C, Nop, ABSOLUTE_X, READ),
    i(0x3D, And, ABSOLUTE_X, READ),
    i(0x3E, Rol, ABSOLUTE_X, MODIFY),
    i(0x3F, Rla, ABSOLUTE_X, MODIFY),
    i(0x40, Rti, INTERRUPT_RETURN, 0),
    i(0x41, Eor, INDEXED_INDIRECT, READ),
    i(0x42, Kil, IMPLIED, 0),
    i(0x43, Sre, INDEXED_INDIRECT, MODIFY),
    i(0x44, Nop, ZERO_PAGE, READ),
    i(0x45, Eor, ZERO_PAGE, READ),
    i(0x46, Lsr, ZERO_PAGE, MODIFY),
    i(0x47, Sre, ZERO_PAGE, MODIFY),
    i(0x48, Pha, STACK_PUSH, 0),
    i(0x49, Eor, IMMEDIATE, 0),
    i(0x4A, Lsr, ACCUMULATOR, 0),
    i(0x4B, Alr, IMMEDIATE, 0),
    i(0x4C, Jmp, ABSOLUTE_JUMP, 0),
    i(0x4D, Eor, ABSOLUTE, READ),
    i(0x4E, Lsr, ABSOLUTE, MODIFY),
    i(0x4F, Sre, ABSOLUTE, MODIFY),
    i(0x50, Bvc, BRANCH, 0),
    i(0x51, Eor, INDIRECT_INDEXED, READ),
    i(0x52, Kil, IMPLIED, 0),
    i(0x53, Sre, INDIRECT_INDEXED, MODIFY),
    i(0x54, Nop, ZERO_PAGE_X, READ),
    i(0x55, Eor, ZERO_PAGE_X, READ),
    i(0x56, Lsr, ZERO_PAGE_X, MODIFY),
    i(0x57, Sre, ZERO_PAGE_X, MODIFY),
    i(0x58, Cli, IMPLIED, 0),
    i(0x59, Eor, ABSOLUTE_Y, READ),
    i(0x5A, Nop, IMPLIED, 0),
    i(0x5B, Sre, ABSOLUTE_Y, MODIFY),
    i(0x5C, Nop, ABSOLUTE_X, READ),
    i(0x5D, Eor, ABSOLUTE_X, READ),
    i(0x5E, Lsr, ABSOLUTE_X, MODIFY),
    i(0x5F, Sre, ABSOLUTE_X, MODIFY),
    i(0x60, Rts, SUBROUTINE_RETURN, 0),
    i(0x61, Adc, INDEXED_INDIRECT, READ),
    i(0x62, Kil, IMPLIED, 0),
    i(0x63, Rra, INDEXED_INDIRECT, MODIFY),
    i(0x64, Nop, ZERO_PAGE, READ),
    i(0x65, Adc, ZERO_PAGE, READ),
    i(0x66, Ror, ZERO_PAGE, MODIFY),
    i(0x67, Rra, ZERO_PAGE, MODIFY),
    i(0x68, Pla, STACK_PULL, 0),
    i(0x69, Adc, IMMEDIATE, 0),
    i(0x6A, Ror, ACCUMULATOR, 0),
    i(0x6B, Arr, IMMEDIATE, 0),
    i(0x6C, Jmp, INDIRECT_JUMP, 0),
    i(0x6D, Adc, ABSOLUTE, READ),
    i(0x6E, Ror, ABSOLUTE, MODIFY),
    i(0x6F, Rra, ABSOLUTE, MODIFY),
    i(0x70, Bvs, BRANCH, 0),
    i(0x71, Adc, INDIRECT_INDEXED, READ),
    i(0x72, Kil, IMPLIED, 0),
    i(0x73, Rra, INDIRECT_INDEXED, MODIFY),
    i(0x74, Nop, ZERO_PAGE_X, READ),
    i(0x75, Adc, ZERO_PAGE_X, READ),
    i(0x76, Ror, ZERO_PAGE_X, MODIFY),
    i(0x77, Rra, ZERO_PAGE_X, MODIFY),
    i(0x78, Sei, IMPLIED, 0),
    i(0x79, Adc, ABSOLUTE_Y, READ),
    i(0x7A, Nop, IMPLIED, 0),
    i(0x7B, Rra, ABSOLUTE_Y, MODIFY),
    i(0x7C, Nop, ABSOLUTE_X, READ),
    i(0x7D, Adc, ABSOLUTE_X, READ),
    i(0x7E, Ror, ABSOLUTE_X, MODIFY),
    i(0x7F, Rra, ABSOLUTE_X, MODIFY),
    i(0x80, Nop, IMMEDIATE, 0),
    i(0x81, Sta, INDEXED_INDIRECT, WRITE),
    i(0x82, Nop, IMMEDIATE, 0),
    i(0x83, Sax, INDEXED_INDIRECT, WRITE),
    i(0x84, Sty, ZERO_PAGE, WRITE),
    i(0x85, Sta, ZERO_PAGE, WRITE),
    i(0x86, Stx, ZERO_PAGE, WRITE),
    i(0x87, Sax, ZERO_PAGE, WRITE),
    i(0x88, Dey, IMPLIED, 0),
    i(0x89, Nop, IMMEDIATE, 0),
    i(0x8A, Txa, IMPLIED, 0),
    i(0x8B, Xaa, IMMEDIATE, 0),
    i(0x8C, Sty, ABSOLUTE, WRITE),
    i(0x8D, Sta, ABSOLUTE, WRITE),
    i(0x8E, Stx, ABSOLUTE, WRITE),
    i(0x8F, Sax, ABSOLUTE, WRITE),
    i(0x90, Bcc, BRANCH, 0),
    i(0x91, Sta, INDIRECT_INDEXED, WRITE),
    i(0x92, Kil, IMPLIED, 0),
    i(0x93, Ahx, INDIRECT_INDEXED, READ),
    i(0x94, Sty, ZERO_PAGE_X, WRITE),
    i(0x95, Sta, ZERO_PAGE_X, WRITE),
    i(0x96, Stx, ZERO_PAGE_Y, WRITE),
    i(0x97, Sax, ZERO_PAGE_Y, WRITE),
    i(0x98, Tya, IMPLIED, 0),
    i(0x99, Sta, ABSOLUTE_Y, WRITE),
    i(0x9A, Txs, IMPLIED, 0),
    i(0x9B, Tas, ABSOLUTE_Y, READ),
    i(0x9C, Shy, ABSOLUTE_X, WRITE),
    i(0x9D, Sta, ABSOLUTE_X, WRITE),
    i(0x9E, Shx, ABSOLUTE_Y, WRITE),
    i(0x9F, Ahx, ABSOLUTE_Y, READ),
    i(0xA0, Ldy, IMMEDIATE, 0),
    i(0xA1, Lda, INDEXED_INDIRECT, READ),
    i(0xA2, Ldx, IMMEDIATE, 0),
    i(0xA3, Lax, INDEXED_INDIRECT, READ),
    i(0xA4, Ldy, ZERO_PAGE, READ),
    i(0xA5, Lda, ZERO_PAGE, READ),
    i(0xA6, Ldx, ZERO_PAGE, READ),
    i(0xA7, Lax, ZERO_PAGE, READ),
    i(0xA8, Tay, IMPLIED, 0),
    i(0xA9, Lda, IMMEDIATE, 0),
    i(0xAA, Tax, IMPLIED, 0),
    i(0xAB, Lax, IMMEDIATE, 0),
    i(0xAC, Ldy, ABSOLUTE, READ),
    i(0xAD, Lda, ABSOLUTE, READ),
    i(0xAE, Ldx, ABSOLUTE, READ),
    i(0xAF, Lax, ABSOLUTE, READ),
    i(0xB0, Bcs, BRANCH, 0),
    i(0xB1, Lda, INDIRECT_INDEXED, READ),
    i(0xB2, Kil, IMPLIED, 0),
    i(0xB3, Lax, INDIRECT_INDEXED, READ),
    i(0xB4, Ldy, ZERO_PAGE_X, READ),
    i(0xB5, Lda, ZERO_PAGE_X, READ),
    i(0xB6, Ldx, ZERO_PAGE_Y, READ),
    i(0xB7, Lax, ZERO_PAGE_Y, READ),
    i(0xB8, Clv, IMPLIED, 0),
    i(0xB9, Lda, ABSOLUTE_Y, READ),
    i(0xBA, Tsx, IMPLIED, 0),
    i(0xBB, Las, ABSOLUTE_Y, READ),
    i(0xBC, Ldy, ABSOLUTE_X, READ),
    i(0xBD, Lda, ABSOLUTE_X, READ),
    i(0xBE, Ldx, ABSOLUTE_Y, READ),
    i(0xBF, Lax, ABSOLUTE_Y, READ),
    i(0xC0, Cpy, IMMEDIATE, 0),
    i(0xC1, Cmp, INDEXED_INDIRECT, READ),
    i(0xC2, Nop, IMMEDIATE, 0),
    i(0xC3, Dcp, INDEXED_INDIRECT, MODIFY),
    i(0xC4, Cpy, ZERO_PAGE, READ),
    i(0xC5, Cmp, ZERO_PAGE, READ),
    i(0xC6, Dec, ZERO_PAGE, MODIFY),
    i(0xC7, Dcp, ZERO_PAGE, MODIFY),
    i(0xC8, Iny, IMPLIED, 0),
    i(0xC9, Cmp, IMMEDIATE, 0),
    i(0xCA, Dex, IMPLIED, 0),
    i(0xCB, Axs, IMMEDIATE, 0),
    i(0xCC, Cpy, ABSOLUTE, READ),
    i(0xCD, Cmp, ABSOLUTE, READ),
    i(0xCE, Dec, ABSOLUTE, MODIFY),
    i(0xCF, Dcp, ABSOLUTE, MODIFY),
    i(0xD0, Bne, BRANCH, 0),
    i(0xD1, Cmp, INDIRECT_INDEXED, READ),
    i(0xD2, Kil, IMPLIED, 0),
    i(0xD3, Dcp, INDIRECT_INDEXED, MODIFY),
    i(0xD4, Nop, ZERO_PAGE_X, READ),
    i(0xD5, Cmp, ZERO_PAGE_X, READ),
    i(0xD6, Dec, ZERO_PAGE_X, MODIFY),
    i(0xD7, Dcp, ZERO_PAGE_X, MODIFY),
    i(0xD8, Cld, IMPLIED, 0),
    i(0xD9, Cmp, ABSOLUTE_Y, READ),
    i(0xDA, Nop, IMPLIED, 0),
    i(0xDB, Dcp, ABSOLUTE_Y, MODIFY),
    i(0xDC, Nop, ABSOLUTE_X, READ),
    i(0xDD, Cmp, ABSOLUTE_X, READ),
    i(0xDE, Dec, ABSOLUTE_X, MODIFY),
    i(0xDF, Dcp, ABSOLUTE_X, MODIFY),
    i(0xE0, Cpx, IMMEDIATE, 0),
    i(0xE1, Sbc, INDEXED_INDIRECT, READ),
    i(0xE2, Nop, IMMEDIATE, 0),
    i(0xE3, Isc, INDEXED_INDIRECT, MODIFY),
    i(0xE4, Cpx, ZERO_PAGE, READ),
    i(0xE5, Sbc, ZERO_PAGE, READ),
    i(0xE6, Inc, ZERO_PAGE, MODIFY),
    i(0xE7, Isc, ZERO_PAGE, MODIFY),
    i(0xE8, Inx, IMPLIED, 0),
    i(0xE9, Sbc, IMMEDIATE, 0),
    i(0xEA, Nop, IMPLIED, 0),
    i(0xEB, Sbc, IMMEDIATE, 0),
    i(0xEC, Cpx, ABSOLUTE, READ),
    i(0xED, Sbc, ABSOLUTE, READ),
    i(0xEE, Inc, ABSOLUTE, MODIFY),
    i(0xEF, Isc, ABSOLUTE, MODIFY),
    i(0xF0, Beq, BRANCH, 0),
    i(0xF1, Sbc, INDIRECT_INDEXED, READ),
    i(0xF2, Kil, IMPLIED, 0),
    i(0xF3, Isc, INDIRECT_INDEXED, MODIFY),
    i(0xF4, Nop, ZERO_PAGE_X, READ),
    i(0xF5, Sbc, ZERO_PAGE_X, READ),
    i(0xF6, Inc, ZERO_PAGE_X, MODIFY),
    i(0xF7, Isc, ZERO_PAGE_X, MODIFY),
    i(0xF8, Sed, IMPLIED, 0),
    i(0xF9, Sbc, ABSOLUTE_Y, READ),
    i(0xFA, Nop, IMPLIED, 0),
    i(0xFB, Isc, ABSOLUTE_Y, MODIFY),
    i(0xFC, Nop, ABSOLUTE_X, READ),
    i(0xFD, Sbc, ABSOLUTE_X, READ),
    i(0xFE, Inc, ABSOLUTE_X, MODIFY),
    i(0xFF, Isc, ABSOLUTE_X, MODIFY),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_indexes_match_opcodes() {
        for (index, entry) in INSTRUCTION_TABLE.iter().enumerate() {
            assert_eq!(usize::from(entry.opcode), index);
        }
    }

    #[test]
    fn test_memory_instructions_have_completion_states() {
        for entry in INSTRUCTION_TABLE.iter() {
            let addressed = matches!(
                entry.initial_state,
                state::ZERO_PAGE
                    | state::ZERO_PAGE_X
                    | state::ZERO_PAGE_Y
                    | state::ABSOLUTE
                    | state::ABSOLUTE_X
                    | state::ABSOLUTE_Y
                    | state::INDEXED_INDIRECT
                    | state::INDIRECT_INDEXED
            );
            if addressed {
                assert!(
                    matches!(
                        entry.memory_state,
                        state::READ | state::MODIFY | state::WRITE
                    ),
                    "opcode {:02X} lacks a memory completion state",
                    entry.opcode
                );
            }
        }
    }

    #[test]
    fn test_known_decodes() {
        assert_eq!(INSTRUCTION_TABLE[0xEA].operation, Operation::Nop);
        assert_eq!(INSTRUCTION_TABLE[0xEA].initial_state, state::IMPLIED);
        assert_eq!(INSTRUCTION_TABLE[0xA9].operation, Operation::Lda);
        assert_eq!(INSTRUCTION_TABLE[0x6C].initial_state, state::INDIRECT_JUMP);
        assert_eq!(INSTRUCTION_TABLE[0xFE].memory_state, state::MODIFY);
    }
}
