// Operation semantics - ALU, flag and transfer effects
//
// `operate` applies one operation to the CPU registers and the operand
// latch. Memory traffic is the micro-sequence's job: read-class operations
// find their input in `cpu.operand`, write-class operations leave their
// output there. Flag rules follow 6502 conventions; decimal mode is
// storable but has no arithmetic effect.

use crate::cpu::opcodes::Operation;
use crate::cpu::Cpu;

pub(crate) fn operate(cpu: &mut Cpu, operation: Operation) {
    use Operation::*;

    match operation {
        Adc => {
            let r = u32::from(cpu.a) + u32::from(cpu.operand) + u32::from(cpu.flag_c);
            cpu.flag_v = !(cpu.a ^ cpu.operand) & (cpu.a ^ r as u8) & 0x80 != 0;
            cpu.flag_z = r & 0xFF == 0;
            cpu.flag_n = r & 0x80 != 0;
            cpu.flag_c = r > 0xFF;
            cpu.a = r as u8;
        }

        // unofficial
        Ahx => {}

        // unofficial
        Alr => {
            cpu.a &= cpu.operand;
            cpu.flag_c = cpu.a & 0x01 != 0;
            cpu.a >>= 1;
            cpu.flag_z = cpu.a == 0;
            cpu.flag_n = false;
        }

        // unofficial
        Anc => {
            cpu.a &= cpu.operand;
            cpu.flag_z = cpu.a == 0;
            cpu.flag_n = cpu.a & 0x80 != 0;
            cpu.flag_c = cpu.flag_n;
        }

        And => {
            cpu.a &= cpu.operand;
            cpu.flag_z = cpu.a == 0;
            cpu.flag_n = cpu.a & 0x80 != 0;
        }

        // unofficial
        Arr => {
            cpu.a &= cpu.operand;
            cpu.a = (cpu.a >> 1) | u8::from(cpu.flag_c) << 7;
            cpu.flag_c = cpu.a & 0x40 != 0;
            cpu.flag_v = ((cpu.a >> 1) ^ cpu.a) & 0x20 != 0;
            cpu.flag_z = cpu.a == 0;
            cpu.flag_n = cpu.a & 0x80 != 0;
        }

        Asl => {
            let r = u32::from(cpu.operand) << 1;
            cpu.operand = r as u8;
            cpu.flag_z = cpu.operand == 0;
            cpu.flag_n = cpu.operand & 0x80 != 0;
            cpu.flag_c = r > 0xFF;
        }

        // unofficial
        Axs => {
            let r = u32::from(cpu.a & cpu.x) + u32::from(cpu.operand ^ 0xFF) + 1;
            cpu.x = r as u8;
            cpu.flag_z = cpu.x == 0;
            cpu.flag_n = cpu.x & 0x80 != 0;
            cpu.flag_c = r > 0xFF;
        }

        Bit => {
            cpu.flag_n = cpu.operand & 0x80 != 0;
            cpu.flag_v = cpu.operand & 0x40 != 0;
            cpu.flag_z = cpu.a & cpu.operand == 0;
        }

        Clc => cpu.flag_c = false,
        Cld => cpu.flag_d = false,
        Cli => cpu.flag_i = false,
        Clv => cpu.flag_v = false,

        Cmp => {
            let r = cpu.a.wrapping_sub(cpu.operand);
            cpu.flag_z = r == 0;
            cpu.flag_n = r & 0x80 != 0;
            cpu.flag_c = cpu.a >= cpu.operand;
        }

        Cpx => {
            let r = cpu.x.wrapping_sub(cpu.operand);
            cpu.flag_z = r == 0;
            cpu.flag_n = r & 0x80 != 0;
            cpu.flag_c = cpu.x >= cpu.operand;
        }

        Cpy => {
            let r = cpu.y.wrapping_sub(cpu.operand);
            cpu.flag_z = r == 0;
            cpu.flag_n = r & 0x80 != 0;
            cpu.flag_c = cpu.y >= cpu.operand;
        }

        // unofficial
        Dcp => {
            cpu.operand = cpu.operand.wrapping_sub(1);
            let r = cpu.a.wrapping_sub(cpu.operand);
            cpu.flag_z = r == 0;
            cpu.flag_n = r & 0x80 != 0;
            cpu.flag_c = cpu.a >= cpu.operand;
        }

        Dec => {
            cpu.operand = cpu.operand.wrapping_sub(1);
            cpu.flag_z = cpu.operand == 0;
            cpu.flag_n = cpu.operand & 0x80 != 0;
        }

        Dex => {
            cpu.x = cpu.x.wrapping_sub(1);
            cpu.flag_z = cpu.x == 0;
            cpu.flag_n = cpu.x & 0x80 != 0;
        }

        Dey => {
            cpu.y = cpu.y.wrapping_sub(1);
            cpu.flag_z = cpu.y == 0;
            cpu.flag_n = cpu.y & 0x80 != 0;
        }

        Eor => {
            cpu.a ^= cpu.operand;
            cpu.flag_z = cpu.a == 0;
            cpu.flag_n = cpu.a & 0x80 != 0;
        }

        Inc => {
            cpu.operand = cpu.operand.wrapping_add(1);
            cpu.flag_z = cpu.operand == 0;
            cpu.flag_n = cpu.operand & 0x80 != 0;
        }

        Inx => {
            cpu.x = cpu.x.wrapping_add(1);
            cpu.flag_z = cpu.x == 0;
            cpu.flag_n = cpu.x & 0x80 != 0;
        }

        Iny => {
            cpu.y = cpu.y.wrapping_add(1);
            cpu.flag_z = cpu.y == 0;
            cpu.flag_n = cpu.y & 0x80 != 0;
        }

        // unofficial
        Isc => {
            cpu.operand = cpu.operand.wrapping_add(1);
            let m = cpu.operand ^ 0xFF;
            let r = u32::from(cpu.a) + u32::from(m) + u32::from(cpu.flag_c);
            cpu.flag_v = !(cpu.a ^ m) & (cpu.a ^ r as u8) & 0x80 != 0;
            cpu.flag_z = r & 0xFF == 0;
            cpu.flag_n = r & 0x80 != 0;
            cpu.flag_c = r > 0xFF;
            cpu.a = r as u8;
        }

        // KIL jams the fetch unit; PPU and APU keep running.
        Kil => cpu.halted = true,

        // unofficial
        Las => {
            let r = cpu.operand & cpu.sp;
            cpu.a = r;
            cpu.x = r;
            cpu.sp = r;
            cpu.flag_z = r == 0;
            cpu.flag_n = r & 0x80 != 0;
        }

        // unofficial
        Lax => {
            cpu.a = cpu.operand;
            cpu.x = cpu.a;
            cpu.flag_z = cpu.a == 0;
            cpu.flag_n = cpu.a & 0x80 != 0;
        }

        Lda => {
            cpu.a = cpu.operand;
            cpu.flag_z = cpu.a == 0;
            cpu.flag_n = cpu.a & 0x80 != 0;
        }

        Ldx => {
            cpu.x = cpu.operand;
            cpu.flag_z = cpu.x == 0;
            cpu.flag_n = cpu.x & 0x80 != 0;
        }

        Ldy => {
            cpu.y = cpu.operand;
            cpu.flag_z = cpu.y == 0;
            cpu.flag_n = cpu.y & 0x80 != 0;
        }

        Lsr => {
            cpu.flag_c = cpu.operand & 0x01 != 0;
            cpu.operand >>= 1;
            cpu.flag_z = cpu.operand == 0;
            cpu.flag_n = false;
        }

        Nop => {}

        Ora => {
            cpu.a |= cpu.operand;
            cpu.flag_z = cpu.a == 0;
            cpu.flag_n = cpu.a & 0x80 != 0;
        }

        Pha => cpu.operand = cpu.a,

        Php => {
            cpu.operand = 0x20
                | u8::from(cpu.flag_n) << 7
                | u8::from(cpu.flag_v) << 6
                | u8::from(cpu.flag_b) << 4
                | u8::from(cpu.flag_d) << 3
                | u8::from(cpu.flag_i) << 2
                | u8::from(cpu.flag_z) << 1
                | u8::from(cpu.flag_c);
        }

        Pla => {
            cpu.a = cpu.operand;
            cpu.flag_z = cpu.a == 0;
            cpu.flag_n = cpu.a & 0x80 != 0;
        }

        Plp => {
            cpu.flag_n = cpu.operand & 0x80 != 0;
            cpu.flag_v = cpu.operand & 0x40 != 0;
            cpu.flag_b = true;
            cpu.flag_d = cpu.operand & 0x08 != 0;
            cpu.flag_i = cpu.operand & 0x04 != 0;
            cpu.flag_z = cpu.operand & 0x02 != 0;
            cpu.flag_c = cpu.operand & 0x01 != 0;
        }

        // unofficial
        Rla => {
            let r = (u32::from(cpu.operand) << 1) | u32::from(cpu.flag_c);
            cpu.operand = r as u8;
            cpu.flag_c = r > 0xFF;
            cpu.a &= cpu.operand;
            cpu.flag_z = cpu.a == 0;
            cpu.flag_n = cpu.a & 0x80 != 0;
        }

        Rol => {
            let r = (u32::from(cpu.operand) << 1) | u32::from(cpu.flag_c);
            cpu.operand = r as u8;
            cpu.flag_c = r > 0xFF;
            cpu.flag_z = cpu.operand == 0;
            cpu.flag_n = cpu.operand & 0x80 != 0;
        }

        Ror => {
            let r = (cpu.operand >> 1) | u8::from(cpu.flag_c) << 7;
            cpu.flag_c = cpu.operand & 1 != 0;
            cpu.operand = r;
            cpu.flag_z = cpu.operand == 0;
            cpu.flag_n = cpu.operand & 0x80 != 0;
        }

        // unofficial
        Rra => {
            let rotated = (cpu.operand >> 1) | u8::from(cpu.flag_c) << 7;
            cpu.flag_c = cpu.operand & 1 != 0;
            cpu.operand = rotated;
            let r = u32::from(cpu.a) + u32::from(cpu.operand) + u32::from(cpu.flag_c);
            cpu.flag_v = !(cpu.a ^ cpu.operand) & (cpu.a ^ r as u8) & 0x80 != 0;
            cpu.flag_z = r & 0xFF == 0;
            cpu.flag_n = r & 0x80 != 0;
            cpu.flag_c = r > 0xFF;
            cpu.a = r as u8;
        }

        // unofficial
        Sax => cpu.operand = cpu.a & cpu.x,

        Sbc => {
            let m = cpu.operand ^ 0xFF;
            let r = u32::from(cpu.a) + u32::from(m) + u32::from(cpu.flag_c);
            cpu.flag_v = !(cpu.a ^ m) & (cpu.a ^ r as u8) & 0x80 != 0;
            cpu.flag_z = r & 0xFF == 0;
            cpu.flag_n = r & 0x80 != 0;
            cpu.flag_c = r > 0xFF;
            cpu.a = r as u8;
        }

        Sec => cpu.flag_c = true,
        Sed => cpu.flag_d = true,
        Sei => cpu.flag_i = true,

        // unofficial: store masked by the high address byte plus one
        Shx => cpu.operand = cpu.x & ((cpu.address >> 8) as u8).wrapping_add(1),

        // unofficial
        Shy => cpu.operand = cpu.y & ((cpu.address >> 8) as u8).wrapping_add(1),

        // unofficial
        Slo => {
            let r = u32::from(cpu.operand) << 1;
            cpu.operand = r as u8;
            cpu.a |= cpu.operand;
            cpu.flag_z = cpu.a == 0;
            cpu.flag_n = cpu.a & 0x80 != 0;
            cpu.flag_c = r > 0xFF;
        }

        // unofficial
        Sre => {
            cpu.flag_c = cpu.operand & 0x01 != 0;
            cpu.operand >>= 1;
            cpu.a ^= cpu.operand;
            cpu.flag_z = cpu.a == 0;
            cpu.flag_n = cpu.a & 0x80 != 0;
        }

        Sta => cpu.operand = cpu.a,
        Stx => cpu.operand = cpu.x,
        Sty => cpu.operand = cpu.y,

        // unofficial: SP transfer happens, the unstable store does not
        Tas => cpu.sp = cpu.a & cpu.x,

        Tax => {
            cpu.x = cpu.a;
            cpu.flag_z = cpu.x == 0;
            cpu.flag_n = cpu.x & 0x80 != 0;
        }

        Tay => {
            cpu.y = cpu.a;
            cpu.flag_z = cpu.y == 0;
            cpu.flag_n = cpu.y & 0x80 != 0;
        }

        Tsx => {
            cpu.x = cpu.sp;
            cpu.flag_z = cpu.x == 0;
            cpu.flag_n = cpu.x & 0x80 != 0;
        }

        Txa => {
            cpu.a = cpu.x;
            cpu.flag_z = cpu.a == 0;
            cpu.flag_n = cpu.a & 0x80 != 0;
        }

        Txs => cpu.sp = cpu.x,

        Tya => {
            cpu.a = cpu.y;
            cpu.flag_z = cpu.a == 0;
            cpu.flag_n = cpu.a & 0x80 != 0;
        }

        // unofficial
        Xaa => {
            cpu.a = cpu.x & cpu.operand;
            cpu.flag_z = cpu.a == 0;
            cpu.flag_n = cpu.a & 0x80 != 0;
        }

        // Branches and jumps are resolved by the micro-sequence.
        Bcc | Bcs | Beq | Bmi | Bne | Bpl | Bvc | Bvs | Brk | Jmp | Jsr | Rti | Rts => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpu() -> Cpu {
        Cpu::new()
    }

    #[test]
    fn test_adc_signed_overflow() {
        let mut c = cpu();
        c.a = 0x7F;
        c.operand = 0x01;
        c.flag_c = false;
        operate(&mut c, Operation::Adc);
        assert_eq!(c.a, 0x80);
        assert!(c.flag_v);
        assert!(c.flag_n);
        assert!(!c.flag_z);
        assert!(!c.flag_c);
    }

    #[test]
    fn test_adc_carry_in_and_out() {
        let mut c = cpu();
        c.a = 0xFF;
        c.operand = 0x01;
        c.flag_c = true;
        operate(&mut c, Operation::Adc);
        assert_eq!(c.a, 0x01);
        assert!(c.flag_c);
        assert!(!c.flag_v);
    }

    #[test]
    fn test_sbc_borrow() {
        let mut c = cpu();
        c.a = 0x10;
        c.operand = 0x20;
        c.flag_c = true;
        operate(&mut c, Operation::Sbc);
        assert_eq!(c.a, 0xF0);
        assert!(!c.flag_c, "borrow clears carry");
        assert!(c.flag_n);
    }

    #[test]
    fn test_bit_flags() {
        let mut c = cpu();
        c.a = 0x00;
        c.operand = 0xC0;
        operate(&mut c, Operation::Bit);
        assert!(c.flag_n);
        assert!(c.flag_v);
        assert!(c.flag_z);
    }

    #[test]
    fn test_asl_carry_from_bit_7() {
        let mut c = cpu();
        c.operand = 0x80;
        operate(&mut c, Operation::Asl);
        assert_eq!(c.operand, 0x00);
        assert!(c.flag_c);
        assert!(c.flag_z);
    }

    #[test]
    fn test_ror_through_carry() {
        let mut c = cpu();
        c.operand = 0x01;
        c.flag_c = true;
        operate(&mut c, Operation::Ror);
        assert_eq!(c.operand, 0x80);
        assert!(c.flag_c);
        assert!(c.flag_n);
    }

    #[test]
    fn test_cmp_sets_carry_on_greater_equal() {
        let mut c = cpu();
        c.a = 0x40;
        c.operand = 0x40;
        operate(&mut c, Operation::Cmp);
        assert!(c.flag_c);
        assert!(c.flag_z);

        c.operand = 0x41;
        operate(&mut c, Operation::Cmp);
        assert!(!c.flag_c);
    }

    #[test]
    fn test_php_byte_layout() {
        let mut c = cpu();
        c.flag_n = true;
        c.flag_v = false;
        c.flag_b = true;
        c.flag_d = false;
        c.flag_i = true;
        c.flag_z = false;
        c.flag_c = true;
        operate(&mut c, Operation::Php);
        assert_eq!(c.operand, 0b1011_0101);
    }

    #[test]
    fn test_plp_forces_b() {
        let mut c = cpu();
        c.operand = 0x00;
        operate(&mut c, Operation::Plp);
        assert!(c.flag_b, "PLP restores flags but forces B set");
        assert!(!c.flag_n && !c.flag_v && !c.flag_z && !c.flag_c);
    }

    #[test]
    fn test_lax_loads_both_registers() {
        let mut c = cpu();
        c.operand = 0x9E;
        operate(&mut c, Operation::Lax);
        assert_eq!(c.a, 0x9E);
        assert_eq!(c.x, 0x9E);
        assert!(c.flag_n);
    }

    #[test]
    fn test_axs_subtracts_without_borrow() {
        let mut c = cpu();
        c.a = 0xF0;
        c.x = 0x0F;
        c.operand = 0x01;
        operate(&mut c, Operation::Axs);
        // X = (A & X) - operand = 0x00 - 0x01
        assert_eq!(c.x, 0xFF);
        assert!(!c.flag_c);
    }

    #[test]
    fn test_dcp_decrement_and_compare() {
        let mut c = cpu();
        c.a = 0x10;
        c.operand = 0x11;
        operate(&mut c, Operation::Dcp);
        assert_eq!(c.operand, 0x10);
        assert!(c.flag_z);
        assert!(c.flag_c);
    }

    #[test]
    fn test_kil_halts() {
        let mut c = cpu();
        operate(&mut c, Operation::Kil);
        assert!(c.halted);
    }

    #[test]
    fn test_shx_masks_with_address_high() {
        let mut c = cpu();
        c.x = 0xFF;
        c.address = 0x1234;
        operate(&mut c, Operation::Shx);
        assert_eq!(c.operand, 0x13);
    }
}
