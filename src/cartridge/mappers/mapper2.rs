// Mapper 2 (UxROM) - switchable 16 KiB PRG bank
//
// Memory Layout:
// - CPU $8000-$BFFF: 16 KiB PRG ROM bank (switchable)
// - CPU $C000-$FFFF: 16 KiB PRG ROM bank (fixed to the last bank)
// - PPU $0000-$1FFF: 8 KiB CHR RAM
//
// Any CPU write to $8000-$FFFF selects the switchable bank.

use serde::{Deserialize, Serialize};

use super::{chr_byte, chr_write, prg_rom_byte, read_ciram, write_ciram, MapperVariant};
use crate::machine::Machine;

/// UxROM banking state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Unrom {
    /// Bank select for CPU $8000-$BFFF
    pub prg_bank: u8,
}

fn state(m: &Machine) -> &Unrom {
    match &m.mapper.variant {
        MapperVariant::Unrom(s) => s,
        _ => unreachable!("mapper variant"),
    }
}

pub(super) fn read(m: &mut Machine, addr: u16) -> u8 {
    if addr >= 0xC000 {
        let base = (m.prg_rom.len() as u32).saturating_sub(0x4000);
        prg_rom_byte(m, base + u32::from(addr & 0x3FFF))
    } else if addr >= 0x8000 {
        let base = u32::from(state(m).prg_bank) * 0x4000;
        prg_rom_byte(m, base + u32::from(addr & 0x3FFF))
    } else if addr >= 0x4000 {
        // Unmapped.
        0
    } else if addr >= 0x2000 {
        read_ciram(m, addr)
    } else {
        chr_byte(m, u32::from(addr & 0x1FFF))
    }
}

pub(super) fn write(m: &mut Machine, addr: u16, data: u8) {
    if addr >= 0x8000 {
        if let MapperVariant::Unrom(s) = &mut m.mapper.variant {
            s.prg_bank = data;
        }
    } else if addr >= 0x4000 {
        // Unmapped.
    } else if addr >= 0x2000 {
        write_ciram(m, addr, data);
    } else {
        chr_write(m, u32::from(addr & 0x1FFF), data);
    }
}
