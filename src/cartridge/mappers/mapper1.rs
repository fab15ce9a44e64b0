// Mapper 1 (MMC1) - serial-loaded banking
//
// Memory Layout:
// - CPU $6000-$7FFF: 8 KiB PRG RAM
// - CPU $8000-$BFFF: 16 KiB PRG ROM bank (switchable or fixed by mode)
// - CPU $C000-$FFFF: 16 KiB PRG ROM bank (switchable or fixed by mode)
// - PPU $0000-$0FFF: 4 KiB CHR bank 0
// - PPU $1000-$1FFF: 4 KiB CHR bank 1
//
// All register writes go through a serial load register: bit 0 of each CPU
// write to $8000-$FFFF is shifted in LSB first; the fifth write latches the
// accumulated 5-bit value into the register selected by the address. A write
// with bit 7 set resets the shift register and forces control |= 0x0C
// (fix-last PRG mode).

use serde::{Deserialize, Serialize};

use super::{chr_byte, chr_write, prg_rom_byte, read_ciram, write_ciram, MapperVariant};
use crate::cartridge::Mirroring;
use crate::machine::Machine;

/// MMC1 banking state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mmc1 {
    /// Serial load register shift count
    pub load_count: u8,
    /// Serial load register value
    pub load_register: u8,
    /// Control register: PRG/CHR bank modes and mirroring
    pub control: u8,
    /// CHR bank for PPU $0000-$0FFF
    pub chr_bank_0: u8,
    /// CHR bank for PPU $1000-$1FFF
    pub chr_bank_1: u8,
    /// PRG bank register
    pub prg_bank: u8,
    /// Computed PRG ROM offsets for the two 16 KiB CPU windows
    pub prg_map: [u32; 2],
    /// Computed CHR offsets for the two 4 KiB PPU windows
    pub chr_map: [u32; 2],
}

fn state(m: &Machine) -> &Mmc1 {
    match &m.mapper.variant {
        MapperVariant::Mmc1(s) => s,
        _ => unreachable!("mapper variant"),
    }
}

fn state_mut(m: &mut Machine) -> &mut Mmc1 {
    match &mut m.mapper.variant {
        MapperVariant::Mmc1(s) => s,
        _ => unreachable!("mapper variant"),
    }
}

/// Recompute the PRG/CHR window offsets from the bank registers
fn compute_bank_maps(m: &mut Machine) {
    let prg_rom_size = m.prg_rom.len() as u32;
    let s = state_mut(m);

    match (s.control >> 2) & 3 {
        0 | 1 => {
            // 32 KiB switch, low bit of the bank number ignored.
            s.prg_map[0] = u32::from(s.prg_bank & 0xFE) * 0x4000;
            s.prg_map[1] = u32::from(s.prg_bank | 0x01) * 0x4000;
        }
        2 => {
            // First bank fixed at $8000, switch at $C000.
            s.prg_map[0] = 0;
            s.prg_map[1] = u32::from(s.prg_bank) * 0x4000;
        }
        _ => {
            // Switch at $8000, last bank fixed at $C000.
            s.prg_map[0] = u32::from(s.prg_bank) * 0x4000;
            s.prg_map[1] = prg_rom_size.saturating_sub(0x4000);
        }
    }

    if (s.control >> 4) & 1 != 0 {
        // Two independent 4 KiB CHR banks.
        s.chr_map[0] = u32::from(s.chr_bank_0) * 4096;
        s.chr_map[1] = u32::from(s.chr_bank_1) * 4096;
    } else {
        // One 8 KiB CHR bank, low bit ignored.
        s.chr_map[0] = u32::from(s.chr_bank_0 & 0xFE) * 4096;
        s.chr_map[1] = u32::from(s.chr_bank_0 | 0x01) * 4096;
    }
}

pub(super) fn reset(m: &mut Machine) {
    let s = state_mut(m);
    s.load_count = 0;
    s.control = 0x0C;
    compute_bank_maps(m);
}

pub(super) fn read(m: &mut Machine, addr: u16) -> u8 {
    if addr >= 0x8000 {
        let base = state(m).prg_map[usize::from((addr >> 14) & 1)];
        prg_rom_byte(m, base + u32::from(addr & 0x3FFF))
    } else if addr >= 0x6000 {
        m.prg_ram[(addr & 0x1FFF) as usize]
    } else if addr >= 0x4000 {
        // Unmapped.
        0
    } else if addr >= 0x2000 {
        read_ciram(m, addr)
    } else {
        let base = state(m).chr_map[usize::from((addr >> 12) & 1)];
        chr_byte(m, base + u32::from(addr & 0x0FFF))
    }
}

pub(super) fn write(m: &mut Machine, addr: u16, data: u8) {
    if addr >= 0x8000 {
        if data & 0x80 != 0 {
            reset(m);
            return;
        }

        let value = {
            let s = state_mut(m);
            s.load_register = (s.load_register >> 1) | (data & 1) << 4;
            s.load_count += 1;
            if s.load_count < 5 {
                return;
            }
            s.load_count = 0;
            s.load_register
        };

        match addr & 0xE000 {
            0x8000 => {
                state_mut(m).control = value;
                m.mapper.mirroring = match value & 3 {
                    // Single-screen modes fall back to the closest
                    // two-screen arrangement.
                    2 => Mirroring::Vertical,
                    _ => Mirroring::Horizontal,
                };
            }
            0xA000 => state_mut(m).chr_bank_0 = value,
            0xC000 => state_mut(m).chr_bank_1 = value,
            _ => state_mut(m).prg_bank = value & 0x0F,
        }
        compute_bank_maps(m);
    } else if addr >= 0x6000 {
        m.prg_ram[(addr & 0x1FFF) as usize] = data;
    } else if addr >= 0x4000 {
        // Unmapped.
    } else if addr >= 0x2000 {
        write_ciram(m, addr, data);
    } else {
        let base = state(m).chr_map[usize::from((addr >> 12) & 1)];
        chr_write(m, base + u32::from(addr & 0x0FFF), data);
    }
}
