// Mapper 4 (MMC3) - fine-grained banking with a scanline IRQ counter
//
// Memory Layout:
// - CPU $6000-$7FFF: 8 KiB PRG RAM (enable/protect bits)
// - CPU $8000-$FFFF: four 8 KiB PRG ROM windows
// - PPU $0000-$1FFF: eight 1 KiB CHR windows
//
// Register Interface (CPU $8000-$FFFF, even/odd pairs):
// - $8000/$8001: bank control / bank data
// - $A000/$A001: mirroring / PRG RAM enable+protect
// - $C000/$C001: IRQ counter preset / clear+reload
// - $E000/$E001: IRQ disable / enable
//
// The IRQ counter is clocked by filtered PPU A12 rising edges, one per fetch
// scanline. When it clocks to zero with IRQ enabled, the machine's mapper IRQ
// hold counter is armed so the CPU sees the line asserted for a full polling
// window.

use serde::{Deserialize, Serialize};

use super::{chr_byte, prg_rom_byte, read_ciram, write_ciram, MapperEvent, MapperVariant};
use crate::cartridge::Mirroring;
use crate::machine::Machine;

/// Master-step count the mapper IRQ line stays asserted after triggering
const IRQ_HOLD_STEPS: u8 = 8;

/// MMC3 banking and IRQ state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mmc3 {
    /// Bank control register: next bank register index and layout bits
    pub bank_control: u8,
    /// Bank select registers R0-R7
    pub bank_register: [u8; 8],
    /// Computed PRG ROM offsets for the four 8 KiB CPU windows
    pub prg_map: [u32; 4],
    /// Computed CHR offsets for the eight 1 KiB PPU windows
    pub chr_map: [u32; 8],
    /// PRG RAM reads enabled
    pub prg_ram_enable: bool,
    /// PRG RAM writes disabled
    pub prg_ram_protect: bool,
    /// IRQ generation enabled
    pub irq_enable: bool,
    /// Reload the IRQ counter on the next A12 edge
    pub irq_counter_load: bool,
    /// IRQ counter reload value
    pub irq_counter_preset: u8,
    /// Current IRQ counter value
    pub irq_counter: u8,
}

fn state(m: &Machine) -> &Mmc3 {
    match &m.mapper.variant {
        MapperVariant::Mmc3(s) => s,
        _ => unreachable!("mapper variant"),
    }
}

fn state_mut(m: &mut Machine) -> &mut Mmc3 {
    match &mut m.mapper.variant {
        MapperVariant::Mmc3(s) => s,
        _ => unreachable!("mapper variant"),
    }
}

/// Recompute the PRG/CHR window offsets from the bank registers
fn compute_bank_maps(m: &mut Machine) {
    let prg_rom_size = m.prg_rom.len() as u32;
    let s = state_mut(m);

    if s.bank_control & 0x40 != 0 {
        // $8000 fixed to the second-to-last bank, $C000 switchable.
        s.prg_map[0] = prg_rom_size.saturating_sub(0x4000);
        s.prg_map[1] = u32::from(s.bank_register[7]) * 8192;
        s.prg_map[2] = u32::from(s.bank_register[6]) * 8192;
        s.prg_map[3] = prg_rom_size.saturating_sub(0x2000);
    } else {
        // $8000 switchable, $C000 fixed to the second-to-last bank.
        s.prg_map[0] = u32::from(s.bank_register[6]) * 8192;
        s.prg_map[1] = u32::from(s.bank_register[7]) * 8192;
        s.prg_map[2] = prg_rom_size.saturating_sub(0x4000);
        s.prg_map[3] = prg_rom_size.saturating_sub(0x2000);
    }

    if s.bank_control & 0x80 != 0 {
        // 1 KiB banks low, 2 KiB pairs high.
        s.chr_map[0] = u32::from(s.bank_register[2]) * 0x0400;
        s.chr_map[1] = u32::from(s.bank_register[3]) * 0x0400;
        s.chr_map[2] = u32::from(s.bank_register[4]) * 0x0400;
        s.chr_map[3] = u32::from(s.bank_register[5]) * 0x0400;
        s.chr_map[4] = u32::from(s.bank_register[0] & 0xFE) * 0x0400;
        s.chr_map[5] = u32::from(s.bank_register[0] | 0x01) * 0x0400;
        s.chr_map[6] = u32::from(s.bank_register[1] & 0xFE) * 0x0400;
        s.chr_map[7] = u32::from(s.bank_register[1] | 0x01) * 0x0400;
    } else {
        // 2 KiB pairs low, 1 KiB banks high.
        s.chr_map[0] = u32::from(s.bank_register[0] & 0xFE) * 0x0400;
        s.chr_map[1] = u32::from(s.bank_register[0] | 0x01) * 0x0400;
        s.chr_map[2] = u32::from(s.bank_register[1] & 0xFE) * 0x0400;
        s.chr_map[3] = u32::from(s.bank_register[1] | 0x01) * 0x0400;
        s.chr_map[4] = u32::from(s.bank_register[2]) * 0x0400;
        s.chr_map[5] = u32::from(s.bank_register[3]) * 0x0400;
        s.chr_map[6] = u32::from(s.bank_register[4]) * 0x0400;
        s.chr_map[7] = u32::from(s.bank_register[5]) * 0x0400;
    }
}

pub(super) fn reset(m: &mut Machine) {
    compute_bank_maps(m);
}

pub(super) fn read(m: &mut Machine, addr: u16) -> u8 {
    if addr >= 0x8000 {
        let base = state(m).prg_map[usize::from((addr >> 13) & 3)];
        prg_rom_byte(m, base + u32::from(addr & 0x1FFF))
    } else if addr >= 0x6000 {
        if state(m).prg_ram_enable {
            m.prg_ram[(addr & 0x1FFF) as usize]
        } else {
            0
        }
    } else if addr >= 0x4000 {
        // Unmapped.
        0
    } else if addr >= 0x2000 {
        read_ciram(m, addr)
    } else {
        let base = state(m).chr_map[usize::from((addr >> 10) & 7)];
        chr_byte(m, base + u32::from(addr & 0x03FF))
    }
}

pub(super) fn write(m: &mut Machine, addr: u16, data: u8) {
    if addr >= 0x8000 {
        match addr & 0xE001 {
            0x8000 => {
                state_mut(m).bank_control = data;
                compute_bank_maps(m);
            }
            0x8001 => {
                let s = state_mut(m);
                let index = usize::from(s.bank_control & 7);
                s.bank_register[index] = data;
                compute_bank_maps(m);
            }
            0xA000 => {
                m.mapper.mirroring = if data & 0x01 != 0 {
                    Mirroring::Horizontal
                } else {
                    Mirroring::Vertical
                };
            }
            0xA001 => {
                let s = state_mut(m);
                s.prg_ram_enable = data & 0x80 != 0;
                s.prg_ram_protect = data & 0x40 != 0;
            }
            0xC000 => state_mut(m).irq_counter_preset = data,
            0xC001 => {
                let s = state_mut(m);
                s.irq_counter = 0;
                s.irq_counter_load = true;
            }
            0xE000 => state_mut(m).irq_enable = false,
            _ => state_mut(m).irq_enable = true,
        }
    } else if addr >= 0x6000 {
        if !state(m).prg_ram_protect {
            m.prg_ram[(addr & 0x1FFF) as usize] = data;
        }
    } else if addr >= 0x4000 {
        // Unmapped.
    } else if addr >= 0x2000 {
        write_ciram(m, addr, data);
    }
    // CHR is read only.
}

pub(super) fn notify(m: &mut Machine, event: MapperEvent) {
    let MapperEvent::FilteredA12Edge = event;

    let triggered = {
        let s = state_mut(m);
        if s.irq_counter == 0 || s.irq_counter_load {
            s.irq_counter = s.irq_counter_preset;
            s.irq_counter_load = false;
        } else {
            s.irq_counter -= 1;
        }
        s.irq_enable && s.irq_counter == 0
    };

    if triggered {
        m.mapper.irq_trigger = IRQ_HOLD_STEPS;
    }
}
