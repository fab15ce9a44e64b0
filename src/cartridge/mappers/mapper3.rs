// Mapper 3 (CNROM) - switchable 8 KiB CHR bank
//
// Memory Layout:
// - CPU $8000-$FFFF: 16 or 32 KiB PRG ROM (fixed, 16 KiB mirrored)
// - PPU $0000-$1FFF: 8 KiB CHR ROM bank (switchable)
//
// Any CPU write to $8000-$FFFF selects the CHR bank.

use serde::{Deserialize, Serialize};

use super::{chr_byte, prg_rom_byte, read_ciram, write_ciram, MapperVariant};
use crate::machine::Machine;

/// CNROM banking state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cnrom {
    /// Bank select for PPU $0000-$1FFF
    pub chr_bank: u16,
}

fn state(m: &Machine) -> &Cnrom {
    match &m.mapper.variant {
        MapperVariant::Cnrom(s) => s,
        _ => unreachable!("mapper variant"),
    }
}

pub(super) fn read(m: &mut Machine, addr: u16) -> u8 {
    if addr >= 0x8000 {
        prg_rom_byte(m, u32::from(addr))
    } else if addr >= 0x4000 {
        // Unmapped.
        0
    } else if addr >= 0x2000 {
        read_ciram(m, addr)
    } else {
        let base = u32::from(state(m).chr_bank) * 8192;
        chr_byte(m, base + u32::from(addr))
    }
}

pub(super) fn write(m: &mut Machine, addr: u16, data: u8) {
    if addr >= 0x8000 {
        if let MapperVariant::Cnrom(s) = &mut m.mapper.variant {
            s.chr_bank = u16::from(data);
        }
    } else if addr >= 0x4000 {
        // Unmapped.
    } else if addr >= 0x2000 {
        write_ciram(m, addr, data);
    }
    // CHR is read only.
}

#[cfg(test)]
mod tests {
    use crate::cartridge::mappers;
    use crate::testutil::loaded_machine;

    #[test]
    fn test_chr_bank_switch() {
        let mut chr = Vec::new();
        for bank in 0..4u8 {
            chr.extend(std::iter::repeat(bank).take(8192));
        }
        let mut m = loaded_machine(3, &[0u8; 16 * 1024], &chr);

        assert_eq!(mappers::read(&mut m, 0x0000), 0);
        mappers::write(&mut m, 0x8000, 2);
        assert_eq!(mappers::read(&mut m, 0x0000), 2);
        assert_eq!(mappers::read(&mut m, 0x1FFF), 2);
    }

    #[test]
    fn test_prg_fixed() {
        let mut prg = vec![0u8; 16 * 1024];
        prg[0] = 0x77;
        let mut m = loaded_machine(3, &prg, &[0u8; 8192]);

        mappers::write(&mut m, 0x8000, 1);
        assert_eq!(mappers::read(&mut m, 0x8000), 0x77);
        assert_eq!(mappers::read(&mut m, 0xC000), 0x77, "16 KiB PRG mirrored");
    }
}
