// Test support - synthesized iNES images
//
// Unit tests build cartridges in memory instead of shipping ROM files.

use crate::machine::Machine;

/// Build an iNES image with the given mapper and contents
///
/// `prg`/`chr` are copied into the front of the declared banks; the rest
/// is zero filled. `chr_banks == 0` declares CHR RAM.
pub(crate) fn build_ines(mapper: u8, prg_banks: u8, chr_banks: u8, prg: &[u8], chr: &[u8]) -> Vec<u8> {
    let mut image = Vec::new();
    image.extend_from_slice(b"NES\x1A");
    image.push(prg_banks);
    image.push(chr_banks);
    image.push(mapper << 4); // flags 6: mapper low nibble, horizontal mirroring
    image.push(mapper & 0xF0); // flags 7: mapper high nibble
    image.push(0); // PRG RAM banks (0 = 8 KiB)
    image.extend_from_slice(&[0; 7]);

    let prg_size = usize::from(prg_banks) * 16 * 1024;
    let mut prg_data = prg.to_vec();
    prg_data.resize(prg_size, 0);
    image.extend_from_slice(&prg_data);

    let chr_size = usize::from(chr_banks) * 8 * 1024;
    let mut chr_data = chr.to_vec();
    chr_data.resize(chr_size, 0);
    image.extend_from_slice(&chr_data);

    image
}

/// Load a machine with a synthesized cartridge
///
/// Bank counts are derived from the slice lengths; an empty `chr` slice
/// selects CHR RAM.
pub(crate) fn loaded_machine(mapper: u8, prg: &[u8], chr: &[u8]) -> Machine {
    let prg_banks = ((prg.len() + 16383) / 16384).max(1) as u8;
    let chr_banks = ((chr.len() + 8191) / 8192) as u8;
    let image = build_ines(mapper, prg_banks, chr_banks, prg, chr);

    let mut machine = Machine::new();
    machine
        .load_bytes(&image)
        .expect("synthesized image must load");
    machine
}

/// A mapper-0 image whose PRG is all NOPs with the reset vector at $8000
pub(crate) fn nop_rom() -> Vec<u8> {
    let mut prg = vec![0xEA; 16 * 1024];
    prg[0x3FFC] = 0x00;
    prg[0x3FFD] = 0x80;
    build_ines(0, 1, 1, &prg, &[])
}
