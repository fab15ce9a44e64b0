// Common test utilities for machine-level integration tests
//
// Builds iNES images in memory so the suite does not depend on ROM files.

#![allow(dead_code)]

use famicore::Machine;

/// Build an iNES image with the given mapper and contents
///
/// `prg`/`chr` are copied into the front of the declared banks; the rest
/// is zero filled. `chr_banks == 0` declares CHR RAM.
pub fn build_ines(mapper: u8, prg_banks: u8, chr_banks: u8, prg: &[u8], chr: &[u8]) -> Vec<u8> {
    let mut image = Vec::new();
    image.extend_from_slice(b"NES\x1A");
    image.push(prg_banks);
    image.push(chr_banks);
    image.push(mapper << 4);
    image.push(mapper & 0xF0);
    image.push(0);
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

/// A 16 KiB mapper-0 PRG bank with vectors pointing at $8000
///
/// The program bytes land at $8000; everything else is NOP. The NMI and
/// IRQ vectors point at $FF00 unless the program overwrites them.
pub struct ProgramBuilder {
    prg: Vec<u8>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        ProgramBuilder {
            prg: vec![0xEA; 16 * 1024],
        }
    }

    /// Place bytes at a CPU address within $8000-$BFFF
    pub fn at(mut self, addr: u16, bytes: &[u8]) -> Self {
        let offset = usize::from(addr - 0x8000);
        self.prg[offset..offset + bytes.len()].copy_from_slice(bytes);
        self
    }

    /// Set the reset vector
    pub fn reset_vector(self, addr: u16) -> Self {
        let bytes = addr.to_le_bytes();
        self.at(0xBFFC, &bytes)
    }

    /// Set the NMI vector
    pub fn nmi_vector(self, addr: u16) -> Self {
        let bytes = addr.to_le_bytes();
        self.at(0xBFFA, &bytes)
    }

    /// Set the IRQ/BRK vector
    pub fn irq_vector(self, addr: u16) -> Self {
        let bytes = addr.to_le_bytes();
        self.at(0xBFFE, &bytes)
    }

    /// Build a loaded mapper-0 machine
    pub fn load(self, mapper: u8) -> Machine {
        let image = build_ines(mapper, 1, 1, &self.prg, &[]);
        let mut machine = Machine::new();
        machine.load_bytes(&image).expect("test image must load");
        machine
    }
}

impl Default for ProgramBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Step whole master cycles until the CPU fetches from `addr`, returning
/// the CPU cycle count at that fetch
///
/// Panics if the fetch does not happen within `limit` steps.
pub fn run_to_fetch(machine: &mut Machine, addr: u16, limit: u32) -> u64 {
    for _ in 0..limit {
        machine.step_master();
        if machine.cpu.instruction_pc == addr {
            return machine.cpu.cycle;
        }
    }
    panic!("CPU never fetched from {:04X}", addr);
}

/// Step whole master cycles until the CPU halts on a KIL opcode
pub fn run_to_halt(machine: &mut Machine, limit: u32) {
    for _ in 0..limit {
        machine.step_master();
        if machine.cpu.halted {
            return;
        }
    }
    panic!("CPU never halted");
}
