// Machine module - the cycle-coordinated core
//
// `Machine` owns every piece of mutable state: CPU, PPU, APU, mapper, both
// memory spaces and the controller latches. Sub-units are advanced by free
// functions borrowing the machine, interleaved on a fixed master schedule:
//
// ```text
// master 0: PPU dot, APU cycle, CPU sub-cycle
// master 4: PPU dot
// master 6: sample NMI/IRQ lines, CPU phase-2 edge detectors
// master 8: PPU dot
// master 12: commit master cycles, decay the mapper IRQ hold counter
// ```
//
// Twelve master cycles therefore carry three PPU dots and one CPU/APU
// cycle; the host drives whole frames with `run_until_vertical_blank`.

pub mod config;
pub mod save_state;
pub mod screenshot;

use std::fs;
use std::path::Path;

use crate::apu::{self, Apu};
use crate::bus;
use crate::cartridge::mappers::{self, Mapper};
use crate::cartridge::{Cartridge, LoadError};
use crate::cpu::{self, Cpu};
use crate::debug::TraceSink;
use crate::ppu::{self, Ppu};

pub use crate::ppu::constants::{FRAME_HEIGHT, FRAME_WIDTH};
pub use config::MachineConfig;
pub use save_state::{SaveState, SaveStateError};
pub use screenshot::ScreenshotError;

/// The emulated console
pub struct Machine {
    /// Current master clock cycle
    pub master_cycle: u64,

    /// CPU state
    pub cpu: Cpu,
    /// PPU state
    pub ppu: Ppu,
    /// APU state
    pub apu: Apu,
    /// Cartridge mapper state
    pub mapper: Mapper,

    /// Core configuration
    pub config: MachineConfig,

    /// 2 KiB system RAM
    pub(crate) ram: Vec<u8>,
    /// 2 KiB PPU internal RAM (nametables)
    pub(crate) ciram: Vec<u8>,
    /// PRG RAM (at least 8 KiB)
    pub(crate) prg_ram: Vec<u8>,
    /// PRG ROM
    pub(crate) prg_rom: Vec<u8>,
    /// CHR ROM or CHR RAM
    pub(crate) chr: Vec<u8>,
    /// CHR is writable RAM
    pub(crate) chr_is_ram: bool,

    /// Current button bytes per port
    pub(crate) input: [u8; 2],
    /// Controller strobe latch
    pub(crate) input_strobe: bool,
    /// Controller shift registers
    pub(crate) input_shift: [u8; 2],

    /// CPU open-bus latch
    pub(crate) open_bus: u8,

    /// Cartridge has battery-backed PRG RAM
    pub(crate) battery: bool,
    /// Name of the loaded image file, for save-state validation
    pub(crate) rom_name: Option<String>,
    /// Cartridge loaded and ready to run
    pub(crate) loaded: bool,

    /// Optional per-instruction trace sink
    pub(crate) trace: Option<TraceSink>,
}

impl Machine {
    /// Create an unloaded machine with default configuration
    pub fn new() -> Self {
        Machine {
            master_cycle: 0,
            cpu: Cpu::new(),
            ppu: Ppu::new(),
            apu: Apu::new(),
            mapper: Mapper::none(),
            config: MachineConfig::default(),
            ram: vec![0; 2048],
            ciram: vec![0; 2048],
            prg_ram: vec![0; 8192],
            prg_rom: Vec::new(),
            chr: vec![0; 8192],
            chr_is_ram: true,
            input: [0; 2],
            input_strobe: false,
            input_shift: [0; 2],
            open_bus: 0,
            battery: false,
            rom_name: None,
            loaded: false,
            trace: None,
        }
    }

    /// Create an unloaded machine from a configuration
    ///
    /// Applies the audio sample rate and, when configured, opens the trace
    /// sink. A trace file that cannot be created is ignored: tracing never
    /// influences the machine.
    pub fn with_config(config: MachineConfig) -> Self {
        let mut machine = Machine::new();
        machine.apu.sample_rate = config.audio.sample_rate;
        if config.trace.enabled {
            machine.trace = TraceSink::create(&config.trace.path).ok();
        }
        machine.config = config;
        machine
    }

    /// True when a cartridge is loaded
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// System RAM contents
    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    /// True when the loaded cartridge declares battery-backed PRG RAM
    pub fn has_battery(&self) -> bool {
        self.battery
    }

    /// PRG RAM contents (the host persists this for battery carts)
    pub fn prg_ram(&self) -> &[u8] {
        &self.prg_ram
    }

    /// Parse an iNES file and bind it to the machine
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<(), LoadError> {
        let data = fs::read(&path)?;
        let name = path
            .as_ref()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        self.load_bytes(&data)?;
        self.rom_name = name;
        Ok(())
    }

    /// Parse an iNES image from memory and bind it to the machine
    pub fn load_bytes(&mut self, data: &[u8]) -> Result<(), LoadError> {
        self.unload();

        let cart = Cartridge::parse(data)?;
        let variant = mappers::create(cart.header.mapper)
            .ok_or(LoadError::UnsupportedMapper(cart.header.mapper))?;

        self.mapper = Mapper {
            id: cart.header.mapper,
            mirroring: cart.header.mirroring,
            irq_trigger: 0,
            variant,
        };
        self.prg_rom = cart.prg_rom;
        self.chr = cart.chr;
        self.chr_is_ram = cart.chr_is_ram;
        self.prg_ram = vec![0; cart.prg_ram_size];
        self.battery = cart.header.battery;
        self.loaded = true;

        self.reset();
        Ok(())
    }

    /// Release all cartridge-derived buffers and return to the unloaded state
    ///
    /// Configuration, the trace sink and the audio sample rate survive.
    pub fn unload(&mut self) {
        let config = self.config.clone();
        let trace = self.trace.take();
        let sample_rate = self.apu.sample_rate;

        *self = Machine::new();

        self.config = config;
        self.trace = trace;
        self.apu.sample_rate = sample_rate;
    }

    /// Hardware reset
    ///
    /// Parks the PPU on the pre-render line with cleared scroll state,
    /// reseeds the noise generator, re-enters the CPU reset micro-sequence
    /// and runs the mapper's reset hook. Safe to call repeatedly.
    pub fn reset(&mut self) {
        mappers::reset(self);

        let ppu = &mut self.ppu;
        ppu.background_pattern_table = 0;
        ppu.sprite_pattern_table = 0;
        ppu.sprite_8x16 = false;
        ppu.increment_by_32 = false;
        ppu.master_slave = 0;
        ppu.nmi_output = false;
        ppu.oam_address = 0;
        ppu.v = 0;
        ppu.t = 0;
        ppu.x = 0;
        ppu.w = 0;
        ppu.frame = 0;
        ppu.scan_y = 261;
        ppu.scan_x = 0;

        self.apu.ring.clear();
        self.apu.noise.register = 0x0001;

        self.cpu.state = 0;
        self.cpu.halted = false;
        self.cpu.interrupt = crate::cpu::Interrupt::None;
    }

    /// Run the master loop until the PPU's vblank counter increments
    pub fn run_until_vertical_blank(&mut self) {
        let target = self.ppu.vblank_count;

        while self.ppu.vblank_count == target {
            self.step_master();
        }
    }

    /// Advance the machine by one 12-cycle master step
    ///
    /// Carries three PPU dots and one CPU/APU cycle with the fixed
    /// sub-phase described in the module header. Useful for debuggers
    /// that need sub-frame stepping.
    pub fn step_master(&mut self) {
        if self.input_strobe {
            self.input_shift = self.input;
        }

        // Master cycle 0
        ppu::step(self);
        apu::step(self);
        cpu::step(self);

        // Master cycle 4
        ppu::step(self);

        // Master cycle 6: latch the interrupt lines into the CPU
        self.cpu.nmi_line = self.ppu.vblank_flag && self.ppu.nmi_output;
        self.cpu.irq_line = self.mapper.irq_trigger > 0 || self.apu.irq_asserted();
        cpu::step_phase2(self);

        // Master cycle 8
        ppu::step(self);

        // Master cycle 12
        self.master_cycle += 12;

        if self.mapper.irq_trigger > 0 {
            self.mapper.irq_trigger -= 1;
        }
    }

    /// Set the button byte for a controller port (see [`crate::input::buttons`])
    pub fn set_buttons(&mut self, port: usize, state: u8) {
        if port < 2 {
            self.input[port] = state;
        }
    }

    /// The most recently completed 256x240 frame, packed 0xAARRGGBB
    pub fn frame(&self) -> &[u32] {
        self.ppu.finished_frame()
    }

    /// Move buffered audio samples into `out`, oldest first
    pub fn drain_audio(&mut self, out: &mut Vec<u8>) {
        self.apu.ring.drain_into(out);
    }

    /// Adjust the audio output rate (host back-pressure control)
    pub fn set_sample_rate(&mut self, rate: f64) {
        self.apu.sample_rate = rate;
    }

    /// Start tracing executed instructions to a text file
    pub fn set_trace_file<P: AsRef<Path>>(&mut self, path: P) -> std::io::Result<()> {
        self.trace = Some(TraceSink::create(path)?);
        Ok(())
    }

    /// Stop tracing
    pub fn clear_trace(&mut self) {
        self.trace = None;
    }

    /// Read a byte from the CPU bus (debugger access, has bus side effects)
    pub fn bus_read(&mut self, addr: u16) -> u8 {
        bus::read(self, addr)
    }

    /// Write a byte to the CPU bus (debugger access)
    pub fn bus_write(&mut self, addr: u16, data: u8) {
        bus::write(self, addr, data);
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{build_ines, loaded_machine, nop_rom};

    #[test]
    fn test_new_machine_is_unloaded() {
        let m = Machine::new();
        assert!(!m.is_loaded());
        assert!(m.prg_rom.is_empty());
    }

    #[test]
    fn test_load_bytes_binds_mapper_and_resets() {
        let mut m = Machine::new();
        m.load_bytes(&build_ines(0, 1, 1, &[], &[])).unwrap();
        assert!(m.is_loaded());
        assert_eq!(m.mapper.id, 0);
        assert_eq!(m.ppu.scan_y, 261);
        assert_eq!(m.apu.noise.register, 1);
    }

    #[test]
    fn test_load_rejects_bad_images() {
        let mut m = Machine::new();
        assert!(m.load_bytes(&[0u8; 4]).is_err());
        assert!(!m.is_loaded(), "failed load leaves the machine unloaded");
    }

    #[test]
    fn test_unload_preserves_sample_rate() {
        let mut m = loaded_machine(0, &[0u8; 16 * 1024], &[0u8; 8192]);
        m.set_sample_rate(48_000.0);
        m.unload();
        assert!(!m.is_loaded());
        assert_eq!(m.apu.sample_rate, 48_000.0);
    }

    #[test]
    fn test_run_until_vertical_blank_advances_one_frame() {
        let mut m = Machine::new();
        m.load_bytes(&nop_rom()).unwrap();

        m.run_until_vertical_blank();
        assert_eq!(m.ppu.vblank_count, 1);
        assert!(m.ppu.frame <= 1);

        // The first frame starts from the pre-render line; steady-state
        // frames are 262 lines = 89342 dots = ~29781 CPU cycles.
        let first = m.cpu.cycle;
        assert!(
            (27_000..31_000).contains(&first),
            "unexpected cycle count {}",
            first
        );

        m.run_until_vertical_blank();
        let delta = m.cpu.cycle - first;
        assert!(
            (29_700..29_900).contains(&delta),
            "unexpected frame length {}",
            delta
        );
    }

    #[test]
    fn test_master_cycle_advances_in_twelves() {
        let mut m = Machine::new();
        m.load_bytes(&nop_rom()).unwrap();
        m.run_until_vertical_blank();
        assert_eq!(m.master_cycle % 12, 0);
    }

    #[test]
    fn test_cpu_executes_rom_program() {
        // LDA #$42, STA $0000, JMP back onto the STA in a loop.
        let mut prg = vec![0xEA; 16 * 1024];
        prg[0] = 0xA9; // LDA #$42
        prg[1] = 0x42;
        prg[2] = 0x8D; // STA $0000
        prg[3] = 0x00;
        prg[4] = 0x00;
        // Reset vector -> $8000.
        prg[0x3FFC] = 0x00;
        prg[0x3FFD] = 0x80;

        let mut m = loaded_machine(0, &prg, &[0u8; 8192]);
        m.run_until_vertical_blank();
        assert_eq!(m.cpu.a, 0x42);
        assert_eq!(m.ram()[0], 0x42);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut m = Machine::new();
        m.load_bytes(&nop_rom()).unwrap();
        m.run_until_vertical_blank();
        m.reset();
        m.reset();
        assert_eq!(m.ppu.scan_y, 261);
        assert_eq!(m.ppu.v, 0);
    }
}
