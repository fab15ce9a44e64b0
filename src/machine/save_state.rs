// Save state functionality
//
// A versioned snapshot of the complete machine state, serialized as JSON.
// CPU, APU and mapper state serialize directly; the PPU and the memories
// go through an explicit snapshot struct so large arrays travel as byte
// vectors. Frame buffers are output-only and are not part of a state.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

use crate::apu::Apu;
use crate::cartridge::mappers::Mapper;
use crate::cpu::Cpu;
use crate::machine::Machine;
use crate::ppu::{Ppu, SpriteLine};

/// Current save state format version
const SAVE_STATE_VERSION: u32 = 1;

/// Errors that can occur during save state operations
#[derive(Debug)]
pub enum SaveStateError {
    /// I/O error
    Io(io::Error),

    /// Serialization/deserialization error
    Serialization(serde_json::Error),

    /// Save state version mismatch
    VersionMismatch { expected: u32, found: u32 },

    /// No cartridge loaded
    NoRomLoaded,

    /// State captured from a different cartridge
    RomMismatch,

    /// State contents are structurally invalid
    InvalidState(&'static str),
}

impl std::fmt::Display for SaveStateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaveStateError::Io(e) => write!(f, "I/O error: {}", e),
            SaveStateError::Serialization(e) => write!(f, "serialization error: {}", e),
            SaveStateError::VersionMismatch { expected, found } => {
                write!(f, "version mismatch: expected {}, found {}", expected, found)
            }
            SaveStateError::NoRomLoaded => write!(f, "no cartridge loaded"),
            SaveStateError::RomMismatch => write!(f, "state belongs to a different cartridge"),
            SaveStateError::InvalidState(what) => write!(f, "invalid state: {}", what),
        }
    }
}

impl std::error::Error for SaveStateError {}

impl From<io::Error> for SaveStateError {
    fn from(e: io::Error) -> Self {
        SaveStateError::Io(e)
    }
}

impl From<serde_json::Error> for SaveStateError {
    fn from(e: serde_json::Error) -> Self {
        SaveStateError::Serialization(e)
    }
}

/// Complete machine save state
#[derive(Debug, Serialize, Deserialize)]
pub struct SaveState {
    /// Format version
    version: u32,

    /// Capture time
    timestamp: String,

    /// Loaded image name, for validation
    rom_name: Option<String>,

    /// Master clock position
    master_cycle: u64,

    /// CPU open-bus latch
    open_bus: u8,

    /// Controller latches
    input_strobe: bool,
    input_shift: Vec<u8>,

    /// CPU state
    cpu: Cpu,

    /// APU state
    apu: Apu,

    /// Mapper state
    mapper: Mapper,

    /// PPU state
    ppu: PpuState,

    /// System RAM
    ram: Vec<u8>,

    /// Nametable RAM
    ciram: Vec<u8>,

    /// PRG RAM
    prg_ram: Vec<u8>,

    /// CHR RAM contents, when the cartridge has CHR RAM
    chr_ram: Option<Vec<u8>>,
}

/// PPU state snapshot
#[derive(Debug, Serialize, Deserialize)]
struct PpuState {
    master_cycle: u64,
    frame: u64,
    scan_y: u32,
    scan_x: u32,
    vblank_flag: bool,
    vblank_inhibit: bool,
    vblank_count: u64,
    v: u16,
    t: u16,
    x: u8,
    w: u8,
    increment_by_32: bool,
    nmi_output: bool,
    grayscale: bool,
    master_slave: u8,
    tint_mode: u8,
    oam_address: u8,
    read_buffer: u8,
    bus_data: u8,
    bus_refresh: Vec<u64>,
    background_enable: bool,
    background_left: bool,
    background_pattern_table: u8,
    tile_pattern_index: u8,
    tile_palette_index: u8,
    tile_pattern_l: u8,
    tile_pattern_h: u8,
    tile_color_data: u64,
    sprite_enable: bool,
    sprite_left: bool,
    sprite_pattern_table: u8,
    sprite_8x16: bool,
    sprite_overflow: bool,
    sprite_zero_hit: bool,
    sprite_count: u8,
    sprites: Vec<SpriteLine>,
    oam: Vec<u8>,
    palette: Vec<u8>,
}

impl PpuState {
    fn capture(ppu: &Ppu) -> Self {
        PpuState {
            master_cycle: ppu.master_cycle,
            frame: ppu.frame,
            scan_y: ppu.scan_y,
            scan_x: ppu.scan_x,
            vblank_flag: ppu.vblank_flag,
            vblank_inhibit: ppu.vblank_inhibit,
            vblank_count: ppu.vblank_count,
            v: ppu.v,
            t: ppu.t,
            x: ppu.x,
            w: ppu.w,
            increment_by_32: ppu.increment_by_32,
            nmi_output: ppu.nmi_output,
            grayscale: ppu.grayscale,
            master_slave: ppu.master_slave,
            tint_mode: ppu.tint_mode,
            oam_address: ppu.oam_address,
            read_buffer: ppu.read_buffer,
            bus_data: ppu.bus_data,
            bus_refresh: ppu.bus_refresh.to_vec(),
            background_enable: ppu.background_enable,
            background_left: ppu.background_left,
            background_pattern_table: ppu.background_pattern_table,
            tile_pattern_index: ppu.tile_pattern_index,
            tile_palette_index: ppu.tile_palette_index,
            tile_pattern_l: ppu.tile_pattern_l,
            tile_pattern_h: ppu.tile_pattern_h,
            tile_color_data: ppu.tile_color_data,
            sprite_enable: ppu.sprite_enable,
            sprite_left: ppu.sprite_left,
            sprite_pattern_table: ppu.sprite_pattern_table,
            sprite_8x16: ppu.sprite_8x16,
            sprite_overflow: ppu.sprite_overflow,
            sprite_zero_hit: ppu.sprite_zero_hit,
            sprite_count: ppu.sprite_count,
            sprites: ppu.sprites.to_vec(),
            oam: ppu.oam.to_vec(),
            palette: ppu.palette.to_vec(),
        }
    }

    fn validate(&self) -> Result<(), SaveStateError> {
        if self.bus_refresh.len() != 8 {
            return Err(SaveStateError::InvalidState("PPU bus refresh table"));
        }
        if self.sprites.len() != 8 {
            return Err(SaveStateError::InvalidState("PPU sprite list"));
        }
        if self.oam.len() != 256 {
            return Err(SaveStateError::InvalidState("PPU OAM"));
        }
        if self.palette.len() != 32 {
            return Err(SaveStateError::InvalidState("PPU palette RAM"));
        }
        Ok(())
    }

    fn apply(&self, ppu: &mut Ppu) {
        ppu.master_cycle = self.master_cycle;
        ppu.frame = self.frame;
        ppu.scan_y = self.scan_y;
        ppu.scan_x = self.scan_x;
        ppu.vblank_flag = self.vblank_flag;
        ppu.vblank_inhibit = self.vblank_inhibit;
        ppu.vblank_count = self.vblank_count;
        ppu.v = self.v;
        ppu.t = self.t;
        ppu.x = self.x;
        ppu.w = self.w;
        ppu.increment_by_32 = self.increment_by_32;
        ppu.nmi_output = self.nmi_output;
        ppu.grayscale = self.grayscale;
        ppu.master_slave = self.master_slave;
        ppu.tint_mode = self.tint_mode;
        ppu.oam_address = self.oam_address;
        ppu.read_buffer = self.read_buffer;
        ppu.bus_data = self.bus_data;
        ppu.bus_refresh.copy_from_slice(&self.bus_refresh);
        ppu.background_enable = self.background_enable;
        ppu.background_left = self.background_left;
        ppu.background_pattern_table = self.background_pattern_table;
        ppu.tile_pattern_index = self.tile_pattern_index;
        ppu.tile_palette_index = self.tile_palette_index;
        ppu.tile_pattern_l = self.tile_pattern_l;
        ppu.tile_pattern_h = self.tile_pattern_h;
        ppu.tile_color_data = self.tile_color_data;
        ppu.sprite_enable = self.sprite_enable;
        ppu.sprite_left = self.sprite_left;
        ppu.sprite_pattern_table = self.sprite_pattern_table;
        ppu.sprite_8x16 = self.sprite_8x16;
        ppu.sprite_overflow = self.sprite_overflow;
        ppu.sprite_zero_hit = self.sprite_zero_hit;
        ppu.sprite_count = self.sprite_count;
        ppu.sprites.copy_from_slice(&self.sprites);
        ppu.oam.copy_from_slice(&self.oam);
        ppu.palette.copy_from_slice(&self.palette);
    }
}

impl SaveState {
    /// Capture the complete state of a loaded machine
    pub fn capture(m: &Machine) -> Result<Self, SaveStateError> {
        if !m.loaded {
            return Err(SaveStateError::NoRomLoaded);
        }

        Ok(SaveState {
            version: SAVE_STATE_VERSION,
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            rom_name: m.rom_name.clone(),
            master_cycle: m.master_cycle,
            open_bus: m.open_bus,
            input_strobe: m.input_strobe,
            input_shift: m.input_shift.to_vec(),
            cpu: m.cpu.clone(),
            apu: m.apu.clone(),
            mapper: m.mapper.clone(),
            ppu: PpuState::capture(&m.ppu),
            ram: m.ram.clone(),
            ciram: m.ciram.clone(),
            prg_ram: m.prg_ram.clone(),
            chr_ram: if m.chr_is_ram {
                Some(m.chr.clone())
            } else {
                None
            },
        })
    }

    /// Restore this state onto a machine with the same cartridge loaded
    pub fn apply(&self, m: &mut Machine) -> Result<(), SaveStateError> {
        if !m.loaded {
            return Err(SaveStateError::NoRomLoaded);
        }
        if self.version != SAVE_STATE_VERSION {
            return Err(SaveStateError::VersionMismatch {
                expected: SAVE_STATE_VERSION,
                found: self.version,
            });
        }
        if let (Some(saved), Some(current)) = (&self.rom_name, &m.rom_name) {
            if saved != current {
                return Err(SaveStateError::RomMismatch);
            }
        }
        if self.ram.len() != 2048 {
            return Err(SaveStateError::InvalidState("system RAM"));
        }
        if self.ciram.len() != 2048 {
            return Err(SaveStateError::InvalidState("CIRAM"));
        }
        if self.prg_ram.len() != m.prg_ram.len() {
            return Err(SaveStateError::InvalidState("PRG RAM"));
        }
        if self.input_shift.len() != 2 {
            return Err(SaveStateError::InvalidState("controller latches"));
        }
        self.ppu.validate()?;
        if let Some(chr) = &self.chr_ram {
            if !m.chr_is_ram || chr.len() != m.chr.len() {
                return Err(SaveStateError::InvalidState("CHR RAM"));
            }
        }

        m.master_cycle = self.master_cycle;
        m.open_bus = self.open_bus;
        m.input_strobe = self.input_strobe;
        m.input_shift.copy_from_slice(&self.input_shift);
        m.cpu = self.cpu.clone();
        m.apu = self.apu.clone();
        m.apu.ring.clear();
        m.mapper = self.mapper.clone();
        self.ppu.apply(&mut m.ppu);
        m.ram.copy_from_slice(&self.ram);
        m.ciram.copy_from_slice(&self.ciram);
        m.prg_ram.copy_from_slice(&self.prg_ram);
        if let Some(chr) = &self.chr_ram {
            m.chr.copy_from_slice(chr);
        }

        Ok(())
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, SaveStateError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str) -> Result<Self, SaveStateError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write the state to a file as JSON
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), SaveStateError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Read a state back from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, SaveStateError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }
}

impl Machine {
    /// Capture a save state of the current machine
    pub fn save_state(&self) -> Result<SaveState, SaveStateError> {
        SaveState::capture(self)
    }

    /// Restore a previously captured save state
    pub fn restore_state(&mut self, state: &SaveState) -> Result<(), SaveStateError> {
        state.apply(self)
    }
}
