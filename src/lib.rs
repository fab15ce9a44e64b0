// famicore - NES emulator core library
//
// The core is a single-threaded, cycle-coordinated machine: CPU, PPU, APU
// and cartridge mapper interleaved on a shared master clock, with all
// mutable state owned by one `Machine`. Hosts drive it one video frame at
// a time with `Machine::run_until_vertical_blank` and consume the frame
// buffer and audio ring between frames.

// Public modules
pub mod apu;
pub mod audio;
pub mod bus;
pub mod cartridge;
pub mod cpu;
pub mod debug;
pub mod input;
pub mod machine;
pub mod ppu;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export main types for convenience
pub use apu::Apu;
pub use audio::SampleRing;
pub use cartridge::{Cartridge, INesHeader, LoadError, Mirroring};
pub use cpu::Cpu;
pub use debug::TraceSink;
pub use input::{buttons, Controller};
pub use machine::{
    Machine, MachineConfig, SaveState, SaveStateError, ScreenshotError, FRAME_HEIGHT, FRAME_WIDTH,
};
pub use ppu::Ppu;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_components() {
        // An unloaded machine is inert but fully constructed.
        let machine = Machine::new();
        assert!(!machine.is_loaded());
        let _controller = Controller::new();
        let _ring = SampleRing::new();
    }
}
