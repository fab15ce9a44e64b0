// Configuration management
//
// Core settings the host may want to persist: audio output rate, timing
// approximations, and trace output. Serialized as TOML.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineConfig {
    /// Audio settings
    pub audio: AudioConfig,

    /// Timing approximations
    pub timing: TimingConfig,

    /// Instruction trace settings
    pub trace: TraceConfig,
}

/// Audio configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Output sample rate in Hz
    pub sample_rate: f64,
}

/// Timing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Report filtered PPU A12 edges at dot 260 of fetch lines
    ///
    /// This drives MMC3-style scanline IRQ counters. The per-dot pattern
    /// bus is not emulated, so the edge timing is an approximation; turn
    /// it off to deliver only the `$2006`-write edges.
    pub a12_filter: bool,
}

/// Trace configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceConfig {
    /// Open the trace sink at machine creation
    pub enabled: bool,

    /// Trace output file
    pub path: PathBuf,
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig {
            audio: AudioConfig {
                sample_rate: 44_100.0,
            },
            timing: TimingConfig { a12_filter: true },
            trace: TraceConfig {
                enabled: false,
                path: PathBuf::from("trace.txt"),
            },
        }
    }
}

impl MachineConfig {
    /// Load configuration from a TOML file
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, io::Error> {
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Save configuration to a TOML file
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), io::Error> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MachineConfig::default();
        assert_eq!(config.audio.sample_rate, 44_100.0);
        assert!(config.timing.a12_filter);
        assert!(!config.trace.enabled);
    }

    #[test]
    fn test_config_round_trip() {
        let mut config = MachineConfig::default();
        config.audio.sample_rate = 48_000.0;
        config.timing.a12_filter = false;

        let toml_str = toml::to_string(&config).expect("serialize");
        let parsed: MachineConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.audio.sample_rate, 48_000.0);
        assert!(!parsed.timing.a12_filter);
    }
}
