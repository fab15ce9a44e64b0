// Cartridge module - iNES image parsing
//
// Parses the 16-byte iNES header and splits the image into PRG ROM and
// CHR ROM/RAM blobs. Mapper numbers the core does not implement are
// rejected. Trainers and NES 2.0 extensions are not detected: those
// header bits are ignored and the image is parsed as plain iNES.
//
// # iNES Header Layout
//
// ```text
// 0-3: Magic "NES\x1A"
// 4:   PRG ROM size in 16 KiB units
// 5:   CHR ROM size in 8 KiB units (0 = cartridge has CHR RAM)
// 6:   Bit 0: mirroring (0 = horizontal, 1 = vertical)
//      Bit 1: battery-backed PRG RAM
//      Bits 4-7: mapper number, low nibble
// 7:   Bits 4-7: mapper number, high nibble
// 8:   PRG RAM size in 8 KiB units (0 = 8 KiB)
// 9-15: padding
// ```

pub mod mappers;

use std::fmt;
use std::io;

pub use mappers::{Mapper, MapperEvent, MapperVariant};

/// Size of the iNES header in bytes
pub const INES_HEADER_SIZE: usize = 16;

/// iNES magic number: "NES" followed by MS-DOS end-of-file
const INES_MAGIC: [u8; 4] = [b'N', b'E', b'S', 0x1A];

/// PRG ROM bank unit (16 KiB)
const PRG_BANK_UNIT: usize = 16 * 1024;

/// CHR bank unit (8 KiB)
const CHR_BANK_UNIT: usize = 8 * 1024;

/// PRG RAM unit (8 KiB)
const PRG_RAM_UNIT: usize = 8 * 1024;

/// Errors that can occur while loading a cartridge image
#[derive(Debug)]
pub enum LoadError {
    /// I/O error while reading the image file
    Io(io::Error),

    /// Image is shorter than the declared contents
    ShortRead,

    /// The magic number is not "NES\x1A"
    BadMagic,

    /// The image requires a mapper the core does not implement
    UnsupportedMapper(u8),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Io(e) => write!(f, "I/O error: {}", e),
            LoadError::ShortRead => write!(f, "image is shorter than its header declares"),
            LoadError::BadMagic => write!(f, "not an iNES image (bad magic)"),
            LoadError::UnsupportedMapper(id) => write!(f, "mapper {} is not supported", id),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<io::Error> for LoadError {
    fn from(e: io::Error) -> Self {
        LoadError::Io(e)
    }
}

/// CIRAM mirroring arrangement selected by the cartridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Mirroring {
    /// $2000 = $2400, $2800 = $2C00
    Horizontal,
    /// $2000 = $2800, $2400 = $2C00
    Vertical,
}

/// Parsed iNES header
#[derive(Debug, Clone, Copy)]
pub struct INesHeader {
    /// PRG ROM size in 16 KiB units
    pub prg_banks: u8,
    /// CHR ROM size in 8 KiB units (0 = CHR RAM)
    pub chr_banks: u8,
    /// Mapper number
    pub mapper: u8,
    /// Nametable mirroring
    pub mirroring: Mirroring,
    /// Cartridge has battery-backed PRG RAM
    pub battery: bool,
    /// PRG RAM size in 8 KiB units (0 = 8 KiB)
    pub prg_ram_banks: u8,
}

impl INesHeader {
    /// Parse the first 16 bytes of an iNES image
    pub fn parse(data: &[u8]) -> Result<Self, LoadError> {
        if data.len() < INES_HEADER_SIZE {
            return Err(LoadError::ShortRead);
        }
        if data[0..4] != INES_MAGIC {
            return Err(LoadError::BadMagic);
        }

        let flags6 = data[6];
        let flags7 = data[7];

        Ok(INesHeader {
            prg_banks: data[4],
            chr_banks: data[5],
            mapper: (flags6 >> 4) | (flags7 & 0xF0),
            mirroring: if flags6 & 0x01 != 0 {
                Mirroring::Vertical
            } else {
                Mirroring::Horizontal
            },
            battery: flags6 & 0x02 != 0,
            prg_ram_banks: data[8],
        })
    }
}

/// A parsed cartridge: header fields plus the PRG and CHR blobs
///
/// The blobs are moved into the `Machine` on load; the cartridge itself is
/// a transient parsing product.
pub struct Cartridge {
    /// Parsed header
    pub header: INesHeader,
    /// PRG ROM contents
    pub prg_rom: Vec<u8>,
    /// CHR contents: ROM as declared, or zeroed 8 KiB of CHR RAM
    pub chr: Vec<u8>,
    /// True when `chr` is writable CHR RAM
    pub chr_is_ram: bool,
    /// PRG RAM size in bytes (at least 8 KiB)
    pub prg_ram_size: usize,
}

impl Cartridge {
    /// Parse a full iNES image from memory
    ///
    /// Validates the header, checks the mapper against the supported set,
    /// and splits out the PRG and CHR contents.
    pub fn parse(data: &[u8]) -> Result<Self, LoadError> {
        let header = INesHeader::parse(data)?;

        if !mappers::is_supported(header.mapper) {
            return Err(LoadError::UnsupportedMapper(header.mapper));
        }

        let prg_size = header.prg_banks as usize * PRG_BANK_UNIT;
        let prg_start = INES_HEADER_SIZE;
        let prg_end = prg_start + prg_size;
        if data.len() < prg_end {
            return Err(LoadError::ShortRead);
        }
        let prg_rom = data[prg_start..prg_end].to_vec();

        let (chr, chr_is_ram) = if header.chr_banks > 0 {
            let chr_size = header.chr_banks as usize * CHR_BANK_UNIT;
            let chr_end = prg_end + chr_size;
            if data.len() < chr_end {
                return Err(LoadError::ShortRead);
            }
            (data[prg_end..chr_end].to_vec(), false)
        } else {
            (vec![0; CHR_BANK_UNIT], true)
        };

        let prg_ram_size = (header.prg_ram_banks as usize).max(1) * PRG_RAM_UNIT;

        Ok(Cartridge {
            header,
            prg_rom,
            chr,
            chr_is_ram,
            prg_ram_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::build_ines;

    #[test]
    fn test_parse_minimal_image() {
        let image = build_ines(0, 1, 1, &[], &[]);
        let cart = Cartridge::parse(&image).unwrap();
        assert_eq!(cart.header.mapper, 0);
        assert_eq!(cart.prg_rom.len(), 16 * 1024);
        assert_eq!(cart.chr.len(), 8 * 1024);
        assert!(!cart.chr_is_ram);
        assert_eq!(cart.prg_ram_size, 8 * 1024);
    }

    #[test]
    fn test_parse_chr_ram_image() {
        let image = build_ines(2, 1, 0, &[], &[]);
        let cart = Cartridge::parse(&image).unwrap();
        assert!(cart.chr_is_ram);
        assert_eq!(cart.chr.len(), 8 * 1024);
    }

    #[test]
    fn test_bad_magic() {
        let mut image = build_ines(0, 1, 1, &[], &[]);
        image[0] = b'X';
        assert!(matches!(Cartridge::parse(&image), Err(LoadError::BadMagic)));
    }

    #[test]
    fn test_short_image() {
        let image = build_ines(0, 1, 1, &[], &[]);
        assert!(matches!(
            Cartridge::parse(&image[..1000]),
            Err(LoadError::ShortRead)
        ));
    }

    #[test]
    fn test_unsupported_mapper() {
        let image = build_ines(66, 1, 1, &[], &[]);
        assert!(matches!(
            Cartridge::parse(&image),
            Err(LoadError::UnsupportedMapper(66))
        ));
    }

    #[test]
    fn test_mirroring_flag() {
        let mut image = build_ines(0, 1, 1, &[], &[]);
        image[6] |= 0x01;
        let cart = Cartridge::parse(&image).unwrap();
        assert_eq!(cart.header.mirroring, Mirroring::Vertical);
    }
}
