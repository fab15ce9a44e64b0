// Screenshot functionality
//
// Encodes the most recently completed frame as an RGB PNG. The frame
// buffer is packed 0xAARRGGBB; alpha is constant and dropped.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::machine::Machine;
use crate::ppu::constants::{FRAME_HEIGHT, FRAME_WIDTH};

/// Errors that can occur during screenshot operations
#[derive(Debug)]
pub enum ScreenshotError {
    /// I/O error
    Io(io::Error),

    /// PNG encoding error
    PngEncoding(png::EncodingError),
}

impl std::fmt::Display for ScreenshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScreenshotError::Io(e) => write!(f, "I/O error: {}", e),
            ScreenshotError::PngEncoding(e) => write!(f, "PNG encoding error: {}", e),
        }
    }
}

impl std::error::Error for ScreenshotError {}

impl From<io::Error> for ScreenshotError {
    fn from(e: io::Error) -> Self {
        ScreenshotError::Io(e)
    }
}

impl From<png::EncodingError> for ScreenshotError {
    fn from(e: png::EncodingError) -> Self {
        ScreenshotError::PngEncoding(e)
    }
}

/// Write a 256x240 frame to a PNG file
pub fn write_png<P: AsRef<Path>>(path: P, frame: &[u32]) -> Result<(), ScreenshotError> {
    let rgb = frame_to_rgb(frame);

    let file = fs::File::create(path)?;
    let writer = io::BufWriter::new(file);

    let mut encoder = png::Encoder::new(writer, FRAME_WIDTH as u32, FRAME_HEIGHT as u32);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);

    let mut png_writer = encoder.write_header()?;
    png_writer.write_image_data(&rgb)?;

    Ok(())
}

/// Save the completed frame into `directory` with a timestamped name
///
/// Returns the path of the written file.
pub fn save_screenshot<P: AsRef<Path>>(
    machine: &Machine,
    directory: P,
) -> Result<PathBuf, ScreenshotError> {
    fs::create_dir_all(&directory)?;

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let filename = format!("screenshot_{}.png", timestamp);
    let path = directory.as_ref().join(filename);

    write_png(&path, machine.frame())?;
    Ok(path)
}

/// Unpack 0xAARRGGBB pixels into tightly packed RGB bytes
fn frame_to_rgb(frame: &[u32]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(frame.len() * 3);
    for &pixel in frame {
        rgb.push((pixel >> 16) as u8);
        rgb.push((pixel >> 8) as u8);
        rgb.push(pixel as u8);
    }
    rgb
}

impl Machine {
    /// Write the completed frame to the given PNG path
    pub fn screenshot_to<P: AsRef<Path>>(&self, path: P) -> Result<(), ScreenshotError> {
        write_png(path, self.frame())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_to_rgb_unpacks_channels() {
        let frame = [0xFF123456u32, 0xFF000000];
        let rgb = frame_to_rgb(&frame);
        assert_eq!(&rgb[0..3], &[0x12, 0x34, 0x56]);
        assert_eq!(&rgb[3..6], &[0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_write_png_produces_file() {
        let frame = vec![0xFF336699u32; FRAME_WIDTH * FRAME_HEIGHT];
        let path = std::env::temp_dir().join("famicore_screenshot_test.png");
        write_png(&path, &frame).unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
        let _ = fs::remove_file(&path);
    }
}
