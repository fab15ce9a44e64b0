//! APU channel implementations

mod dmc;
mod noise;
mod pulse;
mod triangle;

pub use dmc::Dmc;
pub use noise::Noise;
pub use pulse::Pulse;
pub use triangle::Triangle;
