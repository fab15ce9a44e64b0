// Debug module - instruction trace logging

pub mod trace;

pub use trace::TraceSink;
