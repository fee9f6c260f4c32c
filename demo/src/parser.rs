//! Demo bitstream parsing primitives.

mod reader;

pub use reader::BitReader;
