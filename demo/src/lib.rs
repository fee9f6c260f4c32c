//! Pure-rust parser core for Source-engine demo recordings

#[macro_use]
extern crate bitflags;

pub mod decoder;
pub mod error;
pub mod parser;
pub mod types;
