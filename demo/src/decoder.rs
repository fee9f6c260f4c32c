//! Entity state decoding.

mod flatten;
mod state;
mod types;

pub use state::EntityState;
pub use types::{DecoderSettings, FlatClass};
