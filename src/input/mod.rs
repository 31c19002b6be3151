//! Input pipeline: byte decoding, focus, scroll, hit testing.

pub mod focus;
pub mod hit;
pub mod parser;
pub mod scroll;

pub use focus::FocusManager;
pub use hit::HitGrid;
pub use parser::{Decoded, Parser};
