//! Terminal text measurement.
//!
//! One width function for the whole crate: the layout engine, the
//! compositor, and the renderer all measure through here so a glyph can
//! never be sized differently in different phases.
//!
//! Built on `unicode-width` (East Asian Width tables) and
//! `unicode-segmentation` (UAX #29 grapheme clusters), with explicit
//! handling for ANSI escapes and emoji sequences.

mod strip;
mod width;
mod wrap;

pub use strip::strip_sequences;
pub use width::{cell_width, cluster_width, display_width};
pub use wrap::{clip_to_width, wrap_clusters, wrap_words, wrapped_height};
