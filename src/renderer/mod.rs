//! Terminal byte emission: escape writers, output buffering, frame diff.

pub mod ansi;
pub mod diff;
pub mod output;

pub use diff::{DiffRenderer, InlineRenderer};
pub use output::{CellWriter, OutputBuffer};
