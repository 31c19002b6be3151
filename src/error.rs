//! Error domains surfaced by the crate.
//!
//! Capacity and reactive-cycle failures propagate to the authoring code
//! that caused them. Tree corruption is fatal for the frame only; the
//! engine logs it and keeps the previous framebuffer. Terminal I/O
//! failures unmount the engine with a best-effort restore. Malformed
//! input sequences never become errors at all; the decoder resyncs and
//! counts them.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A fixed-capacity region of the node store is full.
    #[error("capacity exhausted: {what}")]
    Capacity { what: &'static str },

    /// A node's parent link points at itself or forward, which would make
    /// the tree unorderable.
    #[error("invalid tree: node {node} has a backward or cyclic parent link")]
    InvalidTree { node: usize },

    /// Raw mode, stdin, or stdout failed underneath us.
    #[error("terminal I/O: {0}")]
    Terminal(#[from] std::io::Error),

    /// A derived value reads itself, directly or transitively.
    #[error("reactive cycle detected during evaluation")]
    ReactiveCycle,
}

pub type Result<T> = std::result::Result<T, Error>;
