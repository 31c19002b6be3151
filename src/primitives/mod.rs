//! Authoring primitives: the declarative surface over the node store.
//!
//! Constructors reserve a node, write static props once, and bind each
//! reactive prop with one effect that re-writes the field, marks the
//! matching dirty bit, and requests a coalesced engine wake. Nothing on
//! this path calls into the engine; the two sides only share memory.

pub mod animate;
pub(crate) mod bind;
pub mod binder;
pub mod box_primitive;
pub mod control_flow;
pub mod input;
pub mod text;
pub mod types;

pub use animate::{TickOptions, cycle, pulse, sync_clocks};
pub use box_primitive::box_primitive;
pub use control_flow::{each, show, when};
pub use input::input;
pub use text::text;
pub use types::{BoxProps, Cleanup, InputProps, PropValue, TextProps, getter};
