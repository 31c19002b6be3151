//! # ember-tui
//!
//! Reactive terminal UI framework.
//!
//! A declarative layer authors a component tree and mutates it through a
//! fine-grained reactive graph; an engine consumes those mutations from
//! a shared, cache-line-aligned node store and produces terminal bytes.
//! The two sides communicate through memory and one atomic wake flag;
//! no per-property calls cross the boundary on the hot path.
//!
//! ```text
//! signals → primitives → node store ─wake→ layout → compose → diff → terminal
//!                           ▲                                          │
//!                           └──────────── event ring ◄─── stdin ───────┘
//! ```
//!
//! ## Modules
//!
//! - [`reactive`] - signals, deriveds, effects, scopes
//! - [`store`] - the shared AoS node store (header, nodes, text pool,
//!   event ring)
//! - [`primitives`] - `box`, `text`, `input`, `each`, `show`, `cycle`
//! - [`layout`] - the flexbox solver and text measurement
//! - [`framebuffer`] - cell grid and tree compositing
//! - [`renderer`] - ANSI emission and frame diffing
//! - [`terminal`] - raw mode, screen modes, stdin decoding
//! - [`engine`] - the render loop that owns all of the above
//! - [`mount`] - application lifecycle

pub mod engine;
pub mod error;
pub mod framebuffer;
pub mod input;
pub mod layout;
pub mod mount;
pub mod primitives;
pub mod reactive;
pub mod renderer;
pub mod store;
pub mod terminal;
pub mod theme;
pub mod types;

pub use error::{Error, Result};
pub use mount::{MountHandle, MountOptions, mount};
pub use primitives::{
    BoxProps, Cleanup, InputProps, PropValue, TextProps, TickOptions, box_primitive, cycle, each,
    getter, input as input_widget, pulse, show, text, when,
};
pub use reactive::{
    Derived, Scope, Signal, batch, derived, effect, effect_scope, flush_sync, on_scope_dispose,
    scoped, signal, untracked,
};
pub use store::{Store, StoreConfig, StylePatch};
pub use terminal::RenderMode;
pub use types::{
    AlignContent, AlignItems, AlignSelf, Attr, BorderStyle, Cell, ComponentType, Dimension,
    Display, FlexDirection, FlexWrap, JustifyContent, Overflow, Position, Rgba, TextAlign,
    TextWrap, pack_color, unpack_color,
};
