//! JSON building blocks.
//!
//! - [`CappedBuffer`] - fixed-capacity text buffer whose appends fail
//!   instead of overflowing
//! - [`JsonWriter`] - incremental, append-only JSON writer on top of it
//! - [`splice_str`] / [`splice_value`] - replay already-serialized JSON
//!   into a writer

mod buffer;
mod splice;
mod writer;

pub use buffer::{CappedBuffer, WouldOverflow};
pub use splice::{normalized, splice_str, splice_value};
pub use writer::JsonWriter;
