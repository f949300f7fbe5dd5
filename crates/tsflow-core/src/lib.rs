#![forbid(unsafe_code)]
//! tsflow-core: pure data types shared by every tsflow crate.
//!
//! Nothing here allocates through the memory budget or spawns threads; the
//! operators and exec crates build on these types.

pub mod budget;
pub mod buffer;
pub mod config;
pub mod error;
pub mod hash;
pub mod id;
pub mod key;
pub mod prelude;
pub mod schema;
pub mod types;
