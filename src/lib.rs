//! rulectl - declarative management of cloud compliance rules
//!
//! The library half of the crate: the attribute schema, the tree codec, the
//! typed API client, and the rule lifecycle adapter. The binary in `main.rs`
//! wires these into a CLI.

pub mod api;
pub mod codec;
pub mod config;
pub mod model;
pub mod resource;
pub mod schema;
