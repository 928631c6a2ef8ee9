//! Line commands and the capability interface they run against.

pub mod builtin;
pub mod context;
pub mod registry;

#[cfg(test)]
pub(crate) mod mock;

pub use builtin::register_builtins;
pub use context::CommandContext;
pub use registry::{Command, CommandRegistry, parse_line};
