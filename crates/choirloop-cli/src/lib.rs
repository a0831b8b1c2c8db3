//! ChoirLoop CLI library.
//!
//! Command implementations and the shared mix options behind the `choirloop`
//! binary.

pub mod commands;
pub mod mix;
