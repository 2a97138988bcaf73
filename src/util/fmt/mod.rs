//! Human-readable renderings of the compiler's data structures.

pub mod error;
pub mod tree;
