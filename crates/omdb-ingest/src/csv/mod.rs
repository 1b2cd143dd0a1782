//! The OMDb dump CSV dialect
//!
//! Records are reconstructed from physical lines first ([`LogicalLines`]),
//! then split into fields ([`split_line`]).

mod logical;
mod split;

pub use logical::{LogicalLine, LogicalLines};
pub use split::split_line;
