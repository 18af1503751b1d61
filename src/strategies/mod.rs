//! Pluggable compression and dump strategies
//!
//! Strategies resolve by engine name. An unrecognized name resolves to `None`
//! rather than an error; callers branch on whether a real strategy came back.

pub mod compress;
pub mod dump;

pub use compress::{ArchiveError, Compressor};
pub use dump::{DumpError, Dumper};

/// Engine used when a task asks for compression without naming one
pub const DEFAULT_COMPRESSOR: &str = "zip";
