//! Host system introspection.
//!
//! This is the only code that reads outside the sandbox root, and it only
//! reads `/proc`.

pub mod monitor;

pub use monitor::{MemoryInfo, ProcessUsage, ResourceSnapshot, snapshot};
