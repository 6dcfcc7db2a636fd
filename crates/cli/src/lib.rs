//! Keepsake CLI library
//!
//! Exposed as a library so integration tests can drive the daemon
//! in-process.

pub mod cmd;
pub mod daemon;
pub mod locks;
pub mod paths;
pub mod util;
