//! Utilities shared by the Rookline binaries.

pub mod logger;
pub mod time;
