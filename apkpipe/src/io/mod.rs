//! Side-effecting helpers: processes, configuration, device and working directory.

pub mod config;
pub mod device;
pub mod process;
pub mod tools;
pub mod workdir;
