//! Stable exit codes for apkpipe CLI commands.

/// Stage completed, including "nothing to do" outcomes such as no signed APKs.
pub const OK: i32 = 0;
/// An external tool failed: a whole-stage error or any per-artifact failure.
pub const FAILED: i32 = 1;
/// Invalid input, missing directory, ambiguous bundle or bad configuration.
pub const INVALID: i32 = 2;
