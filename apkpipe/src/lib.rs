//! Pipeline for pulling, decompiling, rebuilding and reinstalling Android apps.
//!
//! Every stage works on a single working directory whose file names carry the
//! pipeline state: raw APKs, decompiled trees, `-unsigned.apk` rebuilds and
//! `-aligned-debugSigned.apk` signed copies. The architecture keeps a strict
//! separation:
//!
//! - **[`core`]**: Pure, deterministic logic (naming, package parsing, lineage).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (processes, config, device, workdir).
//!   External tools run behind [`io::process::ToolRunner`] so tests can script them.
//!
//! Stage modules ([`pull`], [`decompile`], [`build`], [`install`], [`universal`])
//! coordinate core logic with I/O; [`driver`] dispatches one stage and
//! [`report`] renders its result.

pub mod batch;
pub mod build;
pub mod core;
pub mod decompile;
pub mod driver;
pub mod error;
pub mod exit_codes;
pub mod install;
pub mod io;
pub mod logging;
pub mod pull;
pub mod report;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod universal;
