//! Core analysis: identity naming, call extraction, and call-graph resolution.
//!
//! The three submodules implement the heart of the crate:
//!
//! - [`naming`] - collision-free identity keys for metadata entities
//! - [`extract`] - per-method call-site extraction with eager fallback naming
//! - [`callgraph`] - the two-pass scan/resolve algorithm over a whole assembly
//!
//! # Example
//!
//! ```rust,no_run
//! use cilgraph::analysis::callgraph::{resolve, scan, ResolutionMode, ScanOptions};
//! use cilgraph::Assembly;
//!
//! let assembly = Assembly::from_file("sample.dll".as_ref())?;
//! let outcome = scan(&assembly, ScanOptions::default())?;
//!
//! for scanned_type in &outcome.types {
//!     for method in &scanned_type.methods {
//!         let calls = resolve(&outcome.index, method, ResolutionMode::CalleeIdentity);
//!         println!("{}: {} call targets", method.key, calls.len());
//!     }
//! }
//! # Ok::<(), cilgraph::Error>(())
//! ```

pub mod callgraph;
pub mod extract;
pub mod naming;
