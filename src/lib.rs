//! # cilgraph
//!
//! Structural analysis of .NET assemblies from their on-disk ECMA-335 metadata:
//! no debug symbols, no runtime, no external resolver.
//!
//! The crate extracts three kinds of facts from one assembly:
//!
//! - **Identity**: globally unique, deterministic identity keys for types and
//!   methods. Plain names collide (overloads, generics, nested types); identity
//!   keys embed arity, parameter lists and the metadata token, which is unique
//!   per table row ([`analysis::naming`]).
//! - **Call relationships**: an approximate call graph built by decoding every
//!   method body and resolving call targets in two passes - a scan pass that
//!   builds the handle lookup table, and a resolve pass that binds targets
//!   against the completed table. Callees outside the assembly keep a fallback
//!   name with address zero ([`analysis::callgraph`]).
//! - **Surface**: imported functions and types, exported types, PE header facts,
//!   per-method IL bytes and best-effort listing text ([`report`]).
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use cilgraph::{Assembly, IlDecompiler, ReportBuilder};
//!
//! let assembly = Assembly::from_file("sample.dll".as_ref())?;
//! let decompiler = IlDecompiler::new(Default::default());
//! let report = ReportBuilder::new(&assembly, &decompiler).build()?;
//!
//! for entry in &report.types {
//!     println!("{} ({} methods)", entry.name, entry.methods.len());
//! }
//! # Ok::<(), cilgraph::Error>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! file (PE, mmap)
//!   └── metadata (heaps, tables, signatures)
//!         └── Assembly (one handle per run)
//!               ├── disassembler (CIL decoding, basic blocks)
//!               ├── analysis (naming, extraction, two-pass call graph)
//!               ├── decompiler (collaborator boundary + IL listing)
//!               └── report (builder and serializable model)
//! ```
//!
//! Execution is single-threaded and strictly sequential: one assembly per run,
//! pass 2 starting only after pass 1 has completed for every method. A run
//! either yields a complete report or fails fatally; per-method faults degrade
//! to sentinel values and are logged through the `log` facade.
//!
//! # References
//!
//! - [ECMA-335 6th Edition](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

#[macro_use]
pub(crate) mod error;

pub mod analysis;
pub mod decompiler;
pub mod disassembler;
pub mod file;
pub mod metadata;
pub mod report;

/// `cilgraph` Result type
///
/// A type alias for [`std::result::Result`] where the error type is always
/// [`Error`], used consistently throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// `cilgraph` Error type
pub use error::Error;

/// Main entry point for working with .NET assemblies.
///
/// See [`metadata::assembly::Assembly`] for metadata access and derived indices.
pub use metadata::assembly::Assembly;

/// Low-level file access and byte parsing.
pub use file::{parser::Parser, File};

/// The decompiler collaborator boundary and the built-in listing backend.
pub use decompiler::{Decompiler, DecompilerOptions, IlDecompiler};

/// Report construction.
pub use report::{Report, ReportBuilder, ReportOptions};
