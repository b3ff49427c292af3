//! .NET metadata parsing: headers, heaps, tables, and signatures.
//!
//! This module implements the physical metadata format of ECMA-335 Partition II,
//! from the CLR runtime header down to individual table rows:
//!
//! - [`cor20`] - the CLR 2.0 runtime header
//! - [`root`] - the metadata root and stream directory
//! - [`streams`] - the `#Strings`, `#US`, `#Blob` and `#GUID` heaps
//! - [`tables`] - the `#~` stream and typed table rows
//! - [`signatures`] - method and type signature blobs
//! - [`method`] - CIL method body headers and method attributes
//! - [`token`] - metadata tokens
//! - [`assembly`] - the high-level [`assembly::Assembly`] view tying it together

pub mod assembly;
pub mod cor20;
pub mod method;
pub mod root;
pub mod signatures;
pub mod streams;
pub mod tables;
pub mod token;
