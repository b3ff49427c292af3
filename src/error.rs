use thiserror::Error;

use crate::metadata::token::Token;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// This enum covers all error conditions that can occur while parsing a .NET assembly,
/// decoding CIL method bodies, and resolving call targets. Each variant provides specific
/// context about the failure mode to enable appropriate handling.
///
/// Fatal load errors (`NotSupported`, `Malformed`, `FileError`, ...) abort an analysis run;
/// per-entity soft failures (a single undecodable method body, a failed decompilation) are
/// caught at the entity boundary and never surface through this type to a caller of the
/// high-level analysis entry points.
///
/// # Examples
///
/// ```rust
/// use cilgraph::{Assembly, Error};
/// use std::path::Path;
///
/// match Assembly::from_file(Path::new("missing.dll")) {
///     Ok(assembly) => println!("loaded"),
///     Err(Error::NotSupported) => eprintln!("not a .NET PE file"),
///     Err(Error::Malformed { message, file, line }) => {
///         eprintln!("malformed input: {} ({}:{})", message, file, line);
///     }
///     Err(e) => eprintln!("error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// Encountered an invalid offset while parsing file structures.
    ///
    /// Returned when an RVA or heap index cannot be translated into a valid
    /// location within the loaded image.
    #[error("Could not retrieve a valid offset!")]
    InvalidOffset,

    /// The file is damaged and could not be parsed.
    ///
    /// The file structure does not conform to the expected .NET PE format. The error
    /// includes the source location where the malformation was detected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the file.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// This file type is not supported.
    ///
    /// The input is not a supported .NET PE executable, or uses features (e.g. Portable
    /// PDB metadata tables embedded in the image) that this library does not process.
    #[error("This file type is not supported")]
    NotSupported,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),

    /// Error from the goblin crate during PE parsing.
    #[error("{0}")]
    GoblinErr(#[from] goblin::error::Error),

    /// A metadata row referenced by token could not be found.
    ///
    /// Returned when an identity key or signature rendering is requested for a token
    /// whose table row does not exist in the loaded metadata.
    #[error("Failed to find metadata row - {0}")]
    RowNotFound(Token),

    /// Recursion limit reached.
    ///
    /// Nested-type walks and signature parsing enforce a maximum recursion depth to
    /// guard against cyclic or hostile metadata. The associated value is the limit.
    #[error("Reached the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),
}
