use std::path::PathBuf;

use clap::Parser;

/// cilgraph - structural analysis of .NET assemblies
///
/// Produces a JSON report with type and method identities, call relationships,
/// imports/exports, and best-effort method listings.
#[derive(Debug, Parser)]
#[command(name = "cilgraph", version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Path to the assembly to analyze (required).
    #[arg(long, value_name = "PATH")]
    pub assembly: PathBuf,

    /// Directory to write analysis results to (required).
    #[arg(long, value_name = "PATH")]
    pub output_path: PathBuf,

    /// Also write one listing file per type next to the JSON report.
    #[arg(long)]
    pub include_full_project_decompilation: bool,

    /// Omit code not reachable from each method entry in listings.
    #[arg(long)]
    pub remove_dead_code: bool,

    /// Omit stores to never-read locals in listings.
    #[arg(long)]
    pub remove_dead_stores: bool,

    /// Skip methods marked with CompilerGeneratedAttribute.
    #[arg(long)]
    pub ignore_compiler_generated: bool,

    /// Nest listing files into per-namespace directories.
    #[arg(long)]
    pub nested_directories: bool,

    /// Attempt to locate companion symbols for the assembly.
    #[arg(long)]
    pub attempt_symbol_load: bool,

    /// Full path to a PDB file to use during symbol load (implies
    /// --attempt-symbol-load).
    #[arg(long, value_name = "PATH")]
    pub use_pdb_file: Option<PathBuf>,

    /// Strip all formatting characters from listing output.
    #[arg(long)]
    pub no_formatting: bool,

    /// Emit the historical caller-identity records for locally resolved calls.
    #[arg(long)]
    pub legacy_caller_names: bool,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long)]
    pub verbose: bool,
}
