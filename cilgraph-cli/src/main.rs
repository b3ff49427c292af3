mod app;

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use log::{info, warn};

use cilgraph::{Assembly, DecompilerOptions, IlDecompiler, Report, ReportBuilder, ReportOptions};

use crate::app::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // cilgraph info+ on stderr; --verbose enables debug; RUST_LOG overrides
    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_module("cilgraph", level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();

    run(&cli)
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    if !cli.assembly.is_file() {
        bail!("Assembly not found: {}", cli.assembly.display());
    }

    if let Some(pdb_path) = &cli.use_pdb_file {
        if !pdb_path.is_file() {
            bail!("Pdb file not found: {}", pdb_path.display());
        }
    }

    let attempt_symbol_load = cli.attempt_symbol_load || cli.use_pdb_file.is_some();
    if attempt_symbol_load {
        // Symbols would only refine listing output; the analysis itself never
        // depends on them.
        match companion_pdb(cli) {
            Some(pdb_path) => info!("using symbol file {}", pdb_path.display()),
            None => warn!("no symbol file found next to the assembly"),
        }
    }

    fs::create_dir_all(&cli.output_path).with_context(|| {
        format!(
            "failed to create output directory {}",
            cli.output_path.display()
        )
    })?;

    let assembly = Assembly::from_file(&cli.assembly)
        .with_context(|| format!("failed to load assembly {}", cli.assembly.display()))?;

    let decompiler = IlDecompiler::new(DecompilerOptions {
        remove_dead_code: cli.remove_dead_code,
        remove_dead_stores: cli.remove_dead_stores,
        strip_formatting: cli.no_formatting,
    });

    let report = ReportBuilder::new(&assembly, &decompiler)
        .with_options(ReportOptions {
            ignore_compiler_generated: cli.ignore_compiler_generated,
            legacy_caller_names: cli.legacy_caller_names,
        })
        .build()
        .context("assembly analysis failed")?;

    let json = serde_json::to_string_pretty(&report).context("failed to serialize the report")?;
    let report_path = cli.output_path.join("assembly_analysis.json");
    fs::write(&report_path, json)
        .with_context(|| format!("failed to write {}", report_path.display()))?;
    println!("Analysis result written to: {}", report_path.display());

    if cli.include_full_project_decompilation {
        write_listings(&report, cli)?;
        println!("Decompiled listings written to: {}", cli.output_path.display());
    }

    Ok(())
}

/// Look for a `.pdb` next to the assembly, preferring an explicit path.
fn companion_pdb(cli: &Cli) -> Option<PathBuf> {
    if let Some(explicit) = &cli.use_pdb_file {
        return Some(explicit.clone());
    }

    let candidate = cli.assembly.with_extension("pdb");
    candidate.is_file().then_some(candidate)
}

/// Write one `.il` listing file per type into the output directory.
fn write_listings(report: &Report, cli: &Cli) -> anyhow::Result<()> {
    for entry in &report.types {
        // The identity key carries arity and token; the file name only wants
        // the plain type path
        let plain = entry.name.split('`').next().unwrap_or(&entry.name);

        let relative = if cli.nested_directories {
            let mut segments: Vec<&str> = plain.split('.').collect();
            let file_name = segments.pop().unwrap_or(plain);
            let mut path: PathBuf = segments.iter().map(|segment| sanitize(segment)).collect();
            path.push(format!("{}.il", sanitize(file_name)));
            path
        } else {
            PathBuf::from(format!("{}.il", sanitize(plain)))
        };

        let target = cli.output_path.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let mut text = String::new();
        for method in &entry.methods {
            text.push_str(&method.decompiled_source);
            text.push_str("\n\n");
        }

        fs::write(&target, text)
            .with_context(|| format!("failed to write {}", target.display()))?;
    }

    Ok(())
}

/// Replace path-hostile characters in a type name segment.
fn sanitize(segment: &str) -> String {
    segment
        .chars()
        .map(|character| match character {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '+' => '_',
            other => other,
        })
        .collect()
}
