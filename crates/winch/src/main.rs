mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use std::path::PathBuf;
use std::process::ExitCode;
use winch_core::refs;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::CheckRefs(args) => {
            let root = match resolve_dir(args.root) {
                Ok(dir) => dir,
                Err(e) => {
                    eprintln!("Failed to get current directory: {e}");
                    return ExitCode::from(1);
                }
            };

            match refs::check_refs(&root) {
                Ok(report) => {
                    for error in &report.errors {
                        eprintln!("error: {error}");
                    }
                    if report.is_ok() {
                        println!(
                            "checked {} files, all internal references are valid",
                            report.files_checked
                        );
                    } else {
                        eprintln!(
                            "checked {} files, found {} problems",
                            report.files_checked,
                            report.errors.len()
                        );
                        return ExitCode::from(1);
                    }
                }
                Err(e) => {
                    eprintln!("Failed to check references: {e}");
                    return ExitCode::from(1);
                }
            }
        }
        Commands::ResolveRefs(args) => {
            let workspace_root = match resolve_dir(args.workspace_root) {
                Ok(dir) => dir,
                Err(e) => {
                    eprintln!("Failed to get current directory: {e}");
                    return ExitCode::from(1);
                }
            };

            match refs::resolve_refs(&args.staging_dir, &workspace_root) {
                Ok(report) => {
                    for warning in &report.warnings {
                        eprintln!("warning: {warning}");
                    }
                    for error in &report.errors {
                        eprintln!("error: {error}");
                    }
                    if !report.is_ok() {
                        return ExitCode::from(1);
                    }

                    println!(
                        "resolved {} references in '{}'",
                        report.replacements, report.package
                    );
                    for dependency in &report.resolved {
                        println!("  {} -> v{}", dependency.name, dependency.version);
                    }
                }
                Err(e) => {
                    eprintln!("Failed to resolve references: {e}");
                    return ExitCode::from(1);
                }
            }
        }
    }
    ExitCode::SUCCESS
}

fn resolve_dir(explicit: Option<PathBuf>) -> std::io::Result<PathBuf> {
    match explicit {
        Some(dir) => Ok(dir),
        None => std::env::current_dir(),
    }
}
