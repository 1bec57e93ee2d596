use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Winch CLI - maintenance tooling for the actions monorepo
#[derive(Debug, Parser)]
#[command(name = "winch", version, about, long_about = None)]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Verify that internal references use the dev marker and are declared
    CheckRefs(CheckRefsArgs),

    /// Rewrite dev markers in a staging directory to pinned versions
    ResolveRefs(ResolveRefsArgs),
}

#[derive(Debug, Args, Default)]
pub struct CheckRefsArgs {
    /// Repository root (defaults to the current directory)
    #[arg(long)]
    pub root: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ResolveRefsArgs {
    /// Staging directory holding the package about to be published
    #[arg(long)]
    pub staging_dir: PathBuf,

    /// Repository root to resolve dependency versions from
    /// (defaults to the current directory)
    #[arg(long)]
    pub workspace_root: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_check_refs_with_root() {
        let cli = Cli::try_parse_from(["winch", "check-refs", "--root", "/repo"]).unwrap();
        match cli.command {
            Commands::CheckRefs(args) => {
                assert_eq!(args.root.as_deref(), Some("/repo".as_ref()));
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn parses_check_refs_without_root() {
        let cli = Cli::try_parse_from(["winch", "check-refs"]).unwrap();
        match cli.command {
            Commands::CheckRefs(args) => assert!(args.root.is_none()),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn parses_resolve_refs_with_staging_dir() {
        let cli = Cli::try_parse_from([
            "winch",
            "resolve-refs",
            "--staging-dir",
            "/staging/pkg",
            "--workspace-root",
            "/repo",
        ])
        .unwrap();
        match cli.command {
            Commands::ResolveRefs(args) => {
                assert_eq!(args.staging_dir, PathBuf::from("/staging/pkg"));
                assert_eq!(args.workspace_root.as_deref(), Some("/repo".as_ref()));
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn resolve_refs_requires_staging_dir() {
        assert!(Cli::try_parse_from(["winch", "resolve-refs"]).is_err());
    }
}
