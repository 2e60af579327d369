use clap::{Parser, Subcommand};
use std::path::PathBuf;
use anyhow::Result;

use crate::core::{Engine, FlowOptions, StructuralOptions};

#[derive(Parser)]
#[command(name = "codecanvas")]
#[command(about = "Turns source code into JSON Canvas diagrams")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Map modules, classes, functions and the calls between them
    Structural {
        /// Source files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Only draw what this function or `Class.method` reaches
        #[arg(short, long)]
        entrypoint: Option<String>,

        /// Output file; several inputs are merged into it
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Leave docstrings out of node text
        #[arg(long)]
        no_docstrings: bool,

        /// Leave parameters out of node text
        #[arg(long)]
        no_params: bool,

        /// Single-line JSON
        #[arg(long)]
        compact: bool,

        /// Print the canvas instead of writing a file
        #[arg(long)]
        stdout: bool,
    },

    /// Chart the execution flow of a file or entrypoint
    Flow {
        /// Source file
        file: PathBuf,

        /// Function or `Class.method` the flow starts from
        #[arg(short, long)]
        entrypoint: Option<String>,

        /// Output file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Model used for the analysis
        #[arg(short, long)]
        model: Option<String>,

        /// Print the analysis returned by the model
        #[arg(long)]
        show_analysis: bool,

        /// Print the compiled context without calling the model
        #[arg(long)]
        dry_run: bool,

        /// Single-line JSON
        #[arg(long)]
        compact: bool,

        /// Print the canvas instead of writing a file
        #[arg(long)]
        stdout: bool,
    },
}

impl Cli {
    pub async fn execute(self, engine: Engine) -> Result<()> {
        match self.command {
            Commands::Structural {
                paths,
                entrypoint,
                output,
                no_docstrings,
                no_params,
                compact,
                stdout,
            } => {
                engine
                    .structural(StructuralOptions {
                        paths,
                        entrypoint,
                        output,
                        show_docstrings: !no_docstrings,
                        show_params: !no_params,
                        compact,
                        stdout,
                    })
                    .await
            }
            Commands::Flow {
                file,
                entrypoint,
                output,
                model,
                show_analysis,
                dry_run,
                compact,
                stdout,
            } => {
                engine
                    .flow(FlowOptions {
                        file,
                        entrypoint,
                        output,
                        model,
                        show_analysis,
                        dry_run,
                        compact,
                        stdout,
                    })
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_arguments() {
        let cli = Cli::try_parse_from([
            "codecanvas", "-v", "structural", "src", "lib.py", "-e", "Store.load", "--no-params",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Structural { paths, entrypoint, no_params, no_docstrings, .. } => {
                assert_eq!(paths, vec![PathBuf::from("src"), PathBuf::from("lib.py")]);
                assert_eq!(entrypoint.as_deref(), Some("Store.load"));
                assert!(no_params);
                assert!(!no_docstrings);
            }
            _ => panic!("expected structural"),
        }
    }

    #[test]
    fn test_flow_arguments() {
        let cli = Cli::try_parse_from([
            "codecanvas", "flow", "app.py", "-m", "gpt-4o", "--dry-run", "--config", "cc.toml",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("cc.toml")));
        match cli.command {
            Commands::Flow { file, model, dry_run, entrypoint, .. } => {
                assert_eq!(file, PathBuf::from("app.py"));
                assert_eq!(model.as_deref(), Some("gpt-4o"));
                assert!(dry_run);
                assert!(entrypoint.is_none());
            }
            _ => panic!("expected flow"),
        }
    }

    #[test]
    fn test_structural_requires_paths() {
        assert!(Cli::try_parse_from(["codecanvas", "structural"]).is_err());
    }
}
