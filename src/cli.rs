use clap::{Parser, Subcommand};
use std::path::PathBuf;
use anyhow::Result;
use tracing::info;

use impact_trace::core::{AnalyzeRequest, Engine};

#[derive(Parser)]
#[command(name = "impact-trace")]
#[command(about = "Find the GUI events that can trigger changed methods of an Android app")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default configuration file
    Init {
        /// Target directory (defaults to current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Resolve the top callers of changed methods and write the impact report
    Analyze {
        /// Program snapshot (JSON)
        #[arg(long)]
        program: PathBuf,

        /// GUI event bindings (JSON)
        #[arg(long)]
        gui: PathBuf,

        /// App diff with methodsChanged / methodsAdded (JSON)
        #[arg(long)]
        changes: Option<PathBuf>,

        /// Output directory for the report
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only analyse methods of classes under this package
        #[arg(long)]
        app_package: Option<String>,
    },

    /// Translate low-level signatures such as `a.B.c(I)V` into `<a.B: void c(int)>`
    Translate {
        /// Signatures to translate
        #[arg(required = true)]
        signatures: Vec<String>,
    },
}

impl Cli {
    pub async fn execute(self, engine: Engine) -> Result<()> {
        match self.command {
            Commands::Init { path, force } => {
                engine.init(path, force).await?;
                Ok(())
            }
            Commands::Analyze { program, gui, changes, output, app_package } => {
                let (result, path) = engine.analyze(AnalyzeRequest {
                    program,
                    gui,
                    changes,
                    output,
                    app_package,
                }).await?;

                let counts = &result.report.counts;
                info!("✅ {} modified methods: {} handled, {} unhandled, {} unreachable, {} not found",
                      counts.modified, counts.handled, counts.unhandled, counts.unreachable, counts.not_found);
                println!("{}", path.display());
                Ok(())
            }
            Commands::Translate { signatures } => {
                let mut failed = 0;
                for (raw, translated) in signatures.iter().zip(engine.translate(&signatures)) {
                    match translated {
                        Ok(signature) => println!("{}", signature),
                        Err(e) => {
                            failed += 1;
                            eprintln!("{}: {}", raw, e);
                        }
                    }
                }
                if failed > 0 {
                    anyhow::bail!("{} of {} signatures could not be translated", failed, signatures.len());
                }
                Ok(())
            }
        }
    }
}
