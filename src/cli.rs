//! Command line: generate (one type) | batch (manifests)
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;

use gencodec::batch;
use gencodec::{Config, Diagnostics, Gofmt, Severity, SourceFormatter, Verbatim};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// generate JSON/YAML marshaling methods for Go struct types, with field type overrides
#[derive(Parser, Debug)]
#[command(name = "gencodec", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,

    /// more logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// generate methods for one struct type
    Generate(GenerateOut),
    /// run every job listed in one or more manifests, in parallel
    Batch(BatchOut),
}

#[derive(Args, Debug, Clone)]
struct FormatterSettings {
    /// pipe the output through gofmt
    #[arg(long, default_value_t = false)]
    gofmt: bool,

    /// gofmt binary to run
    #[arg(long, default_value = "gofmt", requires = "gofmt")]
    gofmt_program: String,
}

#[derive(clap::Parser, Debug)]
struct GenerateOut {
    /// directory holding the package's types.json
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// struct type to generate for
    #[arg(long = "type")]
    type_name: String,

    /// struct whose fields override the field types of --type
    #[arg(long)]
    field_override: Option<String>,

    /// comma-separated formats (json, yaml)
    #[arg(long, value_delimiter = ',', default_value = "json")]
    formats: Vec<String>,

    /// output .go file (stdout if omitted or '-')
    #[arg(short, long)]
    out: Option<PathBuf>,

    #[command(flatten)]
    formatter: FormatterSettings,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(clap::Parser, Debug)]
struct BatchOut {
    /// manifest files; literal paths or quoted glob patterns
    #[arg(num_args = 1.., required = true)]
    manifests: Vec<String>,

    #[command(flatten)]
    formatter: FormatterSettings,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl FormatterSettings {
    fn formatter(&self) -> Box<dyn SourceFormatter> {
        if self.gofmt {
            Box::new(Gofmt { program: self.gofmt_program.clone() })
        } else {
            Box::new(Verbatim)
        }
    }
}

impl GenerateOut {
    fn config(&self) -> Config {
        Config {
            dir: self.dir.clone(),
            type_name: self.type_name.clone(),
            field_override: self.field_override.clone(),
            formats: self.formats.clone(),
            out: self.out.clone(),
        }
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn log_level(&self) -> log::LevelFilter {
        if self.quiet {
            return log::LevelFilter::Error;
        }
        match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }

    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Generate(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }
                let config = target.config();
                let generated = config
                    .process_with(target.formatter.formatter().as_ref())
                    .with_context(|| format!("failed to generate methods for {}", config.type_name))?;
                print_diagnostics(&generated.diagnostics);
                generated.write_to(config.out.as_deref()).context("failed to write output")?;
                Ok(())
            }
            Command::Batch(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }
                let jobs = batch::load_jobs(&target.manifests).context("failed to load manifests")?;
                let formatter = target.formatter.formatter();
                let outcomes = batch::run(jobs, formatter.as_ref());

                let mut failed = 0;
                for outcome in &outcomes {
                    match &outcome.result {
                        Ok(generated) => print_diagnostics(&generated.diagnostics),
                        Err(error) => {
                            failed += 1;
                            eprintln!(
                                "{} {} ({}): {error}",
                                "error:".red().bold(),
                                outcome.job.config.type_name,
                                outcome.job.manifest.display(),
                            );
                        }
                    }
                }
                if failed > 0 {
                    bail!("{failed} of {} jobs failed", outcomes.len());
                }
                log::info!("{} jobs done", outcomes.len());
                Ok(())
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn print_diagnostics(diagnostics: &Diagnostics) {
    for diag in diagnostics {
        let label = match diag.severity {
            Severity::Warning => "warning:".yellow().bold(),
            Severity::Note => "note:".cyan(),
        };
        eprintln!("{label} {diag}");
    }
}
