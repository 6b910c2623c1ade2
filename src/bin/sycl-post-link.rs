//! sycl-post-link command line tool.
//!
//! Reads a linked device module and produces per-kernel or per-source
//! partitions, lowers specialization constants and writes a file table.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use sycl_post_link::core::{PostLinkConfig, SpecConstMode, SplitMode};
use sycl_post_link::driver::{self, Outcome};

#[derive(Parser, Debug)]
#[command(
    name = "sycl-post-link",
    version,
    about = "SYCL post-link device code processing tool",
    long_about = "Splits a linked device module into per-source or per-kernel modules, \
                  lowers specialization constants and writes a file table describing \
                  the generated artifacts."
)]
struct Cli {
    /// Input module (text or binary IR), `-` for standard input
    #[arg(default_value = "-")]
    input: PathBuf,

    /// Output file table, or the module itself with --ir-output-only
    /// (default: <input stem>.files)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Directory for the generated files (default: the output file's directory)
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Enable binary output on terminals
    #[arg(short, long)]
    force: bool,

    /// Output a single module and nothing else
    #[arg(long)]
    ir_output_only: bool,

    /// Write output as text IR
    #[arg(short = 'S')]
    output_assembly: bool,

    /// Split input into multiple modules
    #[arg(long, value_enum, value_name = "MODE")]
    split: Option<SplitMode>,

    /// Generate exported symbol files
    #[arg(long)]
    symbols: bool,

    /// Lower and generate specialization constants information
    #[arg(long, value_enum, value_name = "MODE")]
    spec_const: Option<SpecConstMode>,
}

impl From<Cli> for PostLinkConfig {
    fn from(cli: Cli) -> Self {
        PostLinkConfig {
            input: cli.input,
            output: cli.output,
            out_dir: cli.out_dir,
            force: cli.force,
            ir_output_only: cli.ir_output_only,
            output_assembly: cli.output_assembly,
            split: cli.split,
            symbols: cli.symbols,
            spec_const: cli.spec_const,
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_default_env()
        .format_timestamp(None)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() { 1 } else { 0 };
            // Help and version go to stdout; nothing useful to do if printing fails
            let _ = err.print();
            return ExitCode::from(code);
        }
    };

    let config = PostLinkConfig::from(cli);
    match driver::run(&config) {
        Ok(Outcome::Module(path)) => {
            log::debug!("done: {}", path.display());
            ExitCode::SUCCESS
        }
        Ok(Outcome::Table { path, rows }) => {
            log::debug!("done: {} ({} rows)", path.display(), rows);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("sycl-post-link: {err}");
            ExitCode::FAILURE
        }
    }
}
