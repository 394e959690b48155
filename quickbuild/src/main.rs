//! CLI entry point for quickbuild.
//! Usage: quickbuild [--config-file qb.cfg] area.qb > area.mush

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};

use quickbuild::{Compiler, DEFAULT_CONFIG_FILE, Options};

#[derive(Parser)]
#[command(author, version, about = "Compile quickbuild area files into PennMUSH building commands.")]
struct Cli {
    /// Area files to compile, in order. Reads stdin when empty or `-`.
    inputs: Vec<PathBuf>,
    /// Directives read before any input.
    #[arg(long, value_name = "FILE")]
    config_file: Option<PathBuf>,
    /// Do not read a configuration file.
    #[arg(long, conflicts_with = "config_file")]
    no_config_file: bool,
    /// Disable <B>racket-style exit aliases.
    #[arg(short = 'b', long)]
    nobrackets: bool,
    /// REVERSE registers one direction only.
    #[arg(long)]
    noreverse: bool,
    /// Log opcodes and graph edges.
    #[arg(short, long)]
    debug: bool,
    /// Write commands to FILE instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    out: Option<PathBuf>,
}

impl Cli {
    fn options(&self) -> Options {
        Options {
            bidirectional_reverse: !self.noreverse,
            brackets: !self.nobrackets,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut logger = env_logger::Builder::from_default_env();
    if cli.debug {
        logger.filter_level(LevelFilter::Debug);
    }
    logger.init();

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("ERROR: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Returns `Ok(false)` when compilation stopped on a fatal error that has
/// already been reported.
fn run(cli: &Cli) -> Result<bool> {
    let mut compiler = Compiler::new(cli.options())?;

    if let Some((name, text)) = read_config(cli)? {
        compiler.add_source(&name, &text);
    }
    if cli.inputs.is_empty() {
        compiler.add_source("-", &read_input(Path::new("-"))?);
    }
    for path in &cli.inputs {
        let text = read_input(path)?;
        compiler.add_source(&path.display().to_string(), &text);
    }
    if cli.debug {
        for instruction in compiler.program() {
            debug!("{instruction}");
        }
    }

    let output = match compiler.finish() {
        Ok(output) => output,
        Err(e) => {
            for diagnostic in compiler.diagnostics() {
                eprintln!("{diagnostic}");
            }
            eprintln!("ERROR: {e}");
            return Ok(false);
        },
    };
    for diagnostic in &output.diagnostics {
        eprintln!("{diagnostic}");
    }
    if cli.debug {
        for edge in output.graph.edge_list() {
            debug!("edge {edge}");
        }
    }

    let mut text = output.commands.join("\n");
    text.push('\n');
    match &cli.out {
        Some(path) => fs::write(path, text).with_context(|| format!("writing '{}'", path.display()))?,
        None => io::stdout().write_all(text.as_bytes()).context("writing to stdout")?,
    }
    Ok(true)
}

/// The configuration source, if any. A missing default file is skipped; a
/// missing file named on the command line is an error.
fn read_config(cli: &Cli) -> Result<Option<(String, String)>> {
    if cli.no_config_file {
        return Ok(None);
    }
    let (path, explicit) = match &cli.config_file {
        Some(path) => (path.clone(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    if !explicit && !path.exists() {
        info!("no {DEFAULT_CONFIG_FILE} found, continuing without configuration");
        return Ok(None);
    }
    let text = fs::read_to_string(&path).with_context(|| format!("unable to read config '{}'", path.display()))?;
    Ok(Some((path.display().to_string(), text)))
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text).context("reading stdin")?;
        return Ok(text);
    }
    fs::read_to_string(path).with_context(|| format!("unable to read '{}'", path.display()))
}
