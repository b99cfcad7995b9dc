use clap::Parser;
use colored::*;
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::PathBuf;

use pandoc_mermaid_lib::exit_codes::exit;
use pandoc_mermaid_lib::{Config, FilterError, run_filter};

/// Render Mermaid code blocks in a pandoc document to images.
///
/// Use as `pandoc --filter pandoc-mermaid`. Options are read from the
/// environment: MERMAID_BIN, MERMAID_CONFIG, PUPPETEER_CFG,
/// MERMAID_IMAGE_PREFIX, MERMAID_LATEX_FORMAT, MERMAID_HTML_FORMAT,
/// MERMAID_FORCE_FORMAT, MERMAID_AUTO_PDF_FALLBACK and MERMAID_PDF_FIT.
#[derive(Parser)]
#[command(version, about, long_about)]
struct Cli {
    /// Output format pandoc is producing (passed by pandoc, e.g. html, latex)
    target: Option<String>,

    /// Read the JSON document from a file instead of stdin
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Write the JSON document to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    // stdout carries the document, so all logging goes to stderr
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", "Config error".red().bold(), e);
            exit::tool_error();
        }
    };

    if let Err(e) = run(&cli, config) {
        report(&e);
        match e {
            FilterError::RenderFailed { .. } => exit::renderer_status(e.exit_code()),
            _ => exit::tool_error(),
        }
    }
}

fn run(cli: &Cli, config: Config) -> Result<(), FilterError> {
    let input: Box<dyn Read> = match &cli.input {
        Some(path) => Box::new(BufReader::new(File::open(path).map_err(|e| FilterError::io(path, e))?)),
        None => Box::new(io::stdin().lock()),
    };

    // Buffered so a failed run never leaves a half-written document behind
    let mut buffer = Vec::new();
    run_filter(config, ".", cli.target.as_deref().unwrap_or(""), input, &mut buffer)?;

    match &cli.output {
        Some(path) => fs::write(path, &buffer).map_err(|e| FilterError::io(path, e)),
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(&buffer)
                .and_then(|()| stdout.flush())
                .map_err(|e| FilterError::io("<stdout>", e))
        }
    }
}

fn report(err: &FilterError) {
    eprintln!("{}: {}", "Error".red().bold(), err);
    if let FilterError::RenderFailed { command, stderr, .. } = err {
        eprintln!("Command: {command}");
        let stderr = stderr.trim();
        if !stderr.is_empty() {
            eprintln!("{stderr}");
        }
    }
}
