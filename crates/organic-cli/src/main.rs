use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use organic_asm::{Assembler, AssemblerConfig};
use organic_cli::{diagnostics, render_json, render_text, to_bytes, write_binary, Endian};

#[derive(Parser, Debug)]
#[command(author, version, about = "DCPU-16 assembler", long_about = None)]
struct Cli {
    /// Input assembly file (`-` reads stdin)
    #[arg(value_name = "INPUT")]
    input: Option<String>,
    /// Output binary (default: <input stem>.bin, `-` writes to stdout)
    #[arg(value_name = "OUTPUT")]
    target: Option<String>,
    /// Alternative way to give the output file
    #[arg(short, long, value_name = "FILE")]
    output: Option<String>,
    /// Write a listing to FILE
    #[arg(short, long, value_name = "FILE")]
    listing: Option<String>,
    /// Emit little-endian words (default is big-endian)
    #[arg(long)]
    little_endian: bool,
    /// Never pack literals into the instruction word
    #[arg(long)]
    long_literals: bool,
    /// Define an equate before assembly. Repeatable.
    #[arg(short, long = "equate", num_args = 2, value_names = ["NAME", "VALUE"], action = ArgAction::Append)]
    equates: Vec<String>,
    /// Add DIR to the search path for `.include <file>`. Repeatable.
    #[arg(short, long = "include", value_name = "DIR")]
    include: Vec<PathBuf>,
    /// Assemble SOURCE instead of reading an input file
    #[arg(short, long, value_name = "SOURCE")]
    pipe: Option<String>,
    /// Resolve relative includes from DIR
    #[arg(short, long, value_name = "DIR")]
    working_directory: Option<PathBuf>,
    /// Do not print diagnostics
    #[arg(short, long)]
    quiet: bool,
    /// Print the listing to stdout
    #[arg(short, long)]
    verbose: bool,
    /// Listing format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// JSON assembler configuration
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat { Text, Json }

fn load_config(path: Option<&Path>) -> Result<AssemblerConfig> {
    let Some(path) = path else { return Ok(AssemblerConfig::default()) };
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn read_source(cli: &Cli) -> Result<(String, String)> {
    if let Some(source) = &cli.pipe {
        return Ok((source.clone(), "[piped input]".to_string()));
    }
    match cli.input.as_deref() {
        None => bail!("no input file specified"),
        Some("-") => {
            let mut source = String::new();
            std::io::stdin().read_to_string(&mut source)?;
            Ok((source, "[stdin]".to_string()))
        }
        Some(path) => {
            let source = std::fs::read_to_string(path).with_context(|| format!("file not found ({path})"))?;
            Ok((source, path.to_string()))
        }
    }
}

fn default_output(input: Option<&str>) -> String {
    let stem = input
        .filter(|i| *i != "-")
        .and_then(|i| Path::new(i).file_stem())
        .map_or_else(|| "out".to_string(), |s| s.to_string_lossy().into_owned());
    format!("{stem}.bin")
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;
    if let Ok(list) = std::env::var("ORGINCLUDE") {
        config = config.with_include_list(&list);
    }
    config.include_path.extend(cli.include.iter().cloned());
    config.force_long_literals |= cli.long_literals;
    debug!(?config, "configuration");

    let (source, file_name) = read_source(&cli)?;
    let mut assembler = Assembler::new(config);
    for pair in cli.equates.chunks(2) {
        let [name, value] = pair else { bail!("--equate needs NAME and VALUE") };
        let value = assembler
            .evaluate(value)
            .resolved()
            .ok_or_else(|| anyhow!("--equate {name}: illegal expression `{value}`"))?;
        assembler.define_equate(name, value).map_err(|e| anyhow!("--equate {name}: {e}"))?;
    }

    let previous_dir = match &cli.working_directory {
        Some(dir) => {
            let previous = std::env::current_dir()?;
            std::env::set_current_dir(dir).with_context(|| format!("changing to {}", dir.display()))?;
            Some(previous)
        }
        None => None,
    };
    let assembly = assembler.assemble(&source, &file_name);
    if let Some(dir) = previous_dir {
        std::env::set_current_dir(dir)?;
    }

    if !cli.quiet {
        for line in diagnostics(&assembly.entries) {
            eprintln!("{line}");
        }
    }

    let endian = if cli.little_endian { Endian::Little } else { Endian::Big };
    let target = cli
        .output
        .clone()
        .or_else(|| cli.target.clone())
        .unwrap_or_else(|| default_output(cli.input.as_deref().filter(|_| cli.pipe.is_none())));
    write_binary(&target, &to_bytes(&assembly.words(), endian))?;

    if cli.listing.is_some() || cli.verbose {
        let listing = match cli.format {
            OutputFormat::Text => render_text(&assembly.entries),
            OutputFormat::Json => render_json(&assembly)?,
        };
        if let Some(path) = &cli.listing {
            std::fs::write(path, &listing).with_context(|| format!("writing {path}"))?;
        }
        if cli.verbose {
            print!("{listing}");
        }
    }

    if let Some(error) = &assembly.error {
        bail!("{error}");
    }
    let errors = assembly.errors().count();
    anyhow::ensure!(errors == 0, "assembly finished with {errors} error(s)");
    Ok(())
}
