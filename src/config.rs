use std::path::PathBuf;

use clap::Parser;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    #[value(name = "text")]
    Text,
    #[value(name = "json")]
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Fully resolved compiler configuration (constructed from CLI args).
#[derive(Debug, Clone)]
pub struct CompileConfig {
    pub map: PathBuf,
    pub output: PathBuf,
    /// Directory holding `textures/texturecache.txt`.
    pub data_dir: Option<PathBuf>,
    /// Generate BSP portals for the world model.
    pub portals: bool,
    /// Write compile statistics as JSON here.
    pub report: Option<PathBuf>,
    pub verbose: bool,
    pub log_format: LogFormat,
    pub threads: Option<usize>,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            map: PathBuf::new(),
            output: PathBuf::new(),
            data_dir: None,
            portals: true,
            report: None,
            verbose: false,
            log_format: LogFormat::Text,
            threads: None,
        }
    }
}

/// CLI argument definition (clap derive).
#[derive(Parser, Debug)]
#[command(
    name = "tremor-mapc",
    about = "Compile brush maps into Tremor level files",
    version
)]
pub struct CliArgs {
    /// Map source file
    #[arg(short = 'm', long)]
    pub map: PathBuf,

    /// Output level file
    #[arg(short = 'o', long)]
    pub output: PathBuf,

    /// Game data directory (texture sizes are read from textures/texturecache.txt)
    #[arg(short = 'd', long)]
    pub data_dir: Option<PathBuf>,

    /// Skip portal generation
    #[arg(long)]
    pub no_portals: bool,

    /// Write compile statistics as JSON to this path
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Log format: text or json
    #[arg(long, value_enum, default_value = "text")]
    pub log_format: LogFormat,

    /// Worker thread count (default: all cores)
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,
}

impl From<CliArgs> for CompileConfig {
    fn from(args: CliArgs) -> Self {
        CompileConfig {
            map: args.map,
            output: args.output,
            data_dir: args.data_dir,
            portals: !args.no_portals,
            report: args.report,
            verbose: args.verbose,
            log_format: args.log_format,
            threads: args.threads,
        }
    }
}
