use anyhow::Context;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use tremor_level::config::{CliArgs, CompileConfig, LogFormat};
use tremor_level::pipeline::{Compiler, print_stats};

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // Init tracing
    let filter = if args.verbose {
        EnvFilter::new("tremor_level=debug")
    } else {
        EnvFilter::new("tremor_level=info")
    };
    match args.log_format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }

    let config: CompileConfig = args.into();

    // Configure rayon thread pool
    if let Some(threads) = config.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to configure rayon thread pool")?;
    }

    match Compiler::run(&config) {
        Ok(stats) => {
            print_stats(&stats);
            println!("Compilation took {:.3}s", stats.total_secs);
            Ok(())
        }
        Err(e) => {
            error!(%e, "Compile failed");
            Err(anyhow::anyhow!(e))
                .with_context(|| format!("failed to compile {}", config.map.display()))
        }
    }
}
