//! bibmerge binary
//!
//! Merges every `*.bib` file in `./bibfiles/` into `./merged.bib`. Settings can
//! be overridden with a `bibmerge.toml` in the working directory.

use bibmerge::{run, MergeConfig, CONFIG_FILE_NAME};
use tracing_subscriber::EnvFilter;

/// Log filter when `RUST_LOG` is unset. Parse diagnostics are logged at `warn`.
const DEFAULT_LOG_FILTER: &str = "warn";

fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt().with_env_filter(log_filter()).init();

    let config = MergeConfig::load_or_default(CONFIG_FILE_NAME)?;
    let report = run(&config)?;

    println!(
        "Merged {} entries from {} files into {}",
        report.entries_written,
        report.files.len(),
        config.output.display()
    );
    if report.skipped_blocks > 0 {
        println!("{} blocks were skipped, see warnings above", report.skipped_blocks);
    }

    Ok(())
}
