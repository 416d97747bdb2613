//! spanlink CLI entry point.

use spanlink_lib::cli::{self, Cli};
use spanlink_lib::core::Result;

fn main() {
    let cli = Cli::parse_args();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.load_config()?;
    cli.init_logging(&config)?;

    // Fixed-size worker pool for ingestion and query calls
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.worker_threads)
        .enable_all()
        .build()?;

    runtime.block_on(cli::execute(cli, config))
}
