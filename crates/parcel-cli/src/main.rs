//! `parcel` command line entry point.

mod app;
mod fetch;
mod seal;
mod tracker;

use clap::Parser;

use crate::app::{App, Commands};

fn main() -> anyhow::Result<()> {
    let app = App::parse();

    let config = parcel::ParcelConfig::load_default(app.config.as_deref())?;
    let level = match app.verbose {
        0 => config.logging.level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(level);

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    match app.cmd {
        Commands::Fetch(args) => runtime.block_on(fetch::run(args, config)),
        Commands::Seal(args) => seal::run(args),
    }
}

/// `RUST_LOG` wins over the configured level and `-v`.
fn setup_logging(level: &str) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .init();
}
