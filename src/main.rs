use clap::Parser;
use reshelf::cli::{Cli, run};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "RESHELF_LOG";

fn main() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    std::process::exit(run(cli));
}
