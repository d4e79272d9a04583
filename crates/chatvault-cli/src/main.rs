use chatvault_cli::{run, Cli};
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() {
    // Diagnostics go to stderr so machine-facing stdout stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
