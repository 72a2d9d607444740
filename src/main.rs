use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(cli::log_directives(cli.verbose)))
        .with_target(false)
        .without_time()
        .init();

    cli::run(cli)
}
