use clap::Parser;
use fedrouter::cli::{run_cli, Cli};
use fedrouter::logging::{init_logging, LogConfig};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(&LogConfig::from_env())?;
    run_cli(cli)
}
