use clap::Parser;
use minidp::cli::{
    configured_log_level, execute_command, format_error_report, get_log_level, Cli,
};
use tracing::{debug, error, trace};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let configured = configured_log_level(cli.config.as_deref());
    let log_level = get_log_level(cli.verbose, configured.as_deref());

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .with_target(cli.verbose >= 2)
        .with_line_number(cli.verbose >= 2)
        .init();

    debug!("minidp started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    let verbose = cli.verbose;
    if let Err(e) = execute_command(cli).await {
        error!("Fatal error: {:#}", e);
        eprintln!("{}", format_error_report(&e, verbose));
        std::process::exit(1);
    }
}
