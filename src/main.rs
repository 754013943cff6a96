use std::process;

use clap::Parser;
use tracing::error;

use wealthplan::cli::{Cli, Command, execute, exit_code};
use wealthplan::logging::init_logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli.log_level) {
        eprintln!("Logging setup failed: {e}");
    }

    if let Command::Serve(args) = &cli.command {
        if let Err(e) = wealthplan::api::run_http_server(args.addr()).await {
            error!(error = %e, "server error");
            process::exit(1);
        }
        return;
    }

    match execute(&cli.command) {
        Ok(output) => println!("{output}"),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(exit_code(&e));
        }
    }
}
