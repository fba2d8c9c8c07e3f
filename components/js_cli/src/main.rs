//! `jsvm`: run a compiled JavaScript program
//!
//! Parses CLI arguments, installs logging and delegates to the Runtime.

use clap::Parser;
use js_cli::{Cli, CliError, Runtime};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut runtime = Runtime::new(cli.runtime_config()).with_disassemble(cli.disassemble);
    match runtime.execute_file(&cli.file) {
        Ok(Some(output)) => println!("{}", output),
        Ok(None) => {}
        Err(CliError::Uncaught(error)) => {
            eprintln!("{}", error.format_trace());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
