use std::io;
use std::process::ExitCode;
use clap::Parser;
use querydb::cli::CliArgs;
use querydb::{repl, QueryDb};
use tracing::info;

fn main() -> ExitCode {
    // Logs go to stderr so stdout stays clean for results
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let args = CliArgs::parse();

    let config = match args.effective_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Starting querydb...");
    let db = match QueryDb::connect(&config) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to connect to database: {}", e);
            return ExitCode::FAILURE;
        }
    };
    println!("{}", db);

    let stdin = io::stdin();
    let stdout = io::stdout();
    match repl::run_repl(&db, stdin.lock(), stdout.lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
