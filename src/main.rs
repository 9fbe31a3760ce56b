mod cli;
mod engine;
mod error;
mod logger;
mod model;
mod orchestrator;
mod privilege;
mod session;
mod text_summary;

use clap::Parser;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = cli::Cli::parse();

    match cli::run(args).await {
        // Completed and cancelled sessions both exit 0.
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("Error: {e:#}");
            let code = e
                .downcast_ref::<error::RepairError>()
                .map(error::RepairError::exit_code)
                .unwrap_or(1);
            std::process::exit(code);
        }
    }
}
