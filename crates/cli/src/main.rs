mod args;
mod ops;
mod state;
mod utils;
mod version;

use std::process::ExitCode;

use args::{Args, Op, Parser};
use state::AppState;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let state = match AppState::try_from(&args) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("swarm-discovery: cannot load settings: {e}");
            return ExitCode::FAILURE;
        }
    };

    match args.command.execute(&state).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("swarm-discovery: {e}");
            ExitCode::FAILURE
        }
    }
}
