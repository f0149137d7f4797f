//! stepwright - run Gherkin-style API and UI test scripts

use clap::Parser;
use stepwright::{cli, commands::Commands};

#[derive(Parser)]
#[command(name = "stepwright", about = "Gherkin-style API and UI test runner")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli::dispatch(cli.command).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
