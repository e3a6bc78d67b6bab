use crate::demo::{run_availability, run_demo, AvailabilityArgs, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use rental_engine::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Rental Engine",
    about = "Check availability, price rentals, and serve the rental request API",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Check a candidate rental against an unavailability calendar CSV
    Availability(AvailabilityArgs),
    /// Walk a rental request from quote to completion with in-memory stores
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Availability(args) => run_availability(args),
        Command::Demo(args) => run_demo(args),
    }
}
