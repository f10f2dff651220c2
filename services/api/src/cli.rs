use crate::demo::{run_demo, run_snapshot_command, DemoArgs, SnapshotAction, SnapshotArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use event_admission::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Event Admission Service",
    about = "Run waiting-list lotteries, backfill, and entrant moderation for event signups",
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
    /// Operate on a single event inside a JSON store snapshot
    Event {
        #[command(subcommand)]
        command: EventCommand,
    },
    /// Run a scripted lottery, decline, and backfill walkthrough
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum EventCommand {
    /// Run the lottery, or backfill if it already ran, and print the outcome
    Draw(SnapshotArgs),
    /// Print the accepted entrants as CSV
    Export(SnapshotArgs),
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
        Command::Event {
            command: EventCommand::Draw(args),
        } => run_snapshot_command(args, SnapshotAction::Draw).await,
        Command::Event {
            command: EventCommand::Export(args),
        } => run_snapshot_command(args, SnapshotAction::Export).await,
        Command::Demo(args) => run_demo(args).await,
    }
}
