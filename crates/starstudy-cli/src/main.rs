use clap::{Parser, Subcommand};
use starstudy_core::Config;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "starstudy", version, about = "StarStudy CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parent account: sign up, sign in, sign out
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
    /// Children on the roster
    Child {
        #[command(subcommand)]
        action: commands::child::ChildAction,
    },
    /// Award one star to a child
    Star {
        /// Child ID
        child_id: String,
    },
    /// Study session countdown
    Session {
        #[command(subcommand)]
        action: commands::session::SessionAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(Config::load_or_default().logging.filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();
    let result = match cli.command {
        Commands::Auth { action } => commands::auth::run(action).await,
        Commands::Child { action } => commands::child::run(action).await,
        Commands::Star { child_id } => commands::star::run(&child_id).await,
        Commands::Session { action } => commands::session::run(action).await,
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
