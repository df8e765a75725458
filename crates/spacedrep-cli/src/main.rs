//! spacedrep CLI — the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use spacedrep_core::model::{CardId, SubjectId, UserId};

mod commands;

#[derive(Parser)]
#[command(name = "spacedrep", version, about = "Spaced-repetition review scheduler")]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create starter config and example deck
    Init,

    /// Validate deck TOML files
    Validate {
        /// Path to deck file or directory
        #[arg(long)]
        deck: PathBuf,
    },

    /// Import cards from deck files
    Import {
        #[arg(long)]
        user: UserId,

        /// Path to deck file or directory
        #[arg(long)]
        deck: PathBuf,
    },

    /// Build a review session
    Session {
        #[arg(long)]
        user: UserId,

        /// Restrict to one subject
        #[arg(long)]
        subject: Option<SubjectId>,

        /// Maximum cards in the session (default from config)
        #[arg(long)]
        max_size: Option<usize>,

        /// Share of the session new cards may claim (default from config)
        #[arg(long)]
        new_ratio: Option<f64>,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Submit a self-graded review (quality 0-5)
    Review {
        #[arg(long)]
        user: UserId,

        #[arg(long)]
        card: CardId,

        #[arg(long, allow_negative_numbers = true)]
        quality: i64,

        /// Review time (RFC 3339), defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Answer a card in quiz mode (graded, does not reschedule)
    Quiz {
        #[arg(long)]
        user: UserId,

        #[arg(long)]
        card: CardId,

        #[arg(long)]
        answer: String,
    },

    /// Show a card with its schedule and next intervals
    Show {
        #[arg(long)]
        user: UserId,

        #[arg(long)]
        card: CardId,
    },

    /// Show progress per subject
    Progress {
        #[arg(long)]
        user: UserId,

        #[arg(long)]
        subject: Option<SubjectId>,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Rebuild a subject's progress counters from the attempt log
    Reconcile {
        #[arg(long)]
        user: UserId,

        #[arg(long)]
        subject: SubjectId,
    },

    /// Delete a card
    Delete {
        #[arg(long)]
        user: UserId,

        #[arg(long)]
        card: CardId,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("spacedrep=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    let result = match cli.command {
        Commands::Init => commands::init::execute(),
        Commands::Validate { deck } => commands::validate::execute(deck),
        Commands::Import { user, deck } => commands::import::execute(user, deck, config).await,
        Commands::Session {
            user,
            subject,
            max_size,
            new_ratio,
            format,
        } => commands::session::execute(user, subject, max_size, new_ratio, format, config).await,
        Commands::Review {
            user,
            card,
            quality,
            at,
        } => commands::review::execute(user, card, quality, at, config).await,
        Commands::Quiz { user, card, answer } => {
            commands::quiz::execute(user, card, answer, config).await
        }
        Commands::Show { user, card } => commands::show::execute(user, card, config).await,
        Commands::Progress {
            user,
            subject,
            format,
        } => commands::progress::execute(user, subject, format, config).await,
        Commands::Reconcile { user, subject } => {
            commands::reconcile::execute(user, subject, config).await
        }
        Commands::Delete { user, card } => commands::delete::execute(user, card, config).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
