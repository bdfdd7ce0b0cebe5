use clap::{Parser, Subcommand};
use rhythmiq_core::CoreError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "rhythmiq-cli", version, about = "Rhythmiq CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Account and sign-in
    User {
        #[command(subcommand)]
        action: commands::user::UserAction,
    },
    /// Focus timer
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// XP balance and level progress
    Xp {
        #[command(subcommand)]
        action: commands::xp::XpAction,
    },
    /// Task management
    Task {
        #[command(subcommand)]
        action: commands::task::TaskAction,
    },
    /// Achievement badges
    Achievements {
        #[command(subcommand)]
        action: commands::achievements::AchievementsAction,
    },
    /// Daily challenges
    Challenge {
        #[command(subcommand)]
        action: commands::challenge::ChallengeAction,
    },
    /// Redeem XP for merchandise
    Shop {
        #[command(subcommand)]
        action: commands::shop::ShopAction,
    },
    /// Top users by XP
    Leaderboard {
        /// Number of users to show (default: leaderboard.size)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Music tracks and the player
    Track {
        #[command(subcommand)]
        action: commands::library::TrackAction,
    },
    /// Playlist management
    Playlist {
        #[command(subcommand)]
        action: commands::library::PlaylistAction,
    },
    /// Send feedback
    Feedback {
        /// Feedback text
        message: String,
    },
    /// Admin dashboard
    Admin {
        #[command(subcommand)]
        action: commands::admin::AdminAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::User { action } => commands::user::run(action),
        Commands::Timer { action } => commands::timer::run(action),
        Commands::Xp { action } => commands::xp::run(action),
        Commands::Task { action } => commands::task::run(action),
        Commands::Achievements { action } => commands::achievements::run(action),
        Commands::Challenge { action } => commands::challenge::run(action),
        Commands::Shop { action } => commands::shop::run(action),
        Commands::Leaderboard { limit } => commands::leaderboard::run(limit),
        Commands::Track { action } => commands::library::run_track(action),
        Commands::Playlist { action } => commands::library::run_playlist(action),
        Commands::Feedback { message } => commands::feedback::run(&message),
        Commands::Admin { action } => commands::admin::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        if e.downcast_ref::<CoreError>().is_some_and(CoreError::is_transient) {
            eprintln!("the backend is busy, try again");
        }
        std::process::exit(1);
    }
}
