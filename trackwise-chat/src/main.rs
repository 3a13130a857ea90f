use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};
use trackwise_core::{Profile, Sex, TrackwiseConfig};

use trackwise_chat::{repl, ChatController};

#[derive(Parser, Debug)]
#[command(author, version, about = "TrackWise wellness chat", long_about = None)]
struct Args {
    #[arg(short, long, env = "TRACKWISE_CONFIG", default_value = "trackwise.toml")]
    config: String,

    /// Your name, used to greet and address you
    #[arg(long)]
    name: Option<String>,

    #[arg(long)]
    age: Option<u32>,

    /// male, female or "prefer not to say"
    #[arg(long)]
    sex: Option<Sex>,

    /// Chronic conditions you want the assistant to be aware of
    #[arg(long)]
    conditions: Option<String>,

    /// Start without a profile and skip the questions
    #[arg(long, conflicts_with_all = ["name", "age", "sex", "conditions"])]
    skip_profile: bool,
}

impl Args {
    fn profile_from_flags(&self) -> Option<Profile> {
        if self.name.is_none() && self.age.is_none() && self.sex.is_none() && self.conditions.is_none()
        {
            return None;
        }
        Some(
            Profile::new()
                .with_name(self.name.as_deref().unwrap_or_default())
                .with_age(self.age)
                .with_sex(self.sex)
                .with_conditions(self.conditions.as_deref().unwrap_or_default()),
        )
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config = match TrackwiseConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Logs go to stderr; stdout carries the conversation.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let controller = Arc::new(ChatController::from_config(&config)?);

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            let _ = shutdown_tx.send(());
        }
    });

    let mut lines = repl::stdin_lines();
    let profile = if args.skip_profile {
        None
    } else if let Some(profile) = args.profile_from_flags() {
        Some(profile)
    } else {
        repl::collect_profile(&mut lines).await
    };

    repl::run_repl(controller, lines, profile, tx.subscribe()).await
}
