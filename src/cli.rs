//! CLI interface for woosh-live

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;

use crate::config::Config;
use crate::live::{LiveSession, Role, SessionEvent, SessionOptions, SessionStatus};
use crate::{credentials, menu};

#[derive(Parser)]
#[command(name = "woosh-live")]
#[command(about = "WOOSH CAFE voice assistant with guest and operator personas", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a live voice conversation
    Talk {
        /// Persona to talk to (guest barista or operator COO)
        #[arg(short, long, value_enum, default_value = "guest")]
        role: Role,
        /// Override the conversational model
        #[arg(long)]
        model: Option<String>,
    },
    /// Print the café menu catalog
    Menu,
    /// List audio capture and playback devices
    Devices,
    /// Configure the assistant
    Config {
        /// Set the API key (stored in the OS keyring)
        #[arg(long)]
        set_api_key: Option<String>,
        /// Remove the stored API key
        #[arg(long)]
        delete_api_key: bool,
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Talk { role, model } => talk(role, model).await,
        Commands::Menu => {
            print!("{}", menu::render_catalog(&menu::MENU_DATA));
            Ok(())
        }
        Commands::Devices => devices(),
        Commands::Config {
            set_api_key,
            delete_api_key,
            show,
        } => configure(set_api_key, delete_api_key, show),
    }
}

/// Localized status line shown to the user
fn status_text(status: SessionStatus, role: Role) -> &'static str {
    match status {
        SessionStatus::Connecting => "正在連線至 Woosh AI...",
        SessionStatus::Connected => match role {
            Role::Guest => "請直接說話，我在聽...",
            Role::Operator => "營運長在線，請下達指令...",
        },
        SessionStatus::Error => "連線失敗，請檢查網路或 API Key",
        SessionStatus::Closed => "通話已結束",
    }
}

async fn talk(role: Role, model: Option<String>) -> Result<()> {
    let config = Config::load().unwrap_or_default();
    let mut options = SessionOptions::from_config(&config);
    if let Some(model) = model {
        options.model = model;
    }

    println!("{}", role.display_name());
    println!("{}", status_text(SessionStatus::Connecting, role));

    let mut session = LiveSession::open(role, options).await?;
    let mut events = session
        .take_events()
        .context("session events already taken")?;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(SessionEvent::Status(status)) => {
                    println!("{}", status_text(status, role));
                    if status.is_terminal() {
                        break;
                    }
                }
                Some(SessionEvent::AgentTurnComplete) => debug!("agent turn complete"),
                Some(SessionEvent::AgentInterrupted) => debug!("agent interrupted"),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        }
    }

    session.close();
    println!("{}", status_text(SessionStatus::Closed, role));
    Ok(())
}

#[cfg(feature = "voice")]
fn devices() -> Result<()> {
    let inputs = crate::live::capture::list_input_devices()?;
    let outputs = crate::live::playback::list_output_devices()?;

    println!("Input devices:");
    if inputs.is_empty() {
        println!("  (none found)");
    }
    for name in inputs {
        println!("  {name}");
    }

    println!("Output devices:");
    if outputs.is_empty() {
        println!("  (none found)");
    }
    for name in outputs {
        println!("  {name}");
    }
    Ok(())
}

#[cfg(not(feature = "voice"))]
fn devices() -> Result<()> {
    println!("Audio device listing requires the 'voice' feature.");
    println!("Rebuild with: cargo build --features voice");
    Ok(())
}

fn configure(set_api_key: Option<String>, delete_api_key: bool, show: bool) -> Result<()> {
    if let Some(key) = set_api_key {
        credentials::set_api_key(&key)?;
        println!("API key stored.");
        return Ok(());
    }

    if delete_api_key {
        credentials::delete_api_key()?;
        println!("API key removed.");
        return Ok(());
    }

    if show {
        let config = Config::load()?;
        println!("config file: {}", crate::config::config_path()?.display());
        println!("model:       {}", config.live.model);
        println!("endpoint:    {}", config.live.endpoint);
        println!(
            "api key:     {}",
            if credentials::is_configured() {
                "configured"
            } else {
                "not set"
            }
        );
        return Ok(());
    }

    println!("Use --set-api-key, --delete-api-key or --show.");
    Ok(())
}
