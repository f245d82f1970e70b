use clap::Parser;
use fingerprint_panel::{
    cli::{Cli, Commands, ConsoleCommand, CONSOLE_HELP},
    CaptureBackend, CapturePanel, HttpBackend, PanelConfig, SessionState,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fingerprint_panel=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let mut config = PanelConfig::from_env()?;
    cli.apply(&mut config);

    match cli.command.clone().unwrap_or(Commands::Console) {
        Commands::Status => {
            let backend = HttpBackend::new(&config)?;
            let status = backend.device_status().await?;
            println!(
                "open: {}, capturing: {}",
                status.is_open,
                status
                    .is_capturing
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "unknown".to_string())
            );
            Ok(())
        }
        Commands::Console => run_console(config).await,
    }
}

async fn run_console(config: PanelConfig) -> anyhow::Result<()> {
    info!("🚀 Starting fingerprint panel");

    let panel = Arc::new(CapturePanel::from_config(config)?);
    println!("{}", CONSOLE_HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        };

        let Some(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<ConsoleCommand>() {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        match command {
            ConsoleCommand::Quit => break,
            ConsoleCommand::Help => println!("{}", CONSOLE_HELP),
            command => {
                // Long captures must not block the console
                let panel = Arc::clone(&panel);
                tokio::spawn(async move { execute(&panel, command).await });
            }
        }
    }

    if panel.state() == SessionState::Connected {
        if let Err(e) = panel.close().await {
            warn!("Failed to close device on exit: {}", e);
        }
    }

    info!("🛑 Fingerprint panel stopped");
    Ok(())
}

async fn execute(panel: &CapturePanel, command: ConsoleCommand) {
    let outcome = match command {
        ConsoleCommand::Open => panel.open().await,
        ConsoleCommand::Close => panel.close().await,
        ConsoleCommand::Single => panel.capture_single().await.map(drop),
        ConsoleCommand::Hand {
            hand,
            expected_fingers,
        } => panel.capture_multiple(hand, expected_fingers).await.map(drop),
        ConsoleCommand::Thumbs => panel.capture_thumbs().await.map(drop),
        ConsoleCommand::Template => panel.create_template().await.map(drop),
        ConsoleCommand::FingerType(kind) => {
            if let Err(e) = panel.set_finger_type(kind).await {
                warn!("Finger type task failed: {}", e);
            }
            Ok(())
        }
        ConsoleCommand::Save => panel.save_capture().map(drop),
        ConsoleCommand::Compare(Some((first, second))) => {
            panel.compare_templates(&first, &second).await.map(drop)
        }
        ConsoleCommand::Compare(None) => match panel.stored_templates() {
            Ok(stored) if stored.len() >= 2 => panel
                .compare_templates(stored[0].as_str(), stored[1].as_str())
                .await
                .map(drop),
            Ok(_) => {
                println!("Need two stored templates; run 'template' first");
                Ok(())
            }
            Err(e) => Err(e),
        },
        ConsoleCommand::Liveness => panel.check_liveness().await.map(drop),
        ConsoleCommand::Beep(times) => panel.beep(times).await,
        ConsoleCommand::StopPreview => panel.stop_preview().await,
        ConsoleCommand::Status => match panel.poll_status().await {
            Ok(state) => {
                let stats = panel.preview_stats().unwrap_or_default();
                println!(
                    "[status] {:?}, preview frames received {} rendered {}",
                    state, stats.frames_received, stats.frames_rendered
                );
                Ok(())
            }
            Err(e) => {
                // Status checks do not notify on their own
                println!("[status] {}", e.user_message());
                Err(e)
            }
        },
        ConsoleCommand::Help | ConsoleCommand::Quit => Ok(()),
    };

    // Failures were already shown as notifications
    if let Err(e) = outcome {
        debug!("Command failed: {}", e);
    }
}
