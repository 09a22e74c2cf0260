//! huntpilot CLI and daemon entry point.

mod args;
mod daemon;

use clap::Parser;
use huntpilot_core::config::Profile;
use huntpilot_core::protocol::{Command, Request, ResponseData};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::args::{Cli, Commands, DaemonArgs, OnOff};
use crate::daemon::bridge::BridgeHandle;
use crate::daemon::client::DaemonClient;
use crate::daemon::server::DaemonServer;
use crate::daemon::{driver, paths};

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        // Daemon command runs the server, all other commands are clients
        Commands::Daemon(args) => run_daemon(args),
        command => {
            if let Err(e) = run_client_command(command) {
                error!("{}", e);
                std::process::exit(1);
            }
        }
    }
}

/// Convert CLI args to a protocol Command.
///
/// Returns None for commands that don't require daemon communication.
fn cli_to_command(command: &Commands) -> Option<Command> {
    match command {
        Commands::Target(args) => Some(Command::Target {
            x: args.x,
            y: args.y,
        }),
        Commands::Click(args) => Some(Command::Click {
            x: args.x,
            y: args.y,
        }),
        Commands::Slot(args) => Some(Command::Slot {
            bar: args.bar,
            index: args.index,
        }),
        Commands::Key(args) => Some(Command::Key {
            key: args.key.clone(),
            hold_ms: args.hold,
        }),
        Commands::Chat(args) => Some(Command::Chat {
            text: args.text.clone(),
        }),
        Commands::Rotation(args) => Some(Command::Rotation {
            enabled: matches!(args.state, OnOff::On),
        }),
        Commands::WaitCursor(args) => Some(Command::WaitCursor {
            pattern: args.pattern.clone(),
            timeout_ms: Some(args.timeout),
            regex: Some(args.regex),
        }),
        Commands::Status => Some(Command::Status),
        Commands::Daemon(_) => unreachable!("Daemon command handled separately"),
        Commands::Examples => None,
        Commands::Stop => Some(Command::Shutdown),
    }
}

/// Run a client command by connecting to the daemon.
fn run_client_command(command: Commands) -> anyhow::Result<()> {
    let Some(protocol_command) = cli_to_command(&command) else {
        if let Commands::Examples = command {
            println!("{}", crate::args::EXAMPLES_TEXT);
        }
        return Ok(());
    };

    // wait-cursor can legitimately outlast the default client timeout.
    let timeout = match &protocol_command {
        Command::WaitCursor { timeout_ms, .. } => {
            std::time::Duration::from_millis(timeout_ms.unwrap_or(30_000) + 5_000)
        }
        _ => std::time::Duration::from_secs(30),
    };

    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async {
        // Connect to daemon (auto-starts if not running)
        let mut client = DaemonClient::connect().await?;

        let request = Request {
            id: Uuid::new_v4().to_string(),
            command: protocol_command,
        };

        let response = client.request_with_timeout(request, timeout).await?;

        if response.success {
            if let Some(data) = response.data {
                match data {
                    ResponseData::Ok { message } => println!("{}", message),
                    _ => println!("{}", serde_json::to_string_pretty(&data)?),
                }
            }
        } else if let Some(err) = response.error {
            eprintln!("Error: {}", err);
            std::process::exit(1);
        }

        Ok(())
    })
}

/// Run the daemon with graceful signal handling.
///
/// Handles SIGINT (Ctrl+C) and SIGTERM for clean shutdown. The
/// DaemonServer's Drop impl cleans up socket and PID files.
fn run_daemon(args: DaemonArgs) {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    runtime.block_on(async {
        let profile_path = args
            .profile
            .unwrap_or_else(|| paths::get_profile_path(None));
        let profile = Profile::load_or_default(&profile_path);
        info!("Loaded profile from {:?}", profile_path);

        let bridge_path = args.bridge.unwrap_or_else(|| paths::get_bridge_path(None));
        let bridge = match BridgeHandle::connect(&bridge_path).await {
            Ok(bridge) => bridge,
            Err(e) => {
                // A missing host is a per-request no-op, not a startup
                // failure; the shim may come up later behind the same path.
                warn!("{} - starting without a host surface", e);
                BridgeHandle::detached()
            }
        };

        let driver_handle = driver::spawn(bridge, &profile);

        let server = match DaemonServer::bind(driver_handle).await {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to start daemon: {}", e);
                std::process::exit(1);
            }
        };

        tokio::select! {
            result = server.run() => {
                if let Err(e) = result {
                    error!("Daemon error: {}", e);
                    std::process::exit(1);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, shutting down gracefully");
            }
            _ = sigterm() => {
                info!("Received SIGTERM, shutting down gracefully");
            }
        }
        // Server is dropped here, cleaning up socket and PID files
    });
}

/// Wait for SIGTERM (Unix only).
///
/// If signal registration fails, logs a warning and waits indefinitely so
/// the daemon still responds to SIGINT.
#[cfg(unix)]
async fn sigterm() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::warn!(
                "Failed to register SIGTERM handler: {}, daemon will only respond to SIGINT",
                e
            );
            std::future::pending::<()>().await;
        }
    }
}

/// SIGTERM is not available on non-Unix platforms; use a never-completing future.
#[cfg(not(unix))]
async fn sigterm() {
    std::future::pending::<()>().await;
}
