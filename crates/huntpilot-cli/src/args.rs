//! CLI argument parsing with clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Input-synthesis driver for a browser game client.
///
/// Runs a daemon that drives one client window through a bridge socket:
/// confirmed target clicks, manual clicks, slot keys, chat text, and an
/// optional cooldown rotation. Detection tooling submits targets through
/// the same commands.
#[derive(Debug, Parser)]
#[command(name = "huntpilot", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Request a confirmed attack click at a viewport coordinate
    #[command(after_help = "\
The pointer is moved to the coordinate, the cursor indicator is given a
settle window, and the click is only dispatched once the cursor confirms an
attackable target. Bursts of targets coalesce: only the newest one is acted
on.

Examples:
  huntpilot target 412 305              # Click (412, 305) if it is a mob
  huntpilot status                      # See whether it clicked or was lost")]
    Target(PointArgs),

    /// Click a viewport coordinate unconditionally (no target confirmation)
    #[command(after_help = "\
Examples:
  huntpilot click 640 500               # Plain movement/interaction click")]
    Click(PointArgs),

    /// Fire an action slot (bar-select key plus slot digit)
    #[command(after_help = "\
Examples:
  huntpilot slot 1 0                    # Bar F1, first slot (key 1)
  huntpilot slot 2 9                    # Bar F2, tenth slot (key 0)")]
    Slot(SlotArgs),

    /// Send a key press to the client
    #[command(after_help = "\
Examples:
  huntpilot key Escape                  # Tap a key
  huntpilot key w --hold 1500           # Hold W for 1.5 seconds")]
    Key(KeyArgs),

    /// Put text into the client's chat input
    Chat(ChatArgs),

    /// Enable or disable the action rotation
    Rotation(RotationArgs),

    /// Block until the host cursor token matches a pattern
    #[command(after_help = "\
Examples:
  huntpilot wait-cursor curattack       # Wait for the attack cursor
  huntpilot wait-cursor -r 'cur(attack|skill)' -t 5000")]
    WaitCursor(WaitCursorArgs),

    /// Report driver state
    Status,

    /// Show an end-to-end usage example
    Examples,

    /// Start the daemon process (usually auto-started)
    Daemon(DaemonArgs),

    /// Stop the daemon process
    Stop,
}

#[derive(Debug, clap::Args)]
pub struct PointArgs {
    /// X coordinate in host viewport space
    pub x: i32,

    /// Y coordinate in host viewport space
    pub y: i32,
}

#[derive(Debug, clap::Args)]
pub struct SlotArgs {
    /// Slot bar (1-9, maps to F1-F9)
    pub bar: u8,

    /// Slot index on the bar (0-9, maps to the 1-9 and 0 keys)
    pub index: usize,
}

#[derive(Debug, clap::Args)]
pub struct KeyArgs {
    /// Key name (e.g., w, Escape, F3)
    pub key: String,

    /// Hold the key for this many milliseconds instead of tapping it
    #[arg(long, value_name = "MS")]
    pub hold: Option<u64>,
}

#[derive(Debug, clap::Args)]
pub struct ChatArgs {
    /// Text to place in the chat input
    pub text: String,
}

#[derive(Debug, clap::Args)]
pub struct RotationArgs {
    /// Desired rotation state
    #[arg(value_enum)]
    pub state: OnOff,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OnOff {
    On,
    Off,
}

#[derive(Debug, clap::Args)]
pub struct WaitCursorArgs {
    /// Substring or regex to match against the cursor token
    pub pattern: String,

    /// Timeout in milliseconds
    #[arg(short, long, default_value_t = 30000)]
    pub timeout: u64,

    /// Treat pattern as regex
    #[arg(short, long)]
    pub regex: bool,
}

#[derive(Debug, clap::Args)]
pub struct DaemonArgs {
    /// Bridge socket of the client shim.
    /// Defaults to the session's bridge path under the runtime directory.
    #[arg(long, value_name = "PATH")]
    pub bridge: Option<PathBuf>,

    /// Profile document with tunables and the slot table.
    /// Defaults to the session's profile under the runtime directory.
    #[arg(long, value_name = "PATH")]
    pub profile: Option<PathBuf>,
}

/// End-to-end example text for the `examples` command.
pub const EXAMPLES_TEXT: &str = r#"End-to-end example: drive a hunting session

# 1. Start the daemon against the client shim's bridge socket
huntpilot daemon --bridge /run/user/1000/huntpilot/default.bridge.sock &

# 2. Check that the bridge is connected
huntpilot status

# 3. Enable the buff/food rotation from the profile
huntpilot rotation on

# 4. Ask for a confirmed attack click where detection saw a mob
huntpilot target 412 305

# 5. Wait until the cursor shows the attack indicator somewhere
huntpilot wait-cursor curattack -t 5000

# 6. Manual interactions work without confirmation
huntpilot click 640 500
huntpilot chat "selling apples, pm me"

# 7. Stop everything
huntpilot stop
"#;

#[cfg(test)]
mod tests {
    use super::{Cli, Commands};
    use clap::Parser;

    #[test]
    fn test_target_parses_coordinates() {
        let cli = Cli::parse_from(["huntpilot", "target", "412", "305"]);

        match cli.command {
            Commands::Target(args) => {
                assert_eq!(args.x, 412);
                assert_eq!(args.y, 305);
            }
            _ => panic!("Expected target command"),
        }
    }

    #[test]
    fn test_key_hold_option() {
        let cli = Cli::parse_from(["huntpilot", "key", "w", "--hold", "1500"]);

        match cli.command {
            Commands::Key(args) => {
                assert_eq!(args.key, "w");
                assert_eq!(args.hold, Some(1500));
            }
            _ => panic!("Expected key command"),
        }
    }

    #[test]
    fn test_negative_coordinates_parse() {
        let cli = Cli::parse_from(["huntpilot", "click", "--", "-5", "10"]);

        match cli.command {
            Commands::Click(args) => {
                assert_eq!(args.x, -5);
                assert_eq!(args.y, 10);
            }
            _ => panic!("Expected click command"),
        }
    }
}
