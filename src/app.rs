//! Application orchestration and command routing.
//!
//! Handles command-line argument parsing and delegates to appropriate command handlers.

use crate::commands;
use crate::logging;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use std::process;

/// A terminal-based WAV player with waveform visualization
#[derive(Parser)]
#[command(name = "wavedeck")]
#[command(version)]
#[command(about = "\n\n ▁▂▅▇▅▂▁ \n wavedeck")]
#[command(
    long_about = "\n\n ▁▂▅▇▅▂▁ \n wavedeck\n\nA terminal-based WAV player that renders the file's waveform as a min/max\nenvelope and keeps a playhead line synchronized with playback.\n\nDEFAULT COMMAND:\n    If no command is specified, 'play' is used by default.\n\nEXAMPLES:\n    # Play a file\n    $ wavedeck track.wav\n    $ wavedeck play track.wav\n\n    # Play through a specific output device\n    $ wavedeck track.wav --device 2\n\n    # Toggle playback of a running player from another shell\n    $ pkill -USR1 wavedeck\n\n    # List output devices\n    $ wavedeck list-devices\n\n    # Edit configuration file\n    $ wavedeck config"
)]
#[command(
    after_help = "CONFIGURATION:\n    Config file:        ~/.config/wavedeck/wavedeck.toml\n    Logs:               ~/.local/state/wavedeck/wavedeck.log.*\n\nKEYS (in the player):\n    Space               play/pause\n    q, Escape           quit"
)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// WAV file to play (shorthand for `wavedeck play <FILE>`)
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Audio output device: index or name from `wavedeck list-devices`
    #[arg(short, long, value_name = "DEVICE")]
    device: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a WAV file with waveform display (default)
    ///
    /// Press Space to play/pause, Escape/q to quit. The waveform is painted
    /// once; only the playhead moves during playback.
    #[command(visible_alias = "p")]
    Play {
        /// Path to the WAV file to play
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Audio output device: index or name from `wavedeck list-devices`
        #[arg(short, long, value_name = "DEVICE")]
        device: Option<String>,
    },

    /// List available audio output devices
    ///
    /// Shows device IDs, names, and configurations to help configure
    /// the correct output device in wavedeck.toml.
    #[command(name = "list-devices")]
    ListDevices,

    /// Open configuration file in your preferred editor
    ///
    /// Edit audio and display settings. Uses $EDITOR environment variable
    /// or falls back to nano/vim.
    #[command(visible_alias = "c")]
    Config,

    /// Show recent log entries from the application
    ///
    /// Display the last 50 lines of the most recent log file.
    /// Useful for troubleshooting issues.
    Logs,

    /// Generate shell completion script
    ///
    /// Generate completion script for your shell. Save the output to your
    /// shell's completion directory or source it directly.
    ///
    /// Examples:
    ///   wavedeck completions bash > wavedeck.bash
    ///   wavedeck completions zsh > _wavedeck
    ///   wavedeck completions fish > wavedeck.fish
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Runs the main application based on command-line arguments.
///
/// # Exit Codes
/// - 0: Success
/// - 1: General error
/// - 2: Usage error (invalid arguments)
///
/// # Errors
/// - If logging initialization fails
/// - If command execution fails (e.g., playback, device listing)
pub async fn run() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Handle commands that don't need logging or config setup
    match &cli.command {
        Some(Commands::Completions { shell }) => {
            generate(*shell, &mut Cli::command(), "wavedeck", &mut io::stdout());
            return Ok(());
        }
        Some(Commands::ListDevices) => {
            return match commands::handle_list_devices() {
                Ok(()) => Ok(()),
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            };
        }
        Some(Commands::Logs) => {
            return match commands::handle_logs() {
                Ok(()) => Ok(()),
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            };
        }
        _ => {}
    }

    // Initialize logging for all other commands
    logging::init_logging()?;

    // Route to appropriate command handler
    match cli.command {
        Some(Commands::Play { file, device }) => {
            // Explicit play command options take precedence over top-level ones
            commands::handle_play(file, device.or(cli.device)).await?;
        }
        None => match cli.file {
            // Default command is play
            Some(file) => commands::handle_play(file, cli.device).await?,
            None => {
                Cli::command()
                    .print_help()
                    .map_err(|e| anyhow::anyhow!("Failed to print help: {e}"))?;
                process::exit(2);
            }
        },
        Some(Commands::Config) => {
            commands::handle_config()?;
        }
        Some(Commands::Completions { .. }) | Some(Commands::ListDevices) | Some(Commands::Logs) => {
            unreachable!("These commands are handled earlier")
        }
    }

    Ok(())
}
