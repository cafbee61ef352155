//! Application command handlers for wavedeck.
//!
//! Each submodule handles one application command.
//!
//! # Commands
//! - `play`: WAV playback with waveform display (default command)
//! - `config`: Open configuration file in user's preferred editor
//! - `list_devices`: List available audio output devices
//! - `logs`: Display recent log entries

pub mod config;
pub mod list_devices;
pub mod logs;
pub mod play;

pub use config::handle_config;
pub use list_devices::handle_list_devices;
pub use logs::handle_logs;
pub use play::handle_play;
