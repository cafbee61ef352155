//! Configuration management for wavedeck.
//!
//! Configuration lives in a TOML file in the user's config directory; a
//! default file is written on first run so there is always something for
//! `wavedeck config` to open.

pub mod file;

pub use file::{get_config_path, WavedeckConfig};
