//! List available audio output devices.

use anyhow::anyhow;
use cpal::traits::{DeviceTrait, HostTrait};

use crate::player::sink::suppress_alsa_warnings;

/// Lists all available audio output devices on the system.
///
/// # Errors
/// - If the audio host cannot be initialized
pub fn handle_list_devices() -> Result<(), anyhow::Error> {
    // Enumerate devices while suppressing ALSA library warnings
    let (host, device_results) = suppress_alsa_warnings(|| {
        let host = cpal::default_host();
        let device_iter = host
            .output_devices()
            .map_err(|e| anyhow!("Failed to enumerate audio devices: {e}"))?;

        // Collect devices, skipping any that fail to query
        let devices: Vec<cpal::Device> = device_iter
            .filter_map(|d| match d.name() {
                Ok(_) => Some(d),
                Err(_) => None,
            })
            .collect();

        Ok((host, devices))
    })?;

    if device_results.is_empty() {
        println!("No audio output devices found on this system.");
        return Ok(());
    }

    println!();
    println!(" ▁▂▅▇▅▂▁ wavedeck");
    println!();
    println!("Available audio output devices:");
    println!();

    // Find the default device
    let default_device = host.default_output_device().and_then(|d| d.name().ok());

    for (index, device) in device_results.iter().enumerate() {
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let is_default = default_device.as_ref() == Some(&device_name);

        let default_indicator = if is_default { " [DEFAULT]" } else { "" };

        // Get configuration info
        let config_info = match device.default_output_config() {
            Ok(config) => {
                let sample_rate = config.sample_rate().0;
                let channels = config.channels();
                format!(" ({}Hz, {} channels)", sample_rate, channels)
            }
            Err(_) => " (configuration unavailable)".to_string(),
        };

        println!("  ID: {}", index);
        println!("    Name: {}{}", device_name, default_indicator);
        println!("    Config:{}", config_info);
        println!();
    }

    Ok(())
}
