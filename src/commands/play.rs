//! WAV playback with waveform display.
//!
//! Decodes the file, paints the waveform, and runs the cooperative player
//! loop: input polling, playhead ticks, and deferred envelope painting all
//! share one thread, so no step is allowed to block. Supports external
//! play/pause triggers via SIGUSR1.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::WavedeckConfig;
use crate::decode;
use crate::player::ui::{show_fatal_error, TransportInfo};
use crate::player::{
    CpalSink, GridOptions, MonotonicClock, PlaybackController, PlayerCommand, PlayerTui,
    RenderOptions, WaveformRenderer,
};
use crate::ui::ErrorScreen;

/// Envelope columns painted per event-loop turn in asynchronous mode.
const COLUMNS_PER_TURN: usize = 64;

/// Input poll timeout while deferred columns are pending. Short enough to
/// keep painting flowing, long enough to yield the thread between columns.
const PAINT_POLL: Duration = Duration::from_millis(1);
/// Input poll timeout when there is nothing left to paint.
const IDLE_POLL: Duration = Duration::from_millis(50);

/// Plays a WAV file in the waveform player.
///
/// # Errors
/// - If the configuration cannot be loaded
/// - If the file cannot be decoded
/// - If no usable audio output device is available
/// - If the terminal UI cannot be initialized
pub async fn handle_play(file: PathBuf, device_override: Option<String>) -> Result<(), anyhow::Error> {
    tracing::info!("=== wavedeck player started ===");

    let config_data = match WavedeckConfig::load() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("Failed to load configuration: {err}");
            let error_message = format!(
                "Configuration Error:\n\n{err}\n\nPlease check your ~/.config/wavedeck/wavedeck.toml file and try again."
            );
            let mut error_screen = ErrorScreen::new()?;
            error_screen.show_error(&error_message)?;
            error_screen.cleanup()?;
            return Err(anyhow::anyhow!("Configuration error: {err}"));
        }
    };

    let device = device_override.unwrap_or_else(|| config_data.audio.device.clone());
    tracing::info!(
        "Configuration loaded: device={}, render_async={}, grid={}x{}px",
        device,
        config_data.display.render_async,
        config_data.display.vertical_divisions,
        config_data.display.horizontal_grid_spacing
    );

    // Decode off the runtime thread; large files take a moment
    let decode_path = file.clone();
    let decoded = tokio::task::spawn_blocking(move || decode::load_wav(&decode_path))
        .await
        .map_err(|e| anyhow::anyhow!("Decode task failed: {e}"))?;
    let buffer = match decoded {
        Ok(buffer) => buffer,
        Err(e) => {
            tracing::error!("Failed to decode {}: {}", file.display(), e);
            let mut error_screen = ErrorScreen::new()?;
            error_screen.show_error(&format!("Decode Error:\n\n{e}"))?;
            error_screen.cleanup()?;
            return Err(e);
        }
    };

    let sink = match CpalSink::open(&device) {
        Ok(sink) => sink,
        Err(e) => {
            tracing::error!("Failed to open output device: {}", e);
            let mut error_screen = ErrorScreen::new()?;
            error_screen.show_error(&format!(
                "Audio Error:\n\n{e}\n\nPlease check your audio configuration and try again."
            ))?;
            error_screen.cleanup()?;
            return Err(e);
        }
    };

    let controller = match PlaybackController::new(
        buffer.clone(),
        Box::new(sink),
        Box::new(MonotonicClock::new()),
        Box::new(|update| {
            tracing::trace!(
                "playhead {:.2}s ({:.1}%)",
                update.position,
                update.progress * 100.0
            );
        }),
    ) {
        Ok(controller) => controller,
        Err(e) => {
            tracing::error!("Failed to arm playback: {}", e);
            let mut error_screen = ErrorScreen::new()?;
            error_screen.show_error(&format!("Audio Error:\n\n{e}"))?;
            error_screen.cleanup()?;
            return Err(e);
        }
    };

    let mut tui =
        PlayerTui::new().map_err(|e| anyhow::anyhow!("Failed to initialize UI: {e}"))?;
    let (width, height) = tui.pixel_size()?;

    let options = RenderOptions {
        width,
        height,
        render_async: config_data.display.render_async,
        grid: GridOptions {
            vertical_divisions: config_data.display.vertical_divisions,
            horizontal_spacing: config_data.display.horizontal_grid_spacing,
        },
    };
    let mut renderer = WaveformRenderer::new(options, buffer, controller);
    renderer.render();

    // External play/pause trigger, the same escape hatch the terminal keys
    // provide for scripted use
    let external_toggle = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGUSR1, external_toggle.clone())
        .map_err(|e| anyhow::anyhow!("Failed to register signal handler: {e}"))?;

    tracing::debug!("Entering player loop. Space toggles playback, 'q'/Escape quits.");

    loop {
        let timeout = if renderer.pending_columns() > 0 {
            PAINT_POLL
        } else {
            IDLE_POLL
        };

        match tui.handle_input(timeout) {
            Ok(PlayerCommand::Continue) => {}
            Ok(PlayerCommand::PlayPause) => {
                if let Err(e) = renderer.play_pause() {
                    tracing::error!("Transport error: {}", e);
                    show_fatal_error(&mut tui, &format!("Playback Error:\n\n{e}"))?;
                    return Err(e);
                }
            }
            Ok(PlayerCommand::Quit) => break,
            Err(e) => {
                tracing::error!("Input handling error: {}", e);
                tui.cleanup().ok();
                return Err(anyhow::anyhow!("Input handling error: {e}"));
            }
        }

        if external_toggle.swap(false, std::sync::atomic::Ordering::Relaxed) {
            tracing::info!("Received SIGUSR1: toggling playback");
            if let Err(e) = renderer.play_pause() {
                tracing::error!("Transport error: {}", e);
                show_fatal_error(&mut tui, &format!("Playback Error:\n\n{e}"))?;
                return Err(e);
            }
        }

        // Fires the 50ms playhead tick when due; repaints only the
        // playhead layer
        if let Err(e) = renderer.poll() {
            tracing::error!("Playhead update error: {}", e);
            show_fatal_error(&mut tui, &format!("Playback Error:\n\n{e}"))?;
            return Err(e);
        }

        renderer.pump(COLUMNS_PER_TURN);

        // Track terminal size; a resize re-renders at the new geometry and
        // strands any queued columns as stale
        let (new_width, new_height) = tui.pixel_size()?;
        renderer.resize(new_width, new_height);

        let controller = renderer.controller();
        let transport = TransportInfo {
            playing: controller.is_playing(),
            position: controller.position(),
            duration: controller.duration(),
        };
        if let Err(e) = tui.draw(renderer.surface(), transport) {
            tracing::error!("Render failed: {}", e);
            tui.cleanup().ok();
            return Err(anyhow::anyhow!("Render failed: {e}"));
        }
    }

    tui.cleanup()
        .map_err(|e| anyhow::anyhow!("Cleanup failed: {e}"))?;

    tracing::info!("=== wavedeck player exited ===");
    Ok(())
}
