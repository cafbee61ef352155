//! Audio output sink and the single-use source handle it arms.
//!
//! The playback backend can start a given source exactly once: after `stop`
//! the handle is spent and a replacement must be armed before the next
//! `start`. That constraint is carried in an explicit handle state instead
//! of being left as a calling convention.

use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::buffer::SampleBuffer;

#[cfg(target_os = "linux")]
use std::fs::OpenOptions;
#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

/// Lifecycle of a single-use playback handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Bound to a buffer and connected to the output, not yet started.
    Armed,
    /// Producing audio.
    Started,
    /// Spent. The handle can never produce audio again.
    Stopped,
}

/// A playback handle that can be started at most once.
pub trait SourceHandle {
    /// Begins playback `offset_secs` into the buffer.
    ///
    /// # Errors
    /// - If the handle has already been started or stopped
    /// - If the backend cannot build or start its output stream
    fn start(&mut self, offset_secs: f64) -> Result<()>;

    /// Stops playback and spends the handle. Total: stopping an armed or
    /// already-stopped handle is a no-op apart from the state change.
    fn stop(&mut self);

    /// Current lifecycle state.
    fn state(&self) -> HandleState;
}

/// Factory for single-use handles bound to a fixed output device.
pub trait OutputSink {
    /// Creates a fresh handle bound to `buffer` and connected to the
    /// output device.
    ///
    /// # Errors
    /// - If the backend cannot bind the buffer to the device
    fn arm(&mut self, buffer: &SampleBuffer) -> Result<Box<dyn SourceHandle>>;
}

/// cpal-backed output sink.
///
/// Selects the output device once at construction; every armed handle plays
/// through that device.
pub struct CpalSink {
    device: cpal::Device,
}

impl CpalSink {
    /// Opens the output device named by `device_spec`.
    ///
    /// Accepts "default" for the system default device, a device name, or a
    /// numeric index as shown by `wavedeck list-devices`.
    ///
    /// # Errors
    /// - If no output device matching the spec is available
    pub fn open(device_spec: &str) -> Result<Self> {
        // Resolve the device while suppressing ALSA library warnings
        let device = suppress_alsa_warnings(|| {
            let host = cpal::default_host();
            if device_spec == "default" {
                host.default_output_device()
                    .ok_or_else(|| anyhow!("No audio output device available"))
            } else {
                find_device_by_name(&host, device_spec)
            }
        })?;

        let device_name = device
            .name()
            .unwrap_or_else(|_| "Unknown device".to_string());
        tracing::info!("Playback device: {}", device_name);

        Ok(Self { device })
    }
}

impl OutputSink for CpalSink {
    fn arm(&mut self, buffer: &SampleBuffer) -> Result<Box<dyn SourceHandle>> {
        let config = suppress_alsa_warnings(|| {
            self.device
                .default_output_config()
                .map_err(|e| anyhow!("Failed to query output config: {e}"))
        })?;

        tracing::debug!(
            "Armed playback handle: device {}Hz {}ch, buffer {}Hz {} samples",
            config.sample_rate().0,
            config.channels(),
            buffer.sample_rate(),
            buffer.len()
        );

        Ok(Box::new(CpalHandle {
            device: self.device.clone(),
            buffer: buffer.clone(),
            stream: None,
            state: HandleState::Armed,
        }))
    }
}

/// Single-use handle playing a `SampleBuffer` through a cpal output stream.
///
/// The stream callback only reads the shared immutable sample data and its
/// own cursor; playhead position is derived from the clock by the
/// controller, never read back from here.
struct CpalHandle {
    device: cpal::Device,
    buffer: SampleBuffer,
    stream: Option<cpal::Stream>,
    state: HandleState,
}

impl SourceHandle for CpalHandle {
    fn start(&mut self, offset_secs: f64) -> Result<()> {
        if self.state != HandleState::Armed {
            return Err(anyhow!(
                "Playback handle already spent ({:?}); arm a new one",
                self.state
            ));
        }

        let config = self
            .device
            .default_output_config()
            .map_err(|e| anyhow!("Failed to query output config: {e}"))?;
        let out_rate = config.sample_rate().0;
        let out_channels = config.channels() as usize;
        let stream_config: cpal::StreamConfig = config.into();

        let samples = self.buffer.clone();
        // Source cursor in buffer samples; advanced by the rate ratio so the
        // buffer plays at its own speed on any device rate.
        let step = if out_rate > 0 {
            samples.sample_rate() as f64 / out_rate as f64
        } else {
            1.0
        };
        let mut cursor = offset_secs.max(0.0) * samples.sample_rate() as f64;

        let stream = self
            .device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let src = samples.samples();
                    for frame in data.chunks_mut(out_channels) {
                        let index = cursor as usize;
                        let value = src.get(index).copied().unwrap_or(0.0);
                        // Mono buffer fanned out to every output channel
                        for out in frame.iter_mut() {
                            *out = value;
                        }
                        cursor += step;
                    }
                },
                |err| {
                    tracing::error!("Audio output stream error: {}", err);
                },
                None,
            )
            .map_err(|e| anyhow!("Failed to build output stream: {e}"))?;

        stream
            .play()
            .map_err(|e| anyhow!("Failed to start output stream: {e}"))?;

        self.stream = Some(stream);
        self.state = HandleState::Started;
        tracing::debug!("Playback handle started at {:.3}s", offset_secs);
        Ok(())
    }

    fn stop(&mut self) {
        if self.state == HandleState::Started {
            // Dropping the stream stops audio output
            self.stream = None;
            tracing::debug!("Playback handle stopped");
        }
        self.state = HandleState::Stopped;
    }

    fn state(&self) -> HandleState {
        self.state
    }
}

/// Finds an audio output device by name or numeric index.
///
/// # Errors
/// - If no device with the specified name/index is found
fn find_device_by_name(host: &cpal::Host, device_spec: &str) -> Result<cpal::Device> {
    // Try to parse as a numeric index first
    if let Ok(index) = device_spec.parse::<usize>() {
        let devices: Vec<_> = host
            .output_devices()
            .map_err(|e| anyhow!("Failed to enumerate devices: {e}"))?
            .collect();

        if index < devices.len() {
            return devices
                .into_iter()
                .nth(index)
                .ok_or_else(|| anyhow!("Device index {index} disappeared during enumeration"));
        }
        return Err(anyhow!(
            "Device index {} is out of range (0-{})",
            index,
            devices.len().saturating_sub(1)
        ));
    }

    let devices = host
        .output_devices()
        .map_err(|e| anyhow!("Failed to enumerate devices: {e}"))?;

    for device in devices {
        if let Ok(name) = device.name() {
            if name == device_spec {
                return Ok(device);
            }
        }
    }

    Err(anyhow!(
        "Audio output device '{device_spec}' not found. Use 'wavedeck list-devices' to see available devices."
    ))
}

/// Temporarily redirects stderr to /dev/null to suppress ALSA library warnings on Linux.
/// On non-Linux platforms, this is a no-op since ALSA doesn't exist.
#[cfg(target_os = "linux")]
pub(crate) fn suppress_alsa_warnings<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let dev_null = OpenOptions::new()
        .write(true)
        .open("/dev/null")
        .map_err(|e| anyhow!("Failed to open /dev/null: {e}"))?;

    let dev_null_fd = dev_null.as_raw_fd();

    let old_stderr = unsafe { libc::dup(libc::STDERR_FILENO) };
    if old_stderr == -1 {
        return Err(anyhow!("Failed to duplicate stderr"));
    }

    let redirect_result = unsafe { libc::dup2(dev_null_fd, libc::STDERR_FILENO) };
    if redirect_result == -1 {
        unsafe { libc::close(old_stderr) };
        return Err(anyhow!("Failed to redirect stderr"));
    }

    let result = f();

    unsafe {
        libc::dup2(old_stderr, libc::STDERR_FILENO);
        libc::close(old_stderr);
    }

    result
}

/// On non-Linux platforms, no stderr suppression is needed since ALSA doesn't exist.
#[cfg(not(target_os = "linux"))]
pub(crate) fn suppress_alsa_warnings<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    f()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// What a fake handle was asked to do, in order.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub(crate) enum SinkEvent {
        Started(f64),
        Stopped,
    }

    #[derive(Debug, Default)]
    pub(crate) struct SinkLog {
        pub(crate) armed: usize,
        pub(crate) events: Vec<SinkEvent>,
    }

    impl SinkLog {
        pub(crate) fn start_offsets(&self) -> Vec<f64> {
            self.events
                .iter()
                .filter_map(|e| match e {
                    SinkEvent::Started(offset) => Some(*offset),
                    SinkEvent::Stopped => None,
                })
                .collect()
        }
    }

    /// Sink that records arm/start/stop calls instead of producing audio.
    pub(crate) struct FakeSink {
        log: Rc<RefCell<SinkLog>>,
    }

    impl FakeSink {
        pub(crate) fn new() -> (Self, Rc<RefCell<SinkLog>>) {
            let log = Rc::new(RefCell::new(SinkLog::default()));
            (Self { log: log.clone() }, log)
        }
    }

    impl OutputSink for FakeSink {
        fn arm(&mut self, _buffer: &SampleBuffer) -> Result<Box<dyn SourceHandle>> {
            self.log.borrow_mut().armed += 1;
            Ok(Box::new(FakeHandle {
                log: self.log.clone(),
                state: HandleState::Armed,
            }))
        }
    }

    struct FakeHandle {
        log: Rc<RefCell<SinkLog>>,
        state: HandleState,
    }

    impl SourceHandle for FakeHandle {
        fn start(&mut self, offset_secs: f64) -> Result<()> {
            if self.state != HandleState::Armed {
                return Err(anyhow!("fake handle started twice"));
            }
            self.state = HandleState::Started;
            self.log
                .borrow_mut()
                .events
                .push(SinkEvent::Started(offset_secs));
            Ok(())
        }

        fn stop(&mut self) {
            if self.state == HandleState::Started {
                self.log.borrow_mut().events.push(SinkEvent::Stopped);
            }
            self.state = HandleState::Stopped;
        }

        fn state(&self) -> HandleState {
            self.state
        }
    }
}
