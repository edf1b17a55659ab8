//! Audio capture via cpal.
//!
//! Opens the default (or named) input device at its native rate, downmixes
//! to mono, and pushes samples into the ring buffer. The callback does no
//! allocation and takes no locks; it is the only code on the device thread.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use tracing::{error, info};

use super::ring_buffer::AudioProducer;

/// Ring buffer length in seconds of audio.
const RING_SECONDS: u32 = 2;

/// List available input device names.
pub fn list_devices() -> Vec<String> {
    let host = cpal::default_host();
    let mut names = Vec::new();
    if let Ok(devices) = host.input_devices() {
        for dev in devices {
            if let Ok(name) = dev.name() {
                names.push(name);
            }
        }
    }
    names
}

/// Errors opening or starting the input stream. Fatal at startup.
#[derive(Debug)]
pub enum CaptureError {
    DeviceNotFound(String),
    NoDefaultDevice,
    Enumerate(String),
    Config(String),
    UnsupportedFormat(SampleFormat),
    Build(String),
    Play(String),
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeviceNotFound(name) => write!(f, "Input device not found: {}", name),
            Self::NoDefaultDevice => write!(f, "No default input device available"),
            Self::Enumerate(msg) => write!(f, "Failed to enumerate input devices: {}", msg),
            Self::Config(msg) => write!(f, "Failed to get default input config: {}", msg),
            Self::UnsupportedFormat(fmt) => write!(f, "Unsupported sample format: {}", fmt),
            Self::Build(msg) => write!(f, "Failed to build input stream: {}", msg),
            Self::Play(msg) => write!(f, "Failed to start input stream: {}", msg),
        }
    }
}

impl std::error::Error for CaptureError {}

/// Resolved info about the audio input we will use.
pub struct CaptureConfig {
    device: cpal::Device,
    stream_config: StreamConfig,
    sample_format: SampleFormat,
    pub device_name: String,
    pub native_rate: u32,
}

impl CaptureConfig {
    /// Ring buffer capacity in samples for this device.
    pub fn ring_capacity(&self) -> usize {
        (self.native_rate * RING_SECONDS) as usize
    }
}

/// Find and configure the input device.
pub fn resolve_device(device_name: Option<&str>) -> Result<CaptureConfig, CaptureError> {
    let host = cpal::default_host();

    let device = if let Some(name) = device_name {
        host.input_devices()
            .map_err(|e| CaptureError::Enumerate(e.to_string()))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| CaptureError::DeviceNotFound(name.to_string()))?
    } else {
        host.default_input_device()
            .ok_or(CaptureError::NoDefaultDevice)?
    };

    let dev_name = device.name().unwrap_or_else(|_| "unknown".into());
    info!(device = %dev_name, "Selected input device");

    let default_config = device
        .default_input_config()
        .map_err(|e| CaptureError::Config(e.to_string()))?;

    let native_rate = default_config.sample_rate().0;
    let channels = default_config.channels();
    let sample_format = default_config.sample_format();

    let stream_config = StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(native_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    info!(native_rate, channels, %sample_format, "Input device config");

    Ok(CaptureConfig {
        device,
        stream_config,
        sample_format,
        device_name: dev_name,
        native_rate,
    })
}

/// Average one interleaved frame to a mono f32 sample.
fn downmix<T>(frame: &[T]) -> f32
where
    T: Sample,
    f32: FromSample<T>,
{
    let sum: f32 = frame.iter().map(|&s| f32::from_sample(s)).sum();
    sum / frame.len().max(1) as f32
}

/// Start audio capture. Returns the cpal `Stream` (must be kept alive).
pub fn start_capture(
    producer: AudioProducer,
    cfg: &CaptureConfig,
) -> Result<Stream, CaptureError> {
    let stream = match cfg.sample_format {
        SampleFormat::F32 => build_stream::<f32>(producer, cfg)?,
        SampleFormat::I16 => build_stream::<i16>(producer, cfg)?,
        SampleFormat::U16 => build_stream::<u16>(producer, cfg)?,
        SampleFormat::I32 => build_stream::<i32>(producer, cfg)?,
        other => return Err(CaptureError::UnsupportedFormat(other)),
    };

    stream
        .play()
        .map_err(|e| CaptureError::Play(e.to_string()))?;

    info!("Audio capture started");

    Ok(stream)
}

fn build_stream<T>(mut producer: AudioProducer, cfg: &CaptureConfig) -> Result<Stream, CaptureError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = usize::from(cfg.stream_config.channels.max(1));

    cfg.device
        .build_input_stream(
            &cfg.stream_config,
            move |data: &[T], _info: &cpal::InputCallbackInfo| {
                // Ring buffer full: newest audio is lost and counted, the
                // reader's clock skips over it.
                producer.push_iter(data.chunks_exact(channels).map(downmix::<T>));
            },
            move |err| {
                error!("Audio input stream error: {}", err);
            },
            None, // no timeout
        )
        .map_err(|e| CaptureError::Build(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downmix_averages_channels() {
        assert_eq!(downmix(&[0.5f32, -0.5]), 0.0);
        assert_eq!(downmix(&[0.25f32, 0.75]), 0.5);
        assert_eq!(downmix(&[0.7f32]), 0.7);
    }

    #[test]
    fn test_downmix_converts_integer_samples() {
        assert_eq!(downmix(&[0i16, 0]), 0.0);
        assert!(downmix(&[i16::MAX, i16::MAX]) > 0.99);
    }

    #[test]
    fn test_capture_error_messages() {
        assert_eq!(
            CaptureError::DeviceNotFound("USB".into()).to_string(),
            "Input device not found: USB"
        );
        assert_eq!(
            CaptureError::NoDefaultDevice.to_string(),
            "No default input device available"
        );
    }
}
