use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::speech::SpeechError;

/// Whisper expects 16kHz mono.
pub const TARGET_SAMPLE_RATE: u32 = 16000;

/// Samples shared between the capture callback and the session worker.
pub type SampleBuffer = Arc<Mutex<Vec<f32>>>;

/// Whether a default input device is present.
pub fn input_device_available() -> bool {
    cpal::default_host().default_input_device().is_some()
}

/// Start capturing audio from the default input device.
/// Samples are appended to the shared buffer at ~16kHz mono f32 until
/// `halted` is set. Drop the returned `Stream` to release the device.
pub fn start_capture(
    buffer: SampleBuffer,
    halted: Arc<AtomicBool>,
) -> Result<(cpal::Stream, u32), SpeechError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| SpeechError::Engine("No input device found".into()))?;

    log::info!("Input device: {:?}", device.description());

    let supported_configs: Vec<_> = device
        .supported_input_configs()
        .map_err(engine_err)?
        .collect();

    // Try to find a config that supports 16kHz mono
    let desired = supported_configs.iter().find(|c| {
        c.channels() == 1
            && c.min_sample_rate() <= TARGET_SAMPLE_RATE
            && c.max_sample_rate() >= TARGET_SAMPLE_RATE
            && c.sample_format() == cpal::SampleFormat::F32
    });

    let (config, native_rate, downsample_factor) = if let Some(cfg) = desired {
        let config = cfg.with_sample_rate(TARGET_SAMPLE_RATE).config();
        (config, TARGET_SAMPLE_RATE, 1usize)
    } else {
        // Fall back to default config, downsample later
        let default_config = device.default_input_config().map_err(engine_err)?;
        let rate = default_config.sample_rate();
        let factor = (rate / TARGET_SAMPLE_RATE).max(1) as usize;
        let actual_rate = rate / factor as u32;
        log::info!("Using native rate {rate}Hz, downsampling by {factor}x to ~{actual_rate}Hz");
        (default_config.config(), actual_rate, factor)
    };

    let channels = config.channels as usize;

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if halted.load(Ordering::Relaxed) {
                    return;
                }
                let mut buf = buffer.lock().unwrap_or_else(PoisonError::into_inner);
                for (i, chunk) in data.chunks(channels).enumerate() {
                    if i % downsample_factor == 0 {
                        let mono = chunk.iter().sum::<f32>() / channels as f32;
                        buf.push(mono);
                    }
                }
            },
            |err| log::error!("Input stream error: {err}"),
            None,
        )
        .map_err(engine_err)?;

    stream.play().map_err(engine_err)?;
    Ok((stream, native_rate))
}

fn engine_err(e: impl std::fmt::Display) -> SpeechError {
    SpeechError::Engine(e.to_string())
}

/// RMS of the last `window` samples.
pub fn tail_rms(samples: &[f32], window: usize) -> f32 {
    let n = samples.len().min(window);
    if n == 0 {
        return 0.0;
    }
    let start = samples.len() - n;
    let sum_sq: f32 = samples[start..].iter().map(|&s| s * s).sum();
    (sum_sq / n as f32).sqrt()
}
