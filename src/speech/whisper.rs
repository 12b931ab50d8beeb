use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};

use whisper_rs::WhisperContext;

use super::{PermissionStatus, RecognitionEngine, RecognitionEvent, RecognitionOptions, SpeechError};
use crate::recorder::{self, SampleBuffer};
use crate::transcriber;

const TICK: Duration = Duration::from_millis(250);
const INTERIM_EVERY_TICKS: u32 = 8;
/// RMS above which a 100ms window counts as speech.
const SPEECH_RMS_THRESHOLD: f32 = 0.015;

/// Filled once the whisper model has been loaded.
pub type WhisperModelSlot = Arc<OnceLock<WhisperContext>>;

struct ActiveCapture {
    // Dropping the stream releases the input device.
    _stream: cpal::Stream,
    halted: Arc<AtomicBool>,
}

/// Local recognition: cpal capture plus whisper transcription.
///
/// Interim results are produced by re-transcribing the buffer every couple
/// of seconds. Without `continuous`, the session ends by itself after
/// `silence_timeout` of quiet following speech.
pub struct WhisperEngine {
    model: WhisperModelSlot,
    runtime: tokio::runtime::Handle,
    silence_timeout: Duration,
    active: Option<ActiveCapture>,
}

impl WhisperEngine {
    pub fn new(
        model: WhisperModelSlot,
        runtime: tokio::runtime::Handle,
        silence_timeout: Duration,
    ) -> Self {
        Self {
            model,
            runtime,
            silence_timeout,
            active: None,
        }
    }
}

impl RecognitionEngine for WhisperEngine {
    fn request_permissions(&mut self) -> PermissionStatus {
        // Desktop audio has no permission prompt; a missing device may
        // still appear later, so asking again stays possible.
        PermissionStatus {
            granted: recorder::input_device_available(),
            can_ask_again: true,
        }
    }

    fn start(
        &mut self,
        options: &RecognitionOptions,
        events: async_channel::Sender<RecognitionEvent>,
    ) -> Result<(), SpeechError> {
        if self.active.is_some() {
            return Err(SpeechError::Engine("capture already running".into()));
        }
        if self.model.get().is_none() {
            return Err(SpeechError::ModelNotReady);
        }
        if !transcriber::model_supports_language(&options.lang) {
            log::warn!(
                "Speech model is English-only; transcribing `{}` as English",
                options.lang
            );
        }
        if options.requires_on_device_recognition {
            log::debug!("On-device recognition requested; whisper always runs locally");
        }

        let buffer: SampleBuffer = Arc::new(Mutex::new(Vec::new()));
        let halted = Arc::new(AtomicBool::new(false));
        let (stream, sample_rate) = recorder::start_capture(buffer.clone(), halted.clone())?;

        let _ = events.try_send(RecognitionEvent::Start);

        let worker = SessionWorker {
            model: self.model.clone(),
            buffer,
            halted: halted.clone(),
            sample_rate,
            options: options.clone(),
            silence_timeout: self.silence_timeout,
            events,
        };
        self.runtime.spawn(worker.run());

        self.active = Some(ActiveCapture {
            _stream: stream,
            halted,
        });
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            active.halted.store(true, Ordering::Relaxed);
        }
    }
}

struct SessionWorker {
    model: WhisperModelSlot,
    buffer: SampleBuffer,
    halted: Arc<AtomicBool>,
    sample_rate: u32,
    options: RecognitionOptions,
    silence_timeout: Duration,
    events: async_channel::Sender<RecognitionEvent>,
}

impl SessionWorker {
    async fn run(self) {
        let window = (self.sample_rate / 10).max(1) as usize;
        let mut ticker = tokio::time::interval(TICK);
        let mut ticks: u32 = 0;
        let mut heard_speech = false;
        let mut quiet_since: Option<Instant> = None;
        let mut last_interim_len = 0;

        loop {
            ticker.tick().await;
            if self.halted.load(Ordering::Relaxed) {
                break;
            }
            ticks = ticks.wrapping_add(1);

            let (len, rms) = {
                let buf = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
                (buf.len(), recorder::tail_rms(&buf, window))
            };

            if rms > SPEECH_RMS_THRESHOLD {
                heard_speech = true;
                quiet_since = None;
            } else if heard_speech && quiet_since.is_none() {
                quiet_since = Some(Instant::now());
            }

            if !self.options.continuous {
                if let Some(since) = quiet_since {
                    if since.elapsed() >= self.silence_timeout {
                        log::info!("End of speech detected");
                        self.halted.store(true, Ordering::Relaxed);
                        break;
                    }
                }
            }

            if self.options.interim_results
                && ticks % INTERIM_EVERY_TICKS == 0
                && len > last_interim_len
            {
                last_interim_len = len;
                match self.transcribe_buffer().await {
                    Ok(text) if !text.is_empty() => {
                        self.emit(RecognitionEvent::Result {
                            transcript: text,
                            is_final: false,
                        })
                        .await;
                    }
                    Ok(_) => {}
                    Err(e) => log::warn!("Interim transcription failed: {e}"),
                }
            }
        }

        let captured = self
            .buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        log::info!(
            "Captured {} samples ({:.1}s at {}Hz)",
            captured,
            captured as f32 / self.sample_rate as f32,
            self.sample_rate
        );

        if captured > 0 {
            match self.transcribe_buffer().await {
                Ok(text) => {
                    self.emit(RecognitionEvent::Result {
                        transcript: text,
                        is_final: true,
                    })
                    .await;
                }
                Err(e) => self.emit(RecognitionEvent::Error(e)).await,
            }
        }
        self.emit(RecognitionEvent::End).await;
    }

    async fn transcribe_buffer(&self) -> Result<String, String> {
        let samples = self
            .buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let model = self.model.clone();
        let options = self.options.clone();

        let result = tokio::task::spawn_blocking(move || match model.get() {
            Some(ctx) => transcriber::transcribe(ctx, &samples, &options).map_err(|e| e.to_string()),
            None => Err("Whisper model not loaded".to_string()),
        })
        .await;

        match result {
            Ok(inner) => inner,
            Err(e) => Err(format!("Transcription task panicked: {e}")),
        }
    }

    async fn emit(&self, event: RecognitionEvent) {
        if self.events.send(event).await.is_err() {
            log::debug!("Recognition event receiver closed");
        }
    }
}
