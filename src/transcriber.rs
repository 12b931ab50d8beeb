use std::path::PathBuf;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::speech::RecognitionOptions;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const MODEL_URL: &str =
    "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-base.en.bin";
const MODEL_FILENAME: &str = "ggml-base.en.bin";

/// Directory for model storage: ~/.local/share/voice-tasks/models/
fn models_dir() -> PathBuf {
    let mut p = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    p.push("voice-tasks");
    p.push("models");
    p
}

fn model_path() -> PathBuf {
    models_dir().join(MODEL_FILENAME)
}

/// Check whether the whisper model file exists.
pub fn model_exists() -> bool {
    model_path().exists()
}

/// Download the whisper model, sending progress events via the provided callback.
/// `on_progress(bytes_downloaded, total_bytes)`; total is 0 when unknown.
pub async fn download_model<F>(on_progress: F) -> Result<(), BoxError>
where
    F: Fn(u64, u64) + Send + 'static,
{
    use futures_util::StreamExt;
    use tokio::io::AsyncWriteExt;

    let dir = models_dir();
    tokio::fs::create_dir_all(&dir).await?;

    let response = reqwest::get(MODEL_URL).await?.error_for_status()?;
    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;

    // Download under a temporary name so an interrupted run is not mistaken
    // for a complete model on the next start.
    let path = model_path();
    let partial = path.with_extension("part");
    let mut file = tokio::fs::File::create(&partial).await?;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
        on_progress(downloaded, total);
    }

    file.flush().await?;
    tokio::fs::rename(&partial, &path).await?;
    log::info!("Model downloaded to {}", path.display());
    Ok(())
}

/// Load the whisper model from disk. This is CPU-heavy; call from a blocking context.
pub fn load_model() -> Result<WhisperContext, BoxError> {
    let path = model_path();
    let ctx = WhisperContext::new_with_params(
        path.to_str().ok_or("Invalid model path")?,
        WhisperContextParameters::default(),
    )
    .map_err(|e| format!("Failed to load whisper model: {e}"))?;
    log::info!("Whisper model loaded");
    Ok(ctx)
}

/// Whisper language code for a locale like `en-US`.
pub fn whisper_language(lang: &str) -> String {
    lang.split(['-', '_'])
        .next()
        .unwrap_or("en")
        .to_ascii_lowercase()
}

/// Whether the bundled English-only model can transcribe `lang`.
pub fn model_supports_language(lang: &str) -> bool {
    whisper_language(lang) == "en"
}

/// Drop punctuation whisper adds on its own, keeping apostrophes.
pub fn strip_punctuation(text: &str) -> String {
    let kept: String = text
        .chars()
        .filter(|c| !c.is_ascii_punctuation() || *c == '\'')
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Transcribe audio samples (16kHz mono f32). CPU-heavy; call from `spawn_blocking`.
pub fn transcribe(
    ctx: &WhisperContext,
    samples: &[f32],
    options: &RecognitionOptions,
) -> Result<String, BoxError> {
    let mut state = ctx
        .create_state()
        .map_err(|e| format!("State error: {e}"))?;

    // English-only model; other locales are reported when the session starts.
    let language = if model_supports_language(&options.lang) {
        whisper_language(&options.lang)
    } else {
        "en".to_string()
    };
    let best_of = options.max_alternatives.max(1) as i32;
    let mut params = FullParams::new(SamplingStrategy::Greedy { best_of });
    params.set_language(Some(&language));
    params.set_print_progress(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);
    if !options.contextual_strings.is_empty() {
        params.set_initial_prompt(&options.contextual_strings.join(", "));
    }

    let cpus = std::thread::available_parallelism()
        .map(|n| n.get() as i32)
        .unwrap_or(4);
    params.set_n_threads(cpus);

    state
        .full(params, samples)
        .map_err(|e| format!("Transcription failed: {e}"))?;

    let mut text = String::new();
    for segment in state.as_iter() {
        // WhisperSegment implements Display
        text.push_str(&format!("{segment}"));
        text.push(' ');
    }

    let text = text.trim();
    if options.adds_punctuation {
        Ok(text.to_string())
    } else {
        Ok(strip_punctuation(text))
    }
}
