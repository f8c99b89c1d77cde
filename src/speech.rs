//! Speech synthesis behind the `UtteranceSink` trait.
//!
//! The narration loop only sees the trait; the shipped implementation
//! synthesizes each utterance with `piper-rs`, caches the WAV in the data
//! directory keyed by (model, text, rate), and plays it through `rodio`,
//! blocking until the utterance finishes.

use anyhow::{Context, Result};
use piper_rs::from_config_path;
use piper_rs::synth::{AudioOutputConfig, PiperSpeechSynthesizer};
use rodio::{Decoder, OutputStream, Sink};
use sha2::{Digest, Sha256};
use std::env;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Speech rate bounds, in words per minute.
pub const MIN_SPEECH_RATE_WPM: u32 = 100;
pub const MAX_SPEECH_RATE_WPM: u32 = 300;

/// A backend that can voice segment text.
///
/// `speak` blocks until the utterance has been spoken. `stop` is a
/// best-effort cancel of the in-flight utterance; it does not have to take
/// effect instantaneously.
pub trait UtteranceSink: Send + Sync {
    fn speak(&self, text: &str) -> Result<()>;
    fn set_rate(&self, words_per_minute: u32);
    fn select_voice(&self, model_path: &Path) -> Result<()>;
    fn stop(&self);
}

/// Piper-backed voice with a per-utterance WAV cache.
pub struct PiperVoice {
    model_path: Mutex<PathBuf>,
    rate_wpm: AtomicU32,
    cache_root: PathBuf,
    active: Mutex<Option<Arc<Sink>>>,
}

impl PiperVoice {
    /// Engine construction fails fast: a missing voice config is a startup
    /// error, not something to discover mid-narration.
    pub fn new(
        model_path: PathBuf,
        espeak_path: PathBuf,
        cache_root: PathBuf,
        rate_wpm: u32,
    ) -> Result<Self> {
        let espeak_path = sanitize_espeak_root(espeak_path);
        if env::var_os("PIPER_ESPEAKNG_DATA_DIRECTORY").is_none() {
            // Safe because we set a deterministic value early in process startup.
            unsafe {
                env::set_var("PIPER_ESPEAKNG_DATA_DIRECTORY", &espeak_path);
            }
        }

        let config_path = resolve_piper_config(&model_path);
        if !config_path.exists() {
            anyhow::bail!(
                "Piper config not found at {} (expected from {})",
                config_path.display(),
                model_path.display()
            );
        }

        info!(
            model = %model_path.display(),
            espeak_root = %espeak_path.display(),
            rate_wpm,
            "Initializing speech voice"
        );
        Ok(Self {
            model_path: Mutex::new(model_path),
            rate_wpm: AtomicU32::new(rate_wpm.clamp(MIN_SPEECH_RATE_WPM, MAX_SPEECH_RATE_WPM)),
            cache_root,
            active: Mutex::new(None),
        })
    }

    fn current_model(&self) -> PathBuf {
        match self.model_path.lock() {
            Ok(model) => model.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn ensure_cached(&self, text: &str) -> Result<PathBuf> {
        let model_path = self.current_model();
        let rate = self.rate_wpm.load(Ordering::Relaxed);
        let path = cache_path(&self.cache_root, &model_path, text, rate);
        if path.exists() {
            return Ok(path);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Creating utterance cache dir")?;
        }

        let config_path = resolve_piper_config(&model_path);
        let model = from_config_path(&config_path).context("Loading Piper model")?;
        let piper = PiperSpeechSynthesizer::new(model).context("Preparing Piper synthesizer")?;
        let output_config = AudioOutputConfig {
            rate: Some(rate_to_percent(rate)),
            volume: None,
            pitch: None,
            appended_silence_ms: None,
        };
        debug!(
            path = %path.display(),
            rate,
            chars = text.len(),
            "Synthesizing utterance"
        );
        piper
            .synthesize_to_file(&path, text.to_string(), Some(output_config))
            .context("Synthesizing utterance")?;
        Ok(path)
    }
}

impl UtteranceSink for PiperVoice {
    fn speak(&self, text: &str) -> Result<()> {
        let wav = self.ensure_cached(text)?;
        let (_stream, handle) = OutputStream::try_default().context("Opening audio output")?;
        let sink = Arc::new(Sink::try_new(&handle).context("Creating audio sink")?);

        let file = File::open(&wav)
            .with_context(|| format!("Opening cached utterance {}", wav.display()))?;
        let source = Decoder::new(BufReader::new(file)).context("Decoding cached utterance")?;
        sink.append(source);

        if let Ok(mut active) = self.active.lock() {
            *active = Some(Arc::clone(&sink));
        }
        sink.sleep_until_end();
        if let Ok(mut active) = self.active.lock() {
            *active = None;
        }
        Ok(())
    }

    fn set_rate(&self, words_per_minute: u32) {
        let clamped = words_per_minute.clamp(MIN_SPEECH_RATE_WPM, MAX_SPEECH_RATE_WPM);
        self.rate_wpm.store(clamped, Ordering::Relaxed);
        debug!(rate_wpm = clamped, "Speech rate updated");
    }

    fn select_voice(&self, model_path: &Path) -> Result<()> {
        let config_path = resolve_piper_config(model_path);
        if !config_path.exists() {
            anyhow::bail!(
                "Piper config not found at {} (expected from {})",
                config_path.display(),
                model_path.display()
            );
        }
        match self.model_path.lock() {
            Ok(mut model) => *model = model_path.to_path_buf(),
            Err(poisoned) => *poisoned.into_inner() = model_path.to_path_buf(),
        }
        info!(model = %model_path.display(), "Voice selected");
        Ok(())
    }

    fn stop(&self) {
        if let Ok(mut active) = self.active.lock() {
            if let Some(sink) = active.take() {
                debug!("Cancelling in-flight utterance");
                sink.stop();
            }
        }
    }
}

fn cache_path(base: &Path, model_path: &Path, text: &str, rate_wpm: u32) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(model_path.as_os_str().to_string_lossy().as_bytes());
    hasher.update(text.as_bytes());
    hasher.update(rate_wpm.to_le_bytes());
    let hash = format!("{:x}", hasher.finalize());
    base.join(format!("utterance-{hash}.wav"))
}

/// Piper expects the parent directory that contains `espeak-ng-data/phonindex`.
/// Users often point directly at `.../espeak-ng-data`; trim that to avoid
/// duplicated segments like `/espeak-ng-data/espeak-ng-data/phonindex`.
fn sanitize_espeak_root(path: PathBuf) -> PathBuf {
    if path
        .file_name()
        .map(|name| name == "espeak-ng-data")
        .unwrap_or(false)
    {
        if let Some(parent) = path.parent() {
            return parent.to_path_buf();
        }
    }
    path
}

fn resolve_piper_config(model_path: &Path) -> PathBuf {
    if model_path
        .extension()
        .map(|ext| ext == "onnx")
        .unwrap_or(false)
    {
        return model_path.with_extension("onnx.json");
    }
    model_path.to_path_buf()
}

/// Map words-per-minute onto Piper's 0..=100 rate percentage.
fn rate_to_percent(rate_wpm: u32) -> u8 {
    let clamped = rate_wpm.clamp(MIN_SPEECH_RATE_WPM, MAX_SPEECH_RATE_WPM);
    let span = (MAX_SPEECH_RATE_WPM - MIN_SPEECH_RATE_WPM) as f32;
    (((clamped - MIN_SPEECH_RATE_WPM) as f32 / span) * 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_maps_onto_percent_scale() {
        assert_eq!(rate_to_percent(100), 0);
        assert_eq!(rate_to_percent(200), 50);
        assert_eq!(rate_to_percent(300), 100);
        assert_eq!(rate_to_percent(50), 0);
        assert_eq!(rate_to_percent(900), 100);
    }

    #[test]
    fn cache_key_varies_with_text_and_rate() {
        let base = Path::new("/tmp/cache");
        let model = Path::new("/voices/en.onnx");
        let a = cache_path(base, model, "hello", 150);
        let b = cache_path(base, model, "hello", 200);
        let c = cache_path(base, model, "world", 150);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, cache_path(base, model, "hello", 150));
    }

    #[test]
    fn onnx_models_resolve_to_sibling_config() {
        let config = resolve_piper_config(Path::new("/voices/en_US-ryan-high.onnx"));
        assert_eq!(config, Path::new("/voices/en_US-ryan-high.onnx.json"));
        let passthrough = resolve_piper_config(Path::new("/voices/config.json"));
        assert_eq!(passthrough, Path::new("/voices/config.json"));
    }

    #[test]
    fn espeak_data_suffix_is_trimmed() {
        let trimmed = sanitize_espeak_root(PathBuf::from("/usr/share/espeak-ng-data"));
        assert_eq!(trimmed, PathBuf::from("/usr/share"));
        let untouched = sanitize_espeak_root(PathBuf::from("/usr/share"));
        assert_eq!(untouched, PathBuf::from("/usr/share"));
    }
}
