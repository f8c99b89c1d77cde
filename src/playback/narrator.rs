//! The speech narration loop.
//!
//! Runs on its own thread alongside the tick loop, mirroring the
//! controller's cursor rather than owning it. Each pass re-extracts the
//! segment under the *current* cursor, so narration may drift by a segment
//! when the visual loop advances mid-utterance; that looseness is accepted.

use super::SharedState;
use crate::library::Document;
use crate::segment::next_segment;
use crate::speech::UtteranceSink;
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

pub(in crate::playback) fn run_narration_loop(
    shared: Arc<SharedState>,
    document: Arc<Document>,
    voice: Arc<dyn UtteranceSink>,
) {
    info!("Narration loop started");
    loop {
        if !(shared.speech_on() && shared.is_running()) {
            break;
        }
        let cursor = shared.cursor();
        let settings = shared.tick_settings();
        let Some((segment, _)) = next_segment(&document.tokens, cursor, settings.segment_mode)
        else {
            break;
        };

        // Narration is best-effort: a failed utterance is dropped, never fatal.
        if let Err(err) = voice.speak(&segment.text) {
            warn!("Dropping utterance: {err:#}");
        }

        thread::sleep(settings.speed.mul_f64(segment.token_count() as f64));
    }
    debug!("Narration loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::TickSettings;
    use anyhow::Result;
    use std::sync::Mutex;
    use std::sync::atomic::Ordering;
    use std::time::{Duration, Instant};

    struct CountingVoice {
        spoken: Mutex<Vec<String>>,
    }

    impl UtteranceSink for CountingVoice {
        fn speak(&self, text: &str) -> Result<()> {
            self.spoken
                .lock()
                .expect("spoken lock should be available")
                .push(text.to_string());
            Ok(())
        }

        fn set_rate(&self, _words_per_minute: u32) {}

        fn select_voice(&self, _model_path: &std::path::Path) -> Result<()> {
            Ok(())
        }

        fn stop(&self) {}
    }

    fn shared_running() -> Arc<SharedState> {
        let shared = Arc::new(SharedState::new(
            TickSettings {
                speed: Duration::from_millis(1),
                ..TickSettings::default()
            },
            true,
        ));
        shared.running.store(true, Ordering::Release);
        shared
    }

    #[test]
    fn exits_when_the_running_flag_clears() {
        let shared = shared_running();
        let document = Arc::new(Document {
            title: "test.txt".to_string(),
            tokens: (0..1000).map(|i| format!("w{i}")).collect(),
        });
        let voice = Arc::new(CountingVoice {
            spoken: Mutex::new(Vec::new()),
        });

        let loop_shared = Arc::clone(&shared);
        let loop_voice: Arc<dyn UtteranceSink> = voice.clone();
        let handle = thread::spawn(move || run_narration_loop(loop_shared, document, loop_voice));

        let deadline = Instant::now() + Duration::from_secs(2);
        while voice
            .spoken
            .lock()
            .expect("spoken lock should be available")
            .is_empty()
            && Instant::now() < deadline
        {
            thread::sleep(Duration::from_millis(2));
        }

        shared.running.store(false, Ordering::Release);
        handle.join().expect("narration loop should exit cleanly");
        assert!(
            !voice
                .spoken
                .lock()
                .expect("spoken lock should be available")
                .is_empty()
        );
    }

    #[test]
    fn stationary_cursor_repeats_the_same_segment() {
        let shared = shared_running();
        let document = Arc::new(Document {
            title: "test.txt".to_string(),
            tokens: vec!["only".to_string(), "words".to_string()],
        });
        let voice = Arc::new(CountingVoice {
            spoken: Mutex::new(Vec::new()),
        });

        let loop_shared = Arc::clone(&shared);
        let loop_voice: Arc<dyn UtteranceSink> = voice.clone();
        let handle = thread::spawn(move || run_narration_loop(loop_shared, document, loop_voice));

        let deadline = Instant::now() + Duration::from_secs(2);
        while voice
            .spoken
            .lock()
            .expect("spoken lock should be available")
            .len()
            < 2
            && Instant::now() < deadline
        {
            thread::sleep(Duration::from_millis(2));
        }
        shared.running.store(false, Ordering::Release);
        handle.join().expect("narration loop should exit cleanly");

        let spoken = voice
            .spoken
            .lock()
            .expect("spoken lock should be available")
            .clone();
        assert!(spoken.len() >= 2);
        assert!(spoken.iter().all(|s| s == "only"));
    }
}
