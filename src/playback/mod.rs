//! The playback state machine and its timed tick loop.
//!
//! The controller owns all playback state. Collaborators are injected as
//! trait objects so pacing and segmentation stay testable without a screen
//! or a speaker. Two threads may run while reading: the tick loop here and
//! the narration loop in [`narrator`]; both read the shared cursor, only the
//! controller side writes it.

mod narrator;

use crate::config::AppConfig;
use crate::display::DisplaySink;
use crate::library::Document;
use crate::render::{self, DisplayMode};
use crate::segment::{self, SegmentMode};
use crate::speech::UtteranceSink;
use crate::stats::{ReadingStats, TIMESTAMP_FORMAT};
use crate::store::{Bookmark, DataStore};
use anyhow::{Result, bail};
use chrono::Local;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Lifecycle of the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Paused,
    Running,
    Finished,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Phase::Idle => "idle",
            Phase::Paused => "paused",
            Phase::Running => "running",
            Phase::Finished => "finished",
        };
        write!(f, "{}", label)
    }
}

/// Settings snapshotted once per tick.
#[derive(Debug, Clone, Copy)]
pub(in crate::playback) struct TickSettings {
    pub(in crate::playback) speed: Duration,
    pub(in crate::playback) segment_mode: SegmentMode,
    pub(in crate::playback) display_mode: DisplayMode,
    pub(in crate::playback) font_size: u32,
}

impl Default for TickSettings {
    fn default() -> Self {
        Self {
            speed: Duration::from_millis(90),
            segment_mode: SegmentMode::default(),
            display_mode: DisplayMode::default(),
            font_size: 42,
        }
    }
}

/// State shared with the loops. The cursor and the liveness flag are atomics
/// so the narrator can read them lock-free; stale reads there are tolerated.
pub(in crate::playback) struct SharedState {
    cursor: AtomicUsize,
    running: AtomicBool,
    speech_enabled: AtomicBool,
    settings: Mutex<TickSettings>,
    phase: Mutex<Phase>,
}

impl SharedState {
    fn new(settings: TickSettings, speech_enabled: bool) -> Self {
        Self {
            cursor: AtomicUsize::new(0),
            running: AtomicBool::new(false),
            speech_enabled: AtomicBool::new(speech_enabled),
            settings: Mutex::new(settings),
            phase: Mutex::new(Phase::Idle),
        }
    }

    pub(in crate::playback) fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    fn set_cursor(&self, cursor: usize) {
        self.cursor.store(cursor, Ordering::Release);
    }

    pub(in crate::playback) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    pub(in crate::playback) fn speech_on(&self) -> bool {
        self.speech_enabled.load(Ordering::Acquire)
    }

    pub(in crate::playback) fn tick_settings(&self) -> TickSettings {
        self.settings.lock().map(|s| *s).unwrap_or_default()
    }

    fn phase(&self) -> Phase {
        self.phase.lock().map(|p| *p).unwrap_or(Phase::Idle)
    }

    fn set_phase(&self, phase: Phase) {
        if let Ok(mut current) = self.phase.lock() {
            *current = phase;
        }
    }
}

/// Drives timed playback of one document.
pub struct PlaybackController {
    shared: Arc<SharedState>,
    document: Mutex<Option<Arc<Document>>>,
    display: Arc<dyn DisplaySink>,
    voice: Option<Arc<dyn UtteranceSink>>,
    store: Arc<DataStore>,
    stats: Arc<Mutex<ReadingStats>>,
    bookmarks: Mutex<Vec<Bookmark>>,
    tick_handle: Mutex<Option<JoinHandle<()>>>,
    narration_handle: Mutex<Option<JoinHandle<()>>>,
}

impl PlaybackController {
    pub fn new(
        display: Arc<dyn DisplaySink>,
        voice: Option<Arc<dyn UtteranceSink>>,
        store: Arc<DataStore>,
        config: &AppConfig,
    ) -> Self {
        let speed = if config.speed_secs.is_finite() && config.speed_secs > 0.0 {
            Duration::from_secs_f64(config.speed_secs)
        } else {
            warn!(
                speed_secs = config.speed_secs,
                "Ignoring invalid configured speed"
            );
            TickSettings::default().speed
        };
        let settings = TickSettings {
            speed,
            segment_mode: config.reading_mode,
            display_mode: config.display_mode,
            font_size: config
                .font_size
                .clamp(render::MIN_FONT_SIZE, render::MAX_FONT_SIZE),
        };
        let stats = store.load_stats();
        let bookmarks = store.load_bookmarks();
        Self {
            shared: Arc::new(SharedState::new(settings, config.speech_enabled)),
            document: Mutex::new(None),
            display,
            voice,
            store,
            stats: Arc::new(Mutex::new(stats)),
            bookmarks: Mutex::new(bookmarks),
            tick_handle: Mutex::new(None),
            narration_handle: Mutex::new(None),
        }
    }

    /// Replace the current document and reset to the idle state.
    pub fn load(&self, document: Document) {
        self.halt_loops();
        info!(
            title = %document.title,
            tokens = document.len(),
            "Document loaded"
        );
        if let Ok(mut slot) = self.document.lock() {
            *slot = Some(Arc::new(document));
        }
        self.shared.set_cursor(0);
        self.shared.set_phase(Phase::Idle);
        self.display.set_progress(0.0);
    }

    /// Idle/Paused start reading; Running pauses without moving the cursor.
    pub fn toggle(&self) -> Phase {
        if self.shared.is_running() {
            self.stop();
        } else {
            self.start();
        }
        self.phase()
    }

    /// Halt playback, keeping the cursor where it is.
    pub fn stop(&self) {
        if let Some(voice) = &self.voice {
            voice.stop();
        }
        self.halt_loops();
        if self.shared.phase() == Phase::Running {
            self.shared.set_phase(Phase::Paused);
        }
        debug!(cursor = self.shared.cursor(), "Playback stopped");
    }

    /// Back to the beginning, idle. Calling this twice is the same as once.
    pub fn restart(&self) {
        if let Some(voice) = &self.voice {
            voice.stop();
        }
        self.halt_loops();
        self.shared.set_cursor(0);
        self.shared.set_phase(Phase::Idle);
        self.display.set_progress(0.0);
        info!("Playback restarted");
    }

    /// Move the cursor by `delta`, clamped to the document. Takes effect
    /// between ticks; an in-flight tick completes against the old cursor.
    pub fn seek(&self, delta: i64) {
        let Some(document) = self.current_document() else {
            return;
        };
        if document.is_empty() {
            return;
        }
        let len = document.len();
        let cursor = self.shared.cursor() as i64;
        let target = (cursor + delta).clamp(0, len as i64 - 1) as usize;
        self.shared.set_cursor(target);
        if self.shared.phase() == Phase::Finished {
            self.shared.set_phase(Phase::Paused);
        }

        let settings = self.shared.tick_settings();
        let frame = render::render(
            &document.tokens[target],
            settings.display_mode,
            settings.font_size,
        );
        self.display.show(&frame);
        self.display.set_progress(target as f64 / len as f64);
        debug!(cursor = target, "Seeked");
    }

    /// Record the word under the cursor as a bookmark and persist the list.
    pub fn add_bookmark(&self) {
        let Some(document) = self.current_document() else {
            self.display.notify("Nothing to bookmark: no book loaded");
            return;
        };
        let cursor = self.shared.cursor();
        let Some(word) = document.tokens.get(cursor) else {
            return;
        };
        let bookmark = Bookmark {
            book: document.title.clone(),
            position: cursor,
            word: word.clone(),
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
        };
        if let Ok(mut list) = self.bookmarks.lock() {
            list.push(bookmark);
            self.store.save_bookmarks(&list);
        }
        info!(position = cursor, word = %word, "Bookmark added");
        self.display.notify("Bookmark added!");
    }

    pub fn set_speed(&self, seconds_per_unit: f64) -> Result<()> {
        if !seconds_per_unit.is_finite() || seconds_per_unit <= 0.0 {
            bail!("speed must be a positive number of seconds, got {seconds_per_unit}");
        }
        if let Ok(mut settings) = self.shared.settings.lock() {
            settings.speed = Duration::from_secs_f64(seconds_per_unit);
        }
        debug!(seconds_per_unit, "Speed updated");
        Ok(())
    }

    pub fn set_font_size(&self, size: u32) -> Result<()> {
        if !(render::MIN_FONT_SIZE..=render::MAX_FONT_SIZE).contains(&size) {
            bail!(
                "font size must be between {} and {}, got {size}",
                render::MIN_FONT_SIZE,
                render::MAX_FONT_SIZE
            );
        }
        if let Ok(mut settings) = self.shared.settings.lock() {
            settings.font_size = size;
        }
        Ok(())
    }

    pub fn set_segment_mode(&self, mode: SegmentMode) {
        if let Ok(mut settings) = self.shared.settings.lock() {
            settings.segment_mode = mode;
        }
        info!(%mode, "Reading mode changed");
    }

    pub fn set_display_mode(&self, mode: DisplayMode) {
        if let Ok(mut settings) = self.shared.settings.lock() {
            settings.display_mode = mode;
        }
        info!(%mode, "Display mode changed");
    }

    /// Turn narration on or off. When enabled mid-run the narrator starts
    /// immediately; when disabled the in-flight utterance is cancelled
    /// best-effort and the loop exits at its next check.
    pub fn set_speech_enabled(&self, enabled: bool) {
        self.shared.speech_enabled.store(enabled, Ordering::Release);
        if enabled {
            if self.voice.is_none() {
                warn!("Speech enabled but no voice is configured");
                return;
            }
            if self.shared.is_running() {
                if let Some(document) = self.current_document() {
                    self.spawn_narrator(&document);
                }
            }
        } else if let Some(voice) = &self.voice {
            voice.stop();
        }
    }

    pub fn phase(&self) -> Phase {
        self.shared.phase()
    }

    pub fn cursor(&self) -> usize {
        self.shared.cursor()
    }

    pub fn stats_snapshot(&self) -> ReadingStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn bookmarks(&self) -> Vec<Bookmark> {
        self.bookmarks.lock().map(|b| b.clone()).unwrap_or_default()
    }

    fn current_document(&self) -> Option<Arc<Document>> {
        self.document.lock().ok().and_then(|slot| slot.clone())
    }

    fn start(&self) {
        let document = match self.current_document() {
            Some(doc) if !doc.is_empty() => doc,
            _ => {
                // Reported, not fatal: starting with nothing to read is a no-op.
                warn!("Ignoring start request without a readable document");
                self.display.notify("Nothing to read. Import a book first");
                return;
            }
        };
        if self.shared.phase() == Phase::Finished {
            self.display.notify("Reading finished. Use restart to read again");
            return;
        }

        self.shared.set_running(true);
        self.shared.set_phase(Phase::Running);
        info!(cursor = self.shared.cursor(), "Playback started");

        let shared = Arc::clone(&self.shared);
        let display = Arc::clone(&self.display);
        let store = Arc::clone(&self.store);
        let stats = Arc::clone(&self.stats);
        let doc = Arc::clone(&document);
        let handle = thread::spawn(move || run_tick_loop(shared, doc, display, store, stats));
        if let Ok(mut slot) = self.tick_handle.lock() {
            *slot = Some(handle);
        }

        if self.shared.speech_on() {
            self.spawn_narrator(&document);
        }
    }

    fn spawn_narrator(&self, document: &Arc<Document>) {
        let Some(voice) = self.voice.as_ref() else {
            return;
        };
        if let Ok(mut slot) = self.narration_handle.lock() {
            if slot.as_ref().map(|h| !h.is_finished()).unwrap_or(false) {
                return;
            }
            let shared = Arc::clone(&self.shared);
            let doc = Arc::clone(document);
            let voice = Arc::clone(voice);
            *slot = Some(thread::spawn(move || {
                narrator::run_narration_loop(shared, doc, voice)
            }));
        }
    }

    /// Clear the liveness flag and wait for both loops to observe it. Each
    /// loop re-checks on wake, so this blocks at most one tick period (plus
    /// one utterance for the narrator).
    fn halt_loops(&self) {
        self.shared.set_running(false);
        if let Ok(mut slot) = self.tick_handle.lock() {
            if let Some(handle) = slot.take() {
                let _ = handle.join();
            }
        }
        if let Ok(mut slot) = self.narration_handle.lock() {
            if let Some(handle) = slot.take() {
                let _ = handle.join();
            }
        }
    }
}

/// One tick: extract, render, push, advance, sleep, record. The liveness
/// flag is observed at the top of each iteration and again after the sleep,
/// bounding pause latency to one tick.
fn run_tick_loop(
    shared: Arc<SharedState>,
    document: Arc<Document>,
    display: Arc<dyn DisplaySink>,
    store: Arc<DataStore>,
    stats: Arc<Mutex<ReadingStats>>,
) {
    debug!("Playback loop started");
    let len = document.len();
    loop {
        if !shared.is_running() {
            break;
        }
        let cursor = shared.cursor();
        let settings = shared.tick_settings();

        let Some((segment, next_cursor)) =
            segment::next_segment(&document.tokens, cursor, settings.segment_mode)
        else {
            shared.set_running(false);
            shared.set_phase(Phase::Finished);
            display.set_progress(1.0);
            display.notify("Reading completed!");
            info!(words = len, "Reading completed");
            break;
        };

        let frame = render::render(&segment.text, settings.display_mode, settings.font_size);
        display.show(&frame);
        display.set_progress(next_cursor as f64 / len as f64);
        shared.set_cursor(next_cursor);

        let started = Instant::now();
        thread::sleep(settings.speed);

        let elapsed_minutes = started.elapsed().as_secs_f64() / 60.0;
        if let Ok(mut stats) = stats.lock() {
            stats.record(segment.token_count() as u64, elapsed_minutes);
            store.save_stats(&stats);
        }

        if !shared.is_running() {
            break;
        }
    }
    debug!("Playback loop exited");
}
