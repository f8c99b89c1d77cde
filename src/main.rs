//! Entry point for the speed reader.
//!
//! Responsibilities here are intentionally minimal:
//! - Parse command-line arguments.
//! - Load user configuration from `conf/config.toml`.
//! - Import the requested book into the library and load its words.
//! - Wire the playback controller to the console display and, when enabled,
//!   the speech voice, then drive it from a line-based command loop.

mod cancellation;
mod config;
mod display;
mod library;
mod playback;
mod render;
mod segment;
mod speech;
mod stats;
mod store;
mod theme;

use crate::cancellation::StopSignal;
use crate::config::load_config;
use crate::display::{ConsoleDisplay, DisplaySink};
use crate::library::{Library, load_document};
use crate::playback::PlaybackController;
use crate::render::DisplayMode;
use crate::segment::SegmentMode;
use crate::speech::{PiperVoice, UtteranceSink};
use crate::store::DataStore;
use crate::theme::ThemePreferences;
use anyhow::{Context, Result, anyhow};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::{Arc, mpsc};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

const COMMANDS: &str = "Commands: toggle | seek <+N|-N> | mode <word|sentence|paragraph> | \
display <standard|focus|dynamic> | speed <secs> | font <size> | speech <on|off> | \
rate <wpm> | voice <model-path> | theme <name> | mark | marks | stats | restart | quit";

fn main() {
    let reload_handle = init_tracing();
    if let Err(err) = run(&reload_handle) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

fn run(reload_handle: &ReloadHandle) -> Result<()> {
    let config = load_config(Path::new("conf/config.toml"));
    set_log_level(reload_handle, config.log_level.as_filter_str());

    let data_dir = PathBuf::from(&config.data_dir);
    let library = Library::open(&data_dir.join("books"))?;
    let store = Arc::new(DataStore::open(&data_dir.join("stats"))?);

    let Some(book_arg) = parse_args() else {
        return print_library(&library);
    };
    let book_path = resolve_book(&library, &book_arg)?;

    let theme_prefs = store.load_theme_preferences();
    info!(theme = %theme_prefs.current_theme, "Theme applied");
    let display = Arc::new(ConsoleDisplay::new(&theme_prefs.palette()));

    // Voice construction is the one fatal TTS error; per-utterance failures
    // later are logged and dropped.
    let voice: Option<Arc<dyn UtteranceSink>> = if config.speech_enabled {
        let voice = PiperVoice::new(
            PathBuf::from(&config.tts_model_path),
            PathBuf::from(&config.tts_espeak_path),
            data_dir.join("tts"),
            config.speech_rate_wpm,
        )?;
        Some(Arc::new(voice))
    } else {
        None
    };

    let stored = library.import(&book_path)?;
    let document = load_document(&stored)?;
    if document.is_empty() {
        warn!(path = %stored.display(), "Imported book has no words");
    }

    let sink: Arc<dyn DisplaySink> = display.clone();
    let controller = PlaybackController::new(sink, voice.clone(), Arc::clone(&store), &config);
    controller.load(document);

    let shutdown = StopSignal::new();
    let handler_shutdown = shutdown.clone();
    ctrlc::set_handler(move || handler_shutdown.request())
        .context("Failed to install Ctrl-C handler")?;

    display.notify(COMMANDS);
    command_loop(&controller, &display, &store, voice.as_ref(), shutdown)
}

fn parse_args() -> Option<String> {
    env::args().nth(1)
}

/// Accept either a filesystem path or the title of an already-imported book.
fn resolve_book(library: &Library, arg: &str) -> Result<PathBuf> {
    let path = PathBuf::from(arg);
    if path.exists() {
        return Ok(path);
    }
    let in_library = library.path_of(arg);
    if in_library.exists() {
        return Ok(in_library);
    }
    Err(anyhow!("File not found: {}", path.display()))
}

fn print_library(library: &Library) -> Result<()> {
    let books = library.books()?;
    if books.is_empty() {
        println!("Library is empty.");
    } else {
        println!("Library:");
        for book in books {
            println!("  {book}");
        }
    }
    println!("Usage: speedreader <path-to-text-file | library-title>");
    Ok(())
}

/// Drive the controller from stdin. Lines arrive over a channel so the loop
/// can keep checking the shutdown signal while nothing is typed.
fn command_loop(
    controller: &PlaybackController,
    display: &Arc<ConsoleDisplay>,
    store: &Arc<DataStore>,
    voice: Option<&Arc<dyn UtteranceSink>>,
    shutdown: StopSignal,
) -> Result<()> {
    let (tx, rx) = mpsc::channel::<String>();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match stdin.read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    if tx.send(line.trim().to_string()).is_err() {
                        break;
                    }
                }
            }
        }
    });

    loop {
        if shutdown.is_requested() {
            info!("Shutdown requested");
            break;
        }
        let line = match rx.recv_timeout(Duration::from_millis(200)) {
            Ok(line) => line,
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        };
        if !dispatch(controller, display, store, voice, &line) {
            break;
        }
    }
    controller.stop();
    Ok(())
}

/// Apply one command line; returns false when the session should end.
fn dispatch(
    controller: &PlaybackController,
    display: &Arc<ConsoleDisplay>,
    store: &Arc<DataStore>,
    voice: Option<&Arc<dyn UtteranceSink>>,
    line: &str,
) -> bool {
    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or("");
    let arg = parts.next();

    match command {
        "" | "toggle" | "t" => {
            controller.toggle();
        }
        "seek" => match arg.and_then(|a| a.parse::<i64>().ok()) {
            Some(delta) => controller.seek(delta),
            None => display.notify("Usage: seek <+N|-N>"),
        },
        "mode" => match arg {
            Some("word") => controller.set_segment_mode(SegmentMode::Word),
            Some("sentence") => controller.set_segment_mode(SegmentMode::Sentence),
            Some("paragraph") => controller.set_segment_mode(SegmentMode::Paragraph),
            _ => display.notify("Usage: mode <word|sentence|paragraph>"),
        },
        "display" => match arg {
            Some("standard") => controller.set_display_mode(DisplayMode::Standard),
            Some("focus") => controller.set_display_mode(DisplayMode::Focus),
            Some("dynamic") => controller.set_display_mode(DisplayMode::Dynamic),
            _ => display.notify("Usage: display <standard|focus|dynamic>"),
        },
        "speed" => match arg.and_then(|a| a.parse::<f64>().ok()) {
            Some(secs) => {
                if let Err(err) = controller.set_speed(secs) {
                    display.notify(&format!("{err}"));
                }
            }
            None => display.notify("Usage: speed <seconds-per-unit>"),
        },
        "font" => match arg.and_then(|a| a.parse::<u32>().ok()) {
            Some(size) => {
                if let Err(err) = controller.set_font_size(size) {
                    display.notify(&format!("{err}"));
                }
            }
            None => display.notify("Usage: font <size>"),
        },
        "speech" => match arg {
            Some("on") => controller.set_speech_enabled(true),
            Some("off") => controller.set_speech_enabled(false),
            _ => display.notify("Usage: speech <on|off>"),
        },
        "rate" => match (voice, arg.and_then(|a| a.parse::<u32>().ok())) {
            (Some(voice), Some(wpm)) => {
                voice.set_rate(wpm);
                display.notify(&format!("Speech rate set to {wpm} wpm"));
            }
            (None, _) => display.notify("Speech is not configured"),
            _ => display.notify("Usage: rate <words-per-minute>"),
        },
        "voice" => match (voice, arg) {
            (Some(voice), Some(path)) => {
                if let Err(err) = voice.select_voice(Path::new(path)) {
                    display.notify(&format!("{err}"));
                }
            }
            (None, _) => display.notify("Speech is not configured"),
            _ => display.notify("Usage: voice <model-path>"),
        },
        "theme" => match arg {
            Some(name) if ThemePreferences::is_known_theme(name) => {
                let mut prefs = store.load_theme_preferences();
                prefs.current_theme = name.to_string();
                store.save_theme_preferences(&prefs);
                display.set_palette(&prefs.palette());
                display.notify(&format!("Theme set to {name}"));
            }
            _ => display.notify("Usage: theme <dark|light|ocean|forest|sunset>"),
        },
        "mark" => controller.add_bookmark(),
        "marks" => {
            let bookmarks = controller.bookmarks();
            if bookmarks.is_empty() {
                display.notify("No bookmarks yet");
            } else {
                for bookmark in bookmarks {
                    display.notify(&format!(
                        "{}: \"{}\" at word {} ({})",
                        bookmark.book, bookmark.word, bookmark.position, bookmark.timestamp
                    ));
                }
            }
        }
        "stats" => {
            let stats = controller.stats_snapshot();
            display.notify(&format!(
                "State: {} at word {}\nTotal words read: {}\nTotal reading time: {:.1} minutes\nAverage speed: {:.1} wpm",
                controller.phase(),
                controller.cursor(),
                stats.total_words_read,
                stats.total_time_minutes,
                stats.average_speed_wpm
            ));
        }
        "restart" => controller.restart(),
        "quit" | "q" | "exit" => return false,
        "help" | "?" => display.notify(COMMANDS),
        other => display.notify(&format!("Unknown command: {other} (try 'help')")),
    }
    true
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_filter(filter_layer),
        )
        .init();
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(err) = handle.modify(|filter| *filter = parsed.clone()) {
        warn!(%level, "Failed to update log level from config: {err}");
    }
}
