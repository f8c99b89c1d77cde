//! Running reading statistics.
//!
//! A pure accumulator fed one sample per playback tick. Persisted field
//! names are part of the on-disk format and must stay stable.

use chrono::Local;
use serde::{Deserialize, Serialize};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Totals plus an append-only session log.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ReadingStats {
    pub total_words_read: u64,
    #[serde(rename = "total_time")]
    pub total_time_minutes: f64,
    #[serde(rename = "average_speed")]
    pub average_speed_wpm: f64,
    pub sessions: Vec<SessionRecord>,
}

/// One recorded sample.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionRecord {
    pub date: String,
    pub words_read: u64,
    #[serde(rename = "time")]
    pub time_minutes: f64,
    #[serde(rename = "speed")]
    pub speed_wpm: f64,
}

impl ReadingStats {
    /// Fold one `(words read, elapsed minutes)` sample into the totals and
    /// append a session record. There is no rollback; persistence after a
    /// record is at-least-once.
    pub fn record(&mut self, words_read: u64, elapsed_minutes: f64) {
        self.total_words_read += words_read;
        self.total_time_minutes += elapsed_minutes;
        self.average_speed_wpm = if self.total_time_minutes > 0.0 {
            self.total_words_read as f64 / self.total_time_minutes
        } else {
            0.0
        };

        let speed_wpm = if elapsed_minutes > 0.0 {
            words_read as f64 / elapsed_minutes
        } else {
            0.0
        };
        self.sessions.push(SessionRecord {
            date: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            words_read,
            time_minutes: elapsed_minutes,
            speed_wpm,
        });
    }
}
