//! Wall-clock progress stamps.

use std::time::Instant;

/// Tracks time since run start and since the previous stamp, rendering
/// `(HH:MM:SS / HH:MM:SS)` prefixes for progress lines.
#[derive(Debug)]
pub struct ProgressClock {
    begin: Instant,
    last: Instant,
}

impl ProgressClock {
    pub fn start() -> Self {
        let now = Instant::now();
        Self { begin: now, last: now }
    }

    /// Render a stamp and reset the "since last" clock.
    pub fn lap(&mut self) -> String {
        let now = Instant::now();
        let stamp = format!(
            "({} / {})",
            format_hms(now.duration_since(self.begin).as_secs()),
            format_hms(now.duration_since(self.last).as_secs())
        );
        self.last = now;
        stamp
    }
}

fn format_hms(elapsed: u64) -> String {
    let seconds = elapsed % 60;
    let minutes = (elapsed / 60) % 60;
    let hours = elapsed / 3600;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}
