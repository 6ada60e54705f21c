//! Sound cue bookkeeping.
//!
//! There is no output device: playback is logged, and cues with a duration
//! are stopped once the session clock passes their cut-off.

use tm_core::spell::SoundCue;

#[derive(Debug, Clone, PartialEq)]
pub struct PlayingSound {
    pub id: u64,
    pub cue: SoundCue,
    pub started_ms: u64,
    pub stop_at_ms: Option<u64>,
}

#[derive(Debug, Default)]
pub struct SoundBoard {
    playing: Vec<PlayingSound>,
    next_id: u64,
}

impl SoundBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn play(&mut self, cue: SoundCue, now_ms: u64) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        log::info!(
            "Sound '{}' (volume {:.2}, from {} ms{})",
            cue.path,
            cue.volume,
            cue.start_offset_ms,
            cue.duration_ms
                .map(|d| format!(", cut after {d} ms"))
                .unwrap_or_default()
        );
        let stop_at_ms = cue.duration_ms.map(|d| now_ms.saturating_add(d));
        self.playing.push(PlayingSound {
            id,
            cue,
            started_ms: now_ms,
            stop_at_ms,
        });
        id
    }

    /// Stop every sound whose cut-off has passed and return them.
    pub fn update(&mut self, now_ms: u64) -> Vec<PlayingSound> {
        let (stopped, playing): (Vec<_>, Vec<_>) = self
            .playing
            .drain(..)
            .partition(|s| s.stop_at_ms.is_some_and(|at| now_ms >= at));
        self.playing = playing;
        for sound in &stopped {
            log::debug!("Sound '{}' stopped", sound.cue.path);
        }
        stopped
    }

    pub fn stop_all(&mut self) {
        if !self.playing.is_empty() {
            log::debug!("Stopping {} sounds", self.playing.len());
        }
        self.playing.clear();
    }

    pub fn playing(&self) -> &[PlayingSound] {
        &self.playing
    }
}
