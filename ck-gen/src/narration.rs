//! Narrated-playback state for a recipe session.
//!
//! Playback advances to the next step on its own a short beat after the
//! current step's audio finishes, but only while playing: pausing during
//! that beat suppresses the advance, and a manual seek in the meantime
//! invalidates it (the advance is tied to the step it was scheduled from).

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

pub const ADVANCE_DELAY: Duration = Duration::from_millis(1500);

#[derive(Debug)]
pub struct Narration {
    playing: bool,
    current_step: usize,
    total_steps: usize,
}

/// What a playback client needs to render the narration controls.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct NarrationState {
    pub playing: bool,
    pub current_step: usize,
    pub total_steps: usize,
}

impl Narration {
    pub fn new(total_steps: usize) -> Self {
        Self {
            playing: false,
            current_step: 0,
            total_steps,
        }
    }

    pub fn play(&mut self) {
        if self.total_steps > 0 {
            self.playing = true;
        }
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    pub fn seek(&mut self, step: usize) {
        if step < self.total_steps {
            self.current_step = step;
        }
    }

    pub fn state(&self) -> NarrationState {
        NarrationState {
            playing: self.playing,
            current_step: self.current_step,
            total_steps: self.total_steps,
        }
    }
}

/// Called when the current step's audio has finished playing. Waits the
/// advance beat, then moves to the next step if playback is still live and
/// still on the step the audio belonged to. Playback stops at the end of
/// the last step.
pub async fn advance_after_audio(narration: &Mutex<Narration>) -> NarrationState {
    let origin = {
        let narration = narration.lock().expect("narration lock poisoned");
        if !narration.playing {
            return narration.state();
        }
        narration.current_step
    };
    tokio::time::sleep(ADVANCE_DELAY).await;
    let mut narration = narration.lock().expect("narration lock poisoned");
    if !narration.playing || narration.current_step != origin {
        return narration.state();
    }
    if narration.current_step + 1 < narration.total_steps {
        narration.current_step += 1;
    } else {
        narration.playing = false;
    }
    narration.state()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn advances_one_step_after_the_delay_while_playing() {
        let narration = Mutex::new(Narration::new(3));
        narration.lock().unwrap().play();
        let state = advance_after_audio(&narration).await;
        assert_eq!(state.current_step, 1);
        assert!(state.playing);
    }

    #[tokio::test(start_paused = true)]
    async fn paused_playback_never_advances() {
        let narration = Mutex::new(Narration::new(3));
        let state = advance_after_audio(&narration).await;
        assert_eq!(state.current_step, 0);
        assert!(!state.playing);
    }

    #[tokio::test(start_paused = true)]
    async fn pausing_during_the_delay_suppresses_the_advance() {
        let narration = std::sync::Arc::new(Mutex::new(Narration::new(3)));
        narration.lock().unwrap().play();
        let advancing = tokio::spawn({
            let narration = narration.clone();
            async move { advance_after_audio(&narration).await }
        });
        // Let the advance task reach its sleep, then pause mid-delay
        tokio::time::sleep(Duration::from_millis(500)).await;
        narration.lock().unwrap().pause();
        let state = advancing.await.unwrap();
        assert_eq!(state.current_step, 0);
        assert!(!state.playing);
    }

    #[tokio::test(start_paused = true)]
    async fn seeking_during_the_delay_invalidates_the_advance() {
        let narration = std::sync::Arc::new(Mutex::new(Narration::new(5)));
        narration.lock().unwrap().play();
        let advancing = tokio::spawn({
            let narration = narration.clone();
            async move { advance_after_audio(&narration).await }
        });
        tokio::time::sleep(Duration::from_millis(500)).await;
        narration.lock().unwrap().seek(3);
        let state = advancing.await.unwrap();
        assert_eq!(state.current_step, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn playback_stops_at_the_last_step() {
        let narration = Mutex::new(Narration::new(2));
        {
            let mut n = narration.lock().unwrap();
            n.play();
            n.seek(1);
        }
        let state = advance_after_audio(&narration).await;
        assert_eq!(state.current_step, 1);
        assert!(!state.playing);
    }
}
