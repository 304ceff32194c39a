//! Per-query session state and the sequencing policy around it.
//!
//! Step illustration runs strictly in step order, one request in flight at
//! a time, because each prompt's context is every earlier instruction and
//! because concurrent dispatch would multiply rate-limit pressure. A fixed
//! pacing delay separates consecutive step requests. Staleness is handled
//! with an epoch counter instead of locks: a loop captures the epoch it
//! was started for and goes quiet as soon as the session has moved on.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use ck::models::{LeftoverSuggestion, Recipe};
use serde::Serialize;

use crate::generate::RecipeGenerator;
use crate::narration::{advance_after_audio, Narration, NarrationState};

/// Inserted after every step-image request except the last, whether it
/// succeeded, failed, or was skipped.
pub const STEP_IMAGE_PACING: Duration = Duration::from_secs(4);

/// Everything a session owns for the current recipe view. Nothing here
/// outlives the session; a new query replaces the lot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionSnapshot {
    pub recipe: Option<Recipe>,
    pub dish_image: Option<String>,
    /// Keyed by step index. Externally supplied images take precedence
    /// over locally generated ones.
    pub step_images: Vec<Option<String>>,
    pub leftovers: Vec<LeftoverSuggestion>,
}

pub struct RecipeSession {
    state: Mutex<SessionSnapshot>,
    narration: Mutex<Narration>,
    epoch: AtomicU64,
}

impl Default for RecipeSession {
    fn default() -> Self {
        Self::new()
    }
}

impl RecipeSession {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SessionSnapshot::default()),
            narration: Mutex::new(Narration::new(0)),
            epoch: AtomicU64::new(0),
        }
    }

    /// Install a freshly generated recipe, clearing all derived artifacts,
    /// and return the new epoch. Any illustration loop started under an
    /// older epoch is dead from this moment.
    ///
    /// The epoch bump and the state reset happen under the state lock, and
    /// every epoch-guarded write re-checks the epoch under that same lock,
    /// so a superseded loop can never slip an artifact into the new
    /// recipe's state between the bump and the reset.
    pub fn begin(&self, recipe: Recipe) -> u64 {
        let steps = recipe.steps.len();
        let epoch = {
            let mut state = self.state.lock().expect("session lock poisoned");
            let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
            *state = SessionSnapshot {
                step_images: vec![None; steps],
                recipe: Some(recipe),
                ..SessionSnapshot::default()
            };
            epoch
        };
        *self.narration.lock().expect("narration lock poisoned") = Narration::new(steps);
        epoch
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch() == epoch
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.lock().expect("session lock poisoned").clone()
    }

    pub fn has_step_image(&self, index: usize) -> bool {
        let state = self.state.lock().expect("session lock poisoned");
        matches!(state.step_images.get(index), Some(Some(_)))
    }

    pub fn step_instruction(&self, index: usize) -> Option<String> {
        let state = self.state.lock().expect("session lock poisoned");
        let recipe = state.recipe.as_ref()?;
        Some(recipe.steps.get(index)?.instruction.clone())
    }

    /// Install an externally supplied image. These always win over locally
    /// generated ones.
    pub fn seed_step_image(&self, index: usize, handle: String) {
        let mut state = self.state.lock().expect("session lock poisoned");
        if let Some(slot) = state.step_images.get_mut(index) {
            *slot = Some(handle);
        }
    }

    /// Install a locally generated image, unless the epoch is stale or the
    /// slot was filled (e.g. seeded) in the meantime.
    pub fn set_generated_step_image(&self, epoch: u64, index: usize, handle: String) -> bool {
        let mut state = self.state.lock().expect("session lock poisoned");
        if !self.is_current(epoch) {
            return false;
        }
        match state.step_images.get_mut(index) {
            Some(slot) if slot.is_none() => {
                *slot = Some(handle);
                true
            }
            _ => false,
        }
    }

    pub fn set_dish_image(&self, epoch: u64, handle: String) -> bool {
        let mut state = self.state.lock().expect("session lock poisoned");
        if !self.is_current(epoch) {
            return false;
        }
        state.dish_image = Some(handle);
        true
    }

    pub fn set_leftovers(&self, epoch: u64, leftovers: Vec<LeftoverSuggestion>) -> bool {
        let mut state = self.state.lock().expect("session lock poisoned");
        if !self.is_current(epoch) {
            return false;
        }
        state.leftovers = leftovers;
        true
    }

    pub fn narration_play(&self) -> NarrationState {
        let mut narration = self.narration.lock().expect("narration lock poisoned");
        narration.play();
        narration.state()
    }

    pub fn narration_pause(&self) -> NarrationState {
        let mut narration = self.narration.lock().expect("narration lock poisoned");
        narration.pause();
        narration.state()
    }

    pub fn narration_seek(&self, step: usize) -> NarrationState {
        let mut narration = self.narration.lock().expect("narration lock poisoned");
        narration.seek(step);
        narration.state()
    }

    /// The playback client reports that the current step's audio finished.
    pub async fn narration_audio_finished(&self) -> NarrationState {
        advance_after_audio(&self.narration).await
    }
}

/// Fill in everything the recipe call didn't produce: the dish image, the
/// leftover suggestions, then one step image at a time. Runs as a single
/// background task per recipe.
pub async fn illustrate_recipe(
    generator: &dyn RecipeGenerator,
    session: &RecipeSession,
    epoch: u64,
) {
    let Some(recipe) = session.snapshot().recipe else {
        return;
    };
    if !session.is_current(epoch) {
        return;
    }
    if let Some(handle) = generator
        .generate_recipe_visual(&recipe.title, &recipe.description)
        .await
    {
        session.set_dish_image(epoch, handle);
    }
    if !session.is_current(epoch) {
        return;
    }
    let leftovers = generator
        .generate_leftover_suggestions(&recipe.ingredients, &recipe.title)
        .await;
    session.set_leftovers(epoch, leftovers);
    illustrate_steps(generator, session, epoch).await;
}

/// Generate step images strictly in step order, pacing consecutive
/// requests and aborting quietly as soon as the session moves on to a
/// different recipe.
pub async fn illustrate_steps(
    generator: &dyn RecipeGenerator,
    session: &RecipeSession,
    epoch: u64,
) {
    let instructions: Vec<String> = match session.snapshot().recipe {
        Some(recipe) => recipe
            .steps
            .iter()
            .map(|step| step.instruction.clone())
            .collect(),
        None => return,
    };
    let total = instructions.len();
    for index in 0..total {
        if !session.is_current(epoch) {
            tracing::debug!("Dropping stale illustration loop at step {}", index);
            return;
        }
        if !session.has_step_image(index) {
            let image = generator
                .generate_step_visual(&instructions[index], &instructions[..index])
                .await;
            // A newer recipe may have arrived while this was suspended
            if !session.is_current(epoch) {
                return;
            }
            if let Some(handle) = image {
                session.set_generated_step_image(epoch, index, handle);
            }
        }
        if index + 1 < total {
            tokio::time::sleep(STEP_IMAGE_PACING).await;
        }
    }
}

/// On-demand narration audio for one step.
pub async fn narrate_step(
    generator: &dyn RecipeGenerator,
    session: &RecipeSession,
    index: usize,
) -> Option<Vec<u8>> {
    let instruction = session.step_instruction(index)?;
    generator.generate_step_audio(&instruction).await
}
