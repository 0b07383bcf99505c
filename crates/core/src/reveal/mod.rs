//! Discrete reveal stepping and the clip mask derived from it.
//!
//! The overlay is exposed from the bottom edge upwards: at step 0 it is fully
//! clipped away, at `total_steps` it is fully visible.

use serde::{Deserialize, Serialize};

use crate::{PoseRevealError, Result};

/// Rectangular clip region for the overlay layer, expressed as the share of
/// the frame hidden from the top edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaskSpec {
    pub inset_top_percent: f64,
}

impl MaskSpec {
    /// CSS `clip-path` value for the overlay element.
    pub fn clip_path(&self) -> String {
        format!("inset({}% 0% 0% 0%)", self.inset_top_percent)
    }

    /// Portion of the overlay that is visible, in `[0, 1]`.
    pub fn visible_fraction(&self) -> f64 {
        (100.0 - self.inset_top_percent) / 100.0
    }
}

/// Maps a reveal step onto the overlay mask.
pub fn compute_mask(step: u32, total_steps: u32) -> Result<MaskSpec> {
    if total_steps == 0 {
        return Err(PoseRevealError::config("total reveal steps must be positive"));
    }
    if step > total_steps {
        return Err(PoseRevealError::config(format!(
            "reveal step {step} exceeds total steps {total_steps}"
        )));
    }

    Ok(mask_for(step, total_steps))
}

/// Shared formula; callers guarantee `0 <= step <= total_steps` and
/// `total_steps > 0`.
fn mask_for(step: u32, total_steps: u32) -> MaskSpec {
    let revealed = f64::from(step) / f64::from(total_steps) * 100.0;
    MaskSpec {
        inset_top_percent: 100.0 - revealed,
    }
}

/// Current reveal step, clamped to `[0, total_steps]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealState {
    step: u32,
    total_steps: u32,
}

impl RevealState {
    /// Starts fully hidden. Zero steps is a configuration error.
    pub fn new(total_steps: u32) -> Result<Self> {
        if total_steps == 0 {
            return Err(PoseRevealError::config("total reveal steps must be positive"));
        }
        Ok(Self {
            step: 0,
            total_steps,
        })
    }

    pub fn current_step(&self) -> u32 {
        self.step
    }

    pub fn total_steps(&self) -> u32 {
        self.total_steps
    }

    /// Raises the step by one; a no-op at the ceiling.
    pub fn increment(&mut self) -> u32 {
        self.step = (self.step + 1).min(self.total_steps);
        self.step
    }

    /// Lowers the step by one; a no-op at the floor.
    pub fn decrement(&mut self) -> u32 {
        self.step = self.step.saturating_sub(1);
        self.step
    }

    /// Hides the overlay again; used on every round advance.
    pub fn reset(&mut self) {
        self.step = 0;
    }

    pub fn is_fully_hidden(&self) -> bool {
        self.step == 0
    }

    pub fn is_fully_revealed(&self) -> bool {
        self.step == self.total_steps
    }

    /// Mask for the current step.
    pub fn mask(&self) -> MaskSpec {
        mask_for(self.step, self.total_steps)
    }
}
