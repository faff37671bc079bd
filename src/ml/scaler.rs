// ============================================================
// Layer 5 — Gradient Scaler
// ============================================================
// Loss scaling for mixed-precision training. Half-precision
// gradients underflow to zero for small loss values, so the loss
// is multiplied by a large scale before backprop and gradients
// are divided by the same scale before the optimizer update.
//
// The scale adapts:
//   - a non-finite gradient means the scale overflowed the
//     half-precision range: skip the update, multiply the scale
//     by the backoff factor
//   - after `growth_interval` consecutive clean steps, multiply
//     the scale by the growth factor to creep back up
//
// Disabled mode is the guaranteed full-precision fallback: the
// scale is pinned to 1.0 and every update is applied.
//
// The adaptive state is part of the checkpoint record so a
// resumed run continues with bit-identical scaler behaviour.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::traits::PretrainStepper;

/// Serializable scaler state, persisted in every checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradScalerState {
    pub scale: f32,
    pub growth_factor: f32,
    pub backoff_factor: f32,
    pub growth_interval: u32,
    pub growth_streak: u32,
}

impl Default for GradScalerState {
    fn default() -> Self {
        Self {
            scale: 65536.0,
            growth_factor: 2.0,
            backoff_factor: 0.5,
            growth_interval: 2000,
            growth_streak: 0,
        }
    }
}

pub struct GradScaler {
    enabled: bool,
    state: GradScalerState,
}

impl GradScaler {
    pub fn new(enabled: bool) -> Self {
        Self { enabled, state: GradScalerState::default() }
    }

    /// The factor to multiply the loss by before backprop.
    pub fn loss_scale(&self) -> f32 {
        if self.enabled {
            self.state.scale
        } else {
            1.0
        }
    }

    /// Gate the optimizer update on gradient health.
    ///
    /// `grads_finite` is the stepper's report from backward.
    /// Returns true if the update was applied, false if it was
    /// skipped because of overflow.
    pub fn step<S: PretrainStepper + ?Sized>(
        &mut self,
        stepper: &mut S,
        grads_finite: bool,
    ) -> Result<bool> {
        if !self.enabled {
            stepper.apply_update(1.0)?;
            return Ok(true);
        }

        if !grads_finite {
            self.state.scale *= self.state.backoff_factor;
            self.state.growth_streak = 0;
            tracing::debug!("Non-finite gradients; loss scale backed off to {}", self.state.scale);
            return Ok(false);
        }

        stepper.apply_update(1.0 / self.state.scale)?;
        self.state.growth_streak += 1;
        if self.state.growth_streak >= self.state.growth_interval {
            self.state.scale *= self.state.growth_factor;
            self.state.growth_streak = 0;
        }
        Ok(true)
    }

    pub fn state(&self) -> &GradScalerState {
        &self.state
    }

    pub fn load_state(&mut self, state: GradScalerState) {
        self.state = state;
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batcher::PretrainBatch;
    use crate::domain::traits::StepLosses;

    /// Records the inverse scales it was asked to apply.
    struct RecordingStepper {
        applied: Vec<f32>,
    }

    impl PretrainStepper for RecordingStepper {
        fn forward(&mut self, _: &PretrainBatch, _: bool) -> Result<StepLosses> {
            Ok(StepLosses { nsp: 0.0, mlm: 0.0 })
        }
        fn backward(&mut self, _: f32) -> Result<bool> {
            Ok(true)
        }
        fn apply_update(&mut self, inv_scale: f32) -> Result<()> {
            self.applied.push(inv_scale);
            Ok(())
        }
        fn model_state(&self) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
        fn optimizer_state(&self) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
        fn load_model_state(&mut self, _: &[u8]) -> Result<()> {
            Ok(())
        }
        fn load_optimizer_state(&mut self, _: &[u8]) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn disabled_scaler_is_plain_full_precision() {
        let mut scaler = GradScaler::new(false);
        let mut stepper = RecordingStepper { applied: Vec::new() };

        assert_eq!(scaler.loss_scale(), 1.0);
        assert!(scaler.step(&mut stepper, true).unwrap());
        // Even a "non-finite" report applies: overflow handling
        // only exists under mixed precision
        assert!(scaler.step(&mut stepper, false).unwrap());
        assert_eq!(stepper.applied, vec![1.0, 1.0]);
        assert_eq!(scaler.loss_scale(), 1.0);
    }

    #[test]
    fn overflow_skips_update_and_backs_off() {
        let mut scaler = GradScaler::new(true);
        let mut stepper = RecordingStepper { applied: Vec::new() };
        let initial = scaler.loss_scale();

        assert!(!scaler.step(&mut stepper, false).unwrap());
        assert!(stepper.applied.is_empty());
        assert_eq!(scaler.loss_scale(), initial * 0.5);
    }

    #[test]
    fn clean_steps_unscale_and_eventually_grow() {
        let mut scaler = GradScaler::new(true);
        scaler.state.growth_interval = 3;
        let mut stepper = RecordingStepper { applied: Vec::new() };
        let initial = scaler.loss_scale();

        for _ in 0..3 {
            assert!(scaler.step(&mut stepper, true).unwrap());
        }
        assert_eq!(stepper.applied, vec![1.0 / initial; 3]);
        assert_eq!(scaler.loss_scale(), initial * 2.0);
        assert_eq!(scaler.state().growth_streak, 0);
    }

    #[test]
    fn overflow_resets_growth_streak() {
        let mut scaler = GradScaler::new(true);
        scaler.state.growth_interval = 2;
        let mut stepper = RecordingStepper { applied: Vec::new() };

        scaler.step(&mut stepper, true).unwrap();
        scaler.step(&mut stepper, false).unwrap();
        assert_eq!(scaler.state().growth_streak, 0);
    }

    #[test]
    fn state_round_trips_through_serde() {
        let mut scaler = GradScaler::new(true);
        scaler.step(&mut RecordingStepper { applied: Vec::new() }, false).unwrap();

        let bytes = bincode::serialize(scaler.state()).unwrap();
        let restored: GradScalerState = bincode::deserialize(&bytes).unwrap();
        assert_eq!(&restored, scaler.state());
    }
}
