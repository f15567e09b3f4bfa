//! Learning rate schedules.

use std::f32;

/// Trait for learning rate schedules.
///
/// A learning rate schedule determines the learning rate of an epoch,
/// given the validation score of the previous epoch.
pub trait LearningRateSchedule {
    fn learning_rate(&mut self, epoch: usize, last_score: f32) -> f32;
}

/// Constant learning rate schedule.
pub struct ConstantLearningRate(f32);

impl ConstantLearningRate {
    /// Construct a constant learning rate.
    pub fn new(lr: f32) -> Self {
        assert!(lr > 0.0, "Learning rate must be a positive value");

        ConstantLearningRate(lr)
    }
}

impl LearningRateSchedule for ConstantLearningRate {
    fn learning_rate(&mut self, _epoch: usize, _last_score: f32) -> f32 {
        self.0
    }
}

/// Plateau learning rate schedule.
///
/// The learning rate is multiplied by `scale` when the validation score
/// did not improve for `max_patience` epochs.
pub struct PlateauLearningRate {
    lr: f32,
    scale: f32,
    best_score: f32,
    patience: usize,
    max_patience: usize,
}

impl PlateauLearningRate {
    pub fn new(initial_lr: f32, scale: f32, max_patience: usize) -> Self {
        assert!(
            initial_lr > 0.0,
            "The initial learning rate must be a positive value."
        );
        assert!(
            scale > 0.0 && scale <= 1.0,
            "The learning rate scale must be in (0, 1]."
        );

        PlateauLearningRate {
            lr: initial_lr,
            scale,
            best_score: -f32::INFINITY,
            patience: 0,
            max_patience,
        }
    }
}

impl LearningRateSchedule for PlateauLearningRate {
    fn learning_rate(&mut self, _epoch: usize, last_score: f32) -> f32 {
        if last_score > self.best_score {
            self.best_score = last_score;
            self.patience = 0;
        } else {
            self.patience += 1;

            if self.patience == self.max_patience {
                self.lr *= self.scale;
                self.patience = 0;
            }
        }

        self.lr
    }
}
